//! Bot initialization and the command table

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug)]
#[command(rename_rule = "lowercase", description = "I can:")]
pub enum Command {
    #[command(description = "show the main menu")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "browse the video catalog")]
    List,
    #[command(description = "show details for one video: /view video_1")]
    View(String),
    #[command(description = "buy a video with Stars: /buy video_1")]
    Buy(String),
    #[command(description = "your purchased videos")]
    Mypurchases,
    #[command(description = "add a video to the catalog (admins only)")]
    Addvideo,
    #[command(description = "remove a video: /removevideo video_1 (admins only)")]
    Removevideo(String),
    #[command(description = "update a video: /updatevideo video_1 price=50 (admins only)")]
    Updatevideo(String),
    #[command(description = "sales report (admins only)")]
    Sales,
    #[command(description = "message all users: /broadcast <text> (admins only)")]
    Broadcast(String),
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(anyhow::Error)` - Failed to create bot (invalid URL, network issues, etc.)
pub fn create_bot() -> anyhow::Result<Bot> {
    let token = config::BOT_TOKEN.clone();
    if token.is_empty() {
        return Err(anyhow::anyhow!("BOT_TOKEN (or TELOXIDE_TOKEN) environment variable not set"));
    }
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;

    // Check if local Bot API server is configured
    let bot = if let Some(bot_api_url) = config::BOT_API_URL.as_ref() {
        log::info!("Using custom Bot API URL: {}", bot_api_url);
        let url = url::Url::parse(bot_api_url).map_err(|e| anyhow::anyhow!("Invalid BOT_API_URL: {}", e))?;
        Bot::with_client(token, client).set_api_url(url)
    } else {
        Bot::with_client(token, client)
    };

    Ok(bot)
}

/// Sets up bot commands in Telegram UI
///
/// Admin commands are deliberately left out of the public command list;
/// they still work when typed.
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    use teloxide::types::BotCommand;

    bot.set_my_commands(vec![
        BotCommand::new("start", "show the main menu"),
        BotCommand::new("help", "show this help"),
        BotCommand::new("list", "browse the video catalog"),
        BotCommand::new("view", "show details for one video"),
        BotCommand::new("buy", "buy a video with Stars"),
        BotCommand::new("mypurchases", "your purchased videos"),
    ])
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_descriptions() {
        let commands = Command::descriptions();
        let command_list = format!("{}", commands);

        assert!(command_list.contains("I can"));
        assert!(command_list.contains("list"));
        assert!(command_list.contains("buy"));
        assert!(command_list.contains("mypurchases"));
        assert!(command_list.contains("sales"));
    }

    #[test]
    fn test_commands_parse_lowercase() {
        assert!(matches!(Command::parse("/list", "testbot"), Ok(Command::List)));
        assert!(matches!(Command::parse("/buy video_1", "testbot"), Ok(Command::Buy(_))));
        assert!(matches!(Command::parse("/sales", "testbot"), Ok(Command::Sales)));
    }
}
