//! Admin commands: catalog management, sales report, broadcast
//!
//! Every entry point checks `is_admin` first and returns
//! `AppError::Unauthorized` otherwise. Admin ids come from the ADMIN_IDS
//! environment variable.

use std::sync::Arc;

use teloxide::prelude::*;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::catalog::{self, NewVideo, VideoUpdate};
use crate::storage::db::DbPool;
use crate::storage::{get_connection, users};
use crate::telegram::commands::require_video_id;
use crate::telegram::sessions::SessionStore;
use crate::telegram::Bot;

/// Whether this user may run admin commands.
pub fn is_admin(user_id: i64) -> bool {
    config::admin::ADMIN_IDS.contains(&user_id) || (*config::admin::ADMIN_USER_ID != 0 && *config::admin::ADMIN_USER_ID == user_id)
}

fn require_admin(user_id: i64) -> AppResult<()> {
    if is_admin(user_id) {
        Ok(())
    } else {
        log::warn!("Unauthorized admin command attempt by user {}", user_id);
        Err(AppError::Unauthorized)
    }
}

/// `/addvideo`: start (or restart) the add-video wizard for this admin.
pub async fn handle_addvideo(bot: &Bot, sessions: &SessionStore, chat_id: ChatId, user_id: i64) -> AppResult<()> {
    require_admin(user_id)?;

    let step = sessions.start(user_id);
    log::info!("Admin {} started the add-video wizard", user_id);

    bot.send_message(
        chat_id,
        format!("➕ Adding a new video. Send /cancel at any point to abort.\n\n{}", step.prompt()),
    )
    .await?;
    Ok(())
}

/// `/cancel`: abort the admin's wizard, if any.
pub async fn handle_cancel(bot: &Bot, sessions: &SessionStore, chat_id: ChatId, user_id: i64) -> AppResult<()> {
    let text = if sessions.cancel(user_id) {
        "Wizard cancelled. Nothing was saved."
    } else {
        "Nothing to cancel."
    };
    bot.send_message(chat_id, text).await?;
    Ok(())
}

/// Persists a completed wizard draft to the catalog.
pub async fn finish_addvideo(bot: &Bot, db_pool: Arc<DbPool>, chat_id: ChatId, draft: &NewVideo) -> AppResult<()> {
    let video_id = {
        let conn = get_connection(&db_pool)?;
        catalog::add_video(&conn, draft)?
    };

    log::info!("Catalog: added {} ({})", catalog::format_video_id(video_id), draft.title);
    bot.send_message(
        chat_id,
        format!(
            "✅ Added {} — \"{}\" at {} ⭐. It is live in /list now.",
            catalog::format_video_id(video_id),
            draft.title,
            draft.price
        ),
    )
    .await?;
    Ok(())
}

/// `/removevideo <id>`
pub async fn handle_removevideo(
    bot: &Bot,
    db_pool: Arc<DbPool>,
    chat_id: ChatId,
    user_id: i64,
    raw_id: &str,
) -> AppResult<()> {
    require_admin(user_id)?;
    let video_id = require_video_id(raw_id)?;

    {
        let conn = get_connection(&db_pool)?;
        catalog::remove_video(&conn, video_id)?;
    }

    log::info!("Catalog: admin {} removed {}", user_id, catalog::format_video_id(video_id));
    bot.send_message(
        chat_id,
        format!(
            "🗑 Removed {}. Existing purchases keep working.",
            catalog::format_video_id(video_id)
        ),
    )
    .await?;
    Ok(())
}

/// Parses `/updatevideo` arguments: an id followed by `key=value` pairs.
///
/// Values run until the next `key=` token, so titles with spaces work:
/// `video_1 title=Better Name price=75`. Known keys: title, description,
/// price, duration, category, tags (comma-separated). A bare `category=`
/// clears the category.
pub fn parse_update_args(args: &str) -> AppResult<(i64, VideoUpdate)> {
    let mut tokens = args.split_whitespace();
    let raw_id = tokens
        .next()
        .ok_or_else(|| AppError::Validation("Usage: /updatevideo <id> key=value ...".to_string()))?;
    let video_id = require_video_id(raw_id)?;

    let mut pairs: Vec<(String, String)> = Vec::new();
    for token in tokens {
        match token.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                pairs.push((key.to_ascii_lowercase(), value.to_string()));
            }
            _ => match pairs.last_mut() {
                // Continuation of the previous value
                Some((_, value)) => {
                    value.push(' ');
                    value.push_str(token);
                }
                None => {
                    return Err(AppError::Validation(format!("Expected key=value, got \"{}\".", token)));
                }
            },
        }
    }

    let mut update = VideoUpdate::default();
    for (key, value) in pairs {
        match key.as_str() {
            "title" => update.title = Some(value),
            "description" => update.description = Some(value),
            "price" => {
                let price = value
                    .parse::<i64>()
                    .map_err(|_| AppError::Validation(format!("Price must be a whole number, got \"{}\".", value)))?;
                update.price = Some(price);
            }
            "duration" => update.duration = Some(value),
            "category" => update.category = Some(value),
            "tags" => {
                update.tags = Some(
                    value
                        .split(',')
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect(),
                )
            }
            other => {
                return Err(AppError::Validation(format!("Unknown field \"{}\".", other)));
            }
        }
    }

    Ok((video_id, update))
}

/// `/updatevideo <id> key=value ...`
pub async fn handle_updatevideo(
    bot: &Bot,
    db_pool: Arc<DbPool>,
    chat_id: ChatId,
    user_id: i64,
    args: &str,
) -> AppResult<()> {
    require_admin(user_id)?;
    let (video_id, update) = parse_update_args(args)?;

    let video = {
        let conn = get_connection(&db_pool)?;
        catalog::update_video(&conn, video_id, &update)?
    };

    log::info!("Catalog: admin {} updated {}", user_id, catalog::format_video_id(video_id));
    bot.send_message(
        chat_id,
        format!(
            "✅ Updated {} — \"{}\" is now {} ⭐.",
            catalog::format_video_id(video.id),
            video.title,
            video.price
        ),
    )
    .await?;
    Ok(())
}

/// `/sales`: aggregate report from recorded purchases.
pub async fn handle_sales(bot: &Bot, db_pool: Arc<DbPool>, chat_id: ChatId, user_id: i64) -> AppResult<()> {
    require_admin(user_id)?;

    let summary = {
        let conn = get_connection(&db_pool)?;
        users::sales_summary(&conn)?
    };

    let mut text = format!(
        "📊 Sales report ({})\n\nTotal purchases: {}\nTotal revenue: {} ⭐\nKnown users: {}\n",
        chrono::Utc::now().format("%Y-%m-%d %H:%M UTC"),
        summary.total_purchases,
        summary.total_revenue,
        summary.known_users
    );
    if !summary.per_video.is_empty() {
        text.push_str("\nPer video:\n");
        for line in &summary.per_video {
            text.push_str(&format!(
                "{} — {}: {} sold, {} ⭐\n",
                catalog::format_video_id(line.video_id),
                line.title,
                line.purchases,
                line.revenue
            ));
        }
    }

    bot.send_message(chat_id, text).await?;
    Ok(())
}

/// `/broadcast <text>`: send a message to every known user.
///
/// Sends sequentially with a small delay between users so the Bot API
/// flood limits are respected. Individual failures (blocked bot, deleted
/// account) are logged and skipped.
pub async fn handle_broadcast(
    bot: &Bot,
    db_pool: Arc<DbPool>,
    chat_id: ChatId,
    user_id: i64,
    text: &str,
) -> AppResult<()> {
    require_admin(user_id)?;

    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Usage: /broadcast <message text>".to_string()));
    }

    let recipients = {
        let conn = get_connection(&db_pool)?;
        users::all_user_ids(&conn)?
    };

    log::info!("Broadcast by admin {} to {} user(s)", user_id, recipients.len());

    let mut sent = 0usize;
    let mut failed = 0usize;
    for recipient in recipients {
        match bot.send_message(ChatId(recipient), text).await {
            Ok(_) => sent += 1,
            Err(e) => {
                failed += 1;
                log::warn!("Broadcast to {} failed: {}", recipient, e);
            }
        }
        tokio::time::sleep(config::broadcast::inter_send_delay()).await;
    }

    bot.send_message(chat_id, format!("📣 Broadcast done: {} sent, {} failed.", sent, failed))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_update_args_simple() {
        let (id, update) = parse_update_args("video_1 price=75").unwrap();
        assert_eq!(id, 1);
        assert_eq!(update.price, Some(75));
        assert!(update.title.is_none());
    }

    #[test]
    fn test_parse_update_args_title_with_spaces() {
        let (id, update) = parse_update_args("3 title=Better Name Here price=50").unwrap();
        assert_eq!(id, 3);
        assert_eq!(update.title.as_deref(), Some("Better Name Here"));
        assert_eq!(update.price, Some(50));
    }

    #[test]
    fn test_parse_update_args_tags() {
        let (_, update) = parse_update_args("video_2 tags=rust, async ,tutorial").unwrap();
        assert_eq!(
            update.tags,
            Some(vec!["rust".to_string(), "async".to_string(), "tutorial".to_string()])
        );
    }

    #[test]
    fn test_parse_update_args_empty_category_clears() {
        let (_, update) = parse_update_args("video_1 category= price=50").unwrap();
        assert_eq!(update.category.as_deref(), Some(""));
        assert_eq!(update.price, Some(50));
    }

    #[test]
    fn test_parse_update_args_rejects_garbage() {
        assert!(matches!(parse_update_args(""), Err(AppError::Validation(_))));
        assert!(matches!(parse_update_args("notanid price=5"), Err(AppError::Validation(_))));
        assert!(matches!(parse_update_args("video_1 price=cheap"), Err(AppError::Validation(_))));
        assert!(matches!(parse_update_args("video_1 bogus=1"), Err(AppError::Validation(_))));
        assert!(matches!(parse_update_args("video_1 stray"), Err(AppError::Validation(_))));
    }
}
