//! User-facing command handlers
//!
//! Handlers here return `AppResult<()>`; the dispatcher maps any error to
//! `AppError::user_message()` so internal detail never reaches the chat.

use std::sync::Arc;

use teloxide::prelude::*;

use crate::core::error::{AppError, AppResult};
use crate::payment::flow;
use crate::storage::db::DbPool;
use crate::storage::{catalog, get_connection, users};
use crate::telegram::menu;
use crate::telegram::Bot;

/// Parses a user-supplied video id argument or explains the expected shape.
pub fn require_video_id(raw: &str) -> AppResult<i64> {
    catalog::parse_video_id(raw).ok_or_else(|| {
        AppError::Validation("Please give a video id, e.g. video_1. Use /list to see what's available.".to_string())
    })
}

/// `/start`: greet and show the main menu.
pub async fn handle_start(bot: &Bot, db_pool: Arc<DbPool>, msg: &Message) -> AppResult<()> {
    let user_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(msg.chat.id.0);
    let username = msg.from.as_ref().and_then(|u| u.username.as_deref());

    {
        let conn = get_connection(&db_pool)?;
        users::get_or_create_user(&conn, user_id, username)?;
    }

    menu::show_main_menu(bot, msg.chat.id).await?;
    Ok(())
}

/// `/help`: the command list.
pub async fn handle_help(bot: &Bot, chat_id: ChatId) -> AppResult<()> {
    use teloxide::utils::command::BotCommands;

    bot.send_message(chat_id, crate::telegram::Command::descriptions().to_string())
        .await?;
    Ok(())
}

/// `/list`: the full catalog, one line per video.
pub async fn handle_list(bot: &Bot, db_pool: Arc<DbPool>, chat_id: ChatId) -> AppResult<()> {
    let videos = {
        let conn = get_connection(&db_pool)?;
        catalog::list_videos(&conn)?
    };

    if videos.is_empty() {
        bot.send_message(chat_id, "The catalog is empty right now. Check back later!")
            .await?;
        return Ok(());
    }

    let mut text = String::from("🎬 Available videos:\n\n");
    for video in &videos {
        text.push_str(&format!(
            "{} — {} ({} ⭐{})\n",
            catalog::format_video_id(video.id),
            video.title,
            video.price,
            if video.duration.is_empty() {
                String::new()
            } else {
                format!(", {}", video.duration)
            }
        ));
    }
    text.push_str("\nUse /view <id> for details or /buy <id> to purchase.");

    bot.send_message(chat_id, text)
        .reply_markup(menu::catalog_keyboard(&videos))
        .await?;
    Ok(())
}

/// `/view <id>`: full details for one video.
pub async fn handle_view(bot: &Bot, db_pool: Arc<DbPool>, chat_id: ChatId, raw_id: &str) -> AppResult<()> {
    let video_id = require_video_id(raw_id)?;

    let video = {
        let conn = get_connection(&db_pool)?;
        catalog::get_video(&conn, video_id)?
            .ok_or_else(|| AppError::NotFound(format!("Video {}", catalog::format_video_id(video_id))))?
    };

    let mut text = format!(
        "🎬 {}\n\n{}\n\nPrice: {} ⭐",
        video.title, video.description, video.price
    );
    if !video.duration.is_empty() {
        text.push_str(&format!("\nDuration: {}", video.duration));
    }
    if let Some(category) = &video.category {
        text.push_str(&format!("\nCategory: {}", category));
    }
    if !video.tags.is_empty() {
        text.push_str(&format!("\nTags: {}", video.tags.join(", ")));
    }

    bot.send_message(chat_id, text)
        .reply_markup(menu::video_keyboard(video.id, video.price))
        .await?;
    Ok(())
}

/// `/buy <id>`: kick off the purchase flow.
pub async fn handle_buy(
    bot: &Bot,
    db_pool: Arc<DbPool>,
    chat_id: ChatId,
    user_id: i64,
    raw_id: &str,
) -> AppResult<()> {
    let video_id = require_video_id(raw_id)?;
    flow::start_purchase(bot, db_pool, chat_id, user_id, video_id).await
}

/// `/mypurchases`: the user's purchase history with re-watch buttons.
///
/// Works entirely off purchase snapshots, so videos removed from the
/// catalog still show up and stay watchable.
pub async fn handle_mypurchases(bot: &Bot, db_pool: Arc<DbPool>, chat_id: ChatId, user_id: i64) -> AppResult<()> {
    let purchases = {
        let conn = get_connection(&db_pool)?;
        users::list_purchases(&conn, user_id)?
    };

    if purchases.is_empty() {
        bot.send_message(chat_id, "You haven't bought anything yet. Browse the catalog with /list.")
            .await?;
        return Ok(());
    }

    let mut text = String::from("🛒 Your purchases:\n\n");
    for purchase in &purchases {
        text.push_str(&format!(
            "{} — {} ({} ⭐, {})\n",
            catalog::format_video_id(purchase.video_id),
            purchase.title,
            purchase.price_paid,
            purchase.purchase_date
        ));
    }
    text.push_str("\nTap a button below to watch again.");

    bot.send_message(chat_id, text)
        .reply_markup(menu::purchases_keyboard(&purchases))
        .await?;
    Ok(())
}

/// Re-delivers an already-purchased video from its snapshot.
pub async fn handle_rewatch(
    bot: &Bot,
    db_pool: Arc<DbPool>,
    chat_id: ChatId,
    user_id: i64,
    video_id: i64,
) -> AppResult<()> {
    let purchase = {
        let conn = get_connection(&db_pool)?;
        users::get_purchase(&conn, user_id, video_id)?
            .ok_or_else(|| AppError::NotFound(format!("Purchase of {}", catalog::format_video_id(video_id))))?
    };

    use teloxide::types::{FileId, InputFile};
    bot.send_video(chat_id, InputFile::file_id(FileId(purchase.file_id)))
        .caption(format!("🎬 {}", purchase.title))
        .await
        .map_err(|e| AppError::DeliveryFailed(format!("re-delivery: {}", e)))?;
    Ok(())
}
