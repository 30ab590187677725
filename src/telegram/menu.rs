//! Main menu and inline keyboard callbacks
//!
//! Callback data is a short `action:argument` string:
//! `menu:main`, `menu:videos`, `menu:purchases`, `view:<id>`, `buy:<id>`,
//! `watch:<id>`. Everything else is answered and ignored.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::error::AppResult;
use crate::storage::catalog::Video;
use crate::storage::db::DbPool;
use crate::storage::users::Purchase;
use crate::telegram::{commands, Bot};

/// Shows the main menu.
pub async fn show_main_menu(bot: &Bot, chat_id: ChatId) -> AppResult<()> {
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback("🎬 Browse videos".to_string(), "menu:videos")],
        vec![InlineKeyboardButton::callback("🛒 My purchases".to_string(), "menu:purchases")],
    ]);

    bot.send_message(
        chat_id,
        "👋 Welcome! I sell videos for Telegram Stars.\n\nPick an option below, or use /help for the command list.",
    )
    .reply_markup(keyboard)
    .await?;
    Ok(())
}

/// One "view" button per catalog entry.
pub fn catalog_keyboard(videos: &[Video]) -> InlineKeyboardMarkup {
    let rows = videos
        .iter()
        .map(|video| {
            vec![InlineKeyboardButton::callback(
                format!("🎬 {} ({} ⭐)", video.title, video.price),
                format!("view:{}", video.id),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

/// Buy button plus a way back to the catalog.
pub fn video_keyboard(video_id: i64, price: i64) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            format!("💳 Buy for {} ⭐", price),
            format!("buy:{}", video_id),
        )],
        vec![InlineKeyboardButton::callback("🔙 Back to catalog".to_string(), "menu:videos")],
    ])
}

/// One "watch again" button per purchase.
pub fn purchases_keyboard(purchases: &[Purchase]) -> InlineKeyboardMarkup {
    let rows = purchases
        .iter()
        .map(|purchase| {
            vec![InlineKeyboardButton::callback(
                format!("▶️ {}", purchase.title),
                format!("watch:{}", purchase.video_id),
            )]
        })
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(rows)
}

/// Routes an inline keyboard callback.
pub async fn handle_menu_callback(bot: Bot, q: CallbackQuery, db_pool: Arc<DbPool>) -> AppResult<()> {
    // Answer first so the button stops spinning even if handling fails
    bot.answer_callback_query(q.id.clone()).await?;

    let chat_id = match q.message.as_ref().map(|m| m.chat().id) {
        Some(chat_id) => chat_id,
        None => return Ok(()),
    };
    let user_id = q.from.id.0 as i64;

    let data = q.data.as_deref().unwrap_or_default();
    log::info!("Callback from user {}: {}", user_id, data);

    let result = match data.split_once(':') {
        Some(("menu", "main")) => show_main_menu(&bot, chat_id).await,
        Some(("menu", "videos")) => commands::handle_list(&bot, db_pool, chat_id).await,
        Some(("menu", "purchases")) => commands::handle_mypurchases(&bot, db_pool, chat_id, user_id).await,
        Some(("view", id)) => commands::handle_view(&bot, db_pool, chat_id, id).await,
        Some(("buy", id)) => commands::handle_buy(&bot, db_pool, chat_id, user_id, id).await,
        Some(("watch", id)) => match commands::require_video_id(id) {
            Ok(video_id) => commands::handle_rewatch(&bot, db_pool, chat_id, user_id, video_id).await,
            Err(e) => Err(e),
        },
        _ => {
            log::warn!("Unknown callback data: {}", data);
            Ok(())
        }
    };

    if let Err(e) = result {
        log::error!("Callback '{}' failed for user {}: {}", data, user_id, e);
        bot.send_message(chat_id, e.user_message()).await?;
    }
    Ok(())
}
