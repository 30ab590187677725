//! Operator notifications
//!
//! Best-effort messages to the configured admin chat. A failed notification
//! is logged and swallowed; it must never fail the flow that raised it.

use teloxide::prelude::*;

use crate::core::config::admin::ADMIN_USER_ID;
use crate::storage::catalog::format_video_id;
use crate::telegram::Bot;

/// Sends a plain-text notification to the administrator.
pub async fn notify_admin_text(bot: &Bot, text: &str) {
    let admin_id = *ADMIN_USER_ID;
    if admin_id == 0 {
        log::warn!("ADMIN_USER_ID not configured, notification dropped: {}", text);
        return;
    }

    if let Err(e) = bot.send_message(ChatId(admin_id), text).await {
        log::error!("Failed to send admin notification: {}", e);
    }
}

/// Startup banner for the operator.
pub async fn notify_admin_startup(bot: &Bot, bot_username: &str) {
    notify_admin_text(bot, &format!("🚀 @{} is up and polling for updates", bot_username)).await;
}

/// A payment was captured but delivery failed. The purchase is recorded and
/// the user can re-deliver from /mypurchases; the operator should check the
/// stored file_id.
pub async fn notify_admin_delivery_failed(bot: &Bot, user_id: i64, video_id: i64, charge_id: &str) {
    notify_admin_text(
        bot,
        &format!(
            "⚠️ DELIVERY FAILED after payment\n\nUser ID: {}\nVideo: {}\nCharge ID: {}\n\nPurchase was recorded; the user can retry from /mypurchases.",
            user_id,
            format_video_id(video_id),
            charge_id
        ),
    )
    .await;
}

/// A payment confirmation arrived that matches no outstanding invoice.
/// Money was captured; nothing was delivered. Needs a human.
pub async fn notify_admin_payment_flagged(bot: &Bot, user_id: i64, payload: &str, charge_id: &str) {
    notify_admin_text(
        bot,
        &format!(
            "🚨 UNMATCHED PAYMENT CONFIRMATION\n\nUser ID: {}\nPayload: {}\nCharge ID: {}\n\nNo delivery was made. Manual review required.",
            user_id, payload, charge_id
        ),
    )
    .await;
}
