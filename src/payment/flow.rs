//! Purchase flow for Telegram Stars payments
//!
//! One purchase moves through an explicit state machine:
//!
//! Requested -> InvoiceSent -> PaymentConfirmed -> Delivered -> Recorded
//!
//! Failed is terminal for anything that aborts before payment capture.
//! After capture the flow never aborts: a delivery error still records the
//! purchase (the user paid) and escalates to the operator instead.
//!
//! Every transition is logged with the purchase's correlation id so one
//! purchase can be traced across process restarts.

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::{
    FileId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, LabeledPrice, PreCheckoutQuery,
};
use url::Url;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::payment::invoices::{self, PendingInvoice};
use crate::storage::db::DbPool;
use crate::storage::users::{self, NewPurchase};
use crate::storage::{catalog, get_connection};
use crate::telegram::notifications;
use crate::telegram::Bot;

/// States a purchase passes through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurchaseState {
    Requested,
    InvoiceSent,
    PaymentConfirmed,
    Delivered,
    Recorded,
    Failed,
}

impl std::fmt::Display for PurchaseState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PurchaseState::Requested => "Requested",
            PurchaseState::InvoiceSent => "InvoiceSent",
            PurchaseState::PaymentConfirmed => "PaymentConfirmed",
            PurchaseState::Delivered => "Delivered",
            PurchaseState::Recorded => "Recorded",
            PurchaseState::Failed => "Failed",
        };
        f.write_str(name)
    }
}

fn transition(correlation_id: &str, from: PurchaseState, to: PurchaseState) {
    log::info!("💳 Purchase [{}]: {} -> {}", correlation_id, from, to);
}

/// Starts a purchase: validates the request, sends a Stars invoice and
/// persists the pending invoice for later confirmation matching.
///
/// # Errors
///
/// `NotFound` for an unknown video, `Validation` if the user already owns
/// it, `ExternalTimeout` if invoice creation does not complete in time.
pub async fn start_purchase(
    bot: &Bot,
    db_pool: Arc<DbPool>,
    chat_id: ChatId,
    user_id: i64,
    video_id: i64,
) -> AppResult<()> {
    let correlation_id = invoices::new_correlation_id();
    log::info!("💳 Purchase [{}]: {} by user {}", correlation_id, PurchaseState::Requested, user_id);

    let video = {
        let conn = get_connection(&db_pool)?;

        let video = catalog::get_video(&conn, video_id)?
            .ok_or_else(|| AppError::NotFound(format!("Video {}", catalog::format_video_id(video_id))))?;

        if users::has_purchased(&conn, user_id, video_id)? {
            return Err(AppError::Validation(
                "You already own this video. Find it under /mypurchases.".to_string(),
            ));
        }
        video
    };

    // Validation bounds prices on write, but the row is older than this
    // process; never truncate a stored price into a smaller invoice.
    let invoice_amount = u32::try_from(video.price).map_err(|_| {
        AppError::Validation(format!(
            "Stored price {} for {} is outside the invoice range.",
            video.price,
            catalog::format_video_id(video.id)
        ))
    })?;

    let payload = invoices::payload_for(&correlation_id);
    log::info!(
        "📦 Creating invoice: user={}, video={}, price={} Stars, payload={}",
        user_id,
        catalog::format_video_id(video.id),
        video.price,
        payload
    );

    let invoice_link = tokio::time::timeout(
        config::payment::external_call_timeout(),
        bot.create_invoice_link(
            video.title.clone(),
            video.description.clone(),
            payload,
            config::payment::CURRENCY.to_string(),
            vec![LabeledPrice::new(video.title.clone(), invoice_amount)],
        ),
    )
    .await
    .map_err(|_| {
        transition(&correlation_id, PurchaseState::Requested, PurchaseState::Failed);
        AppError::ExternalTimeout("create_invoice_link")
    })??;

    // Persist before telling the user: a confirmation must never arrive for
    // an invoice we cannot verify.
    {
        let conn = get_connection(&db_pool)?;
        invoices::insert(
            &conn,
            &PendingInvoice {
                correlation_id: correlation_id.clone(),
                user_id,
                video_id: video.id,
                title: video.title.clone(),
                file_id: video.file_id.clone(),
                price: video.price,
            },
        )?;
    }

    let invoice_url = Url::parse(&invoice_link)
        .map_err(|e| AppError::PaymentVerification(format!("Invalid invoice URL: {}", e)))?;

    let keyboard = InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url(
        format!("💳 Pay {} ⭐", video.price),
        invoice_url,
    )]]);

    bot.send_message(
        chat_id,
        format!(
            "🎬 {}\n\n{}\n\nPrice: {} ⭐\nTap the button below to pay:",
            video.title, video.description, video.price
        ),
    )
    .reply_markup(keyboard)
    .await?;

    transition(&correlation_id, PurchaseState::Requested, PurchaseState::InvoiceSent);
    Ok(())
}

/// Answers a pre-checkout query.
///
/// Approves only if the payload carries a correlation id that still matches
/// an outstanding invoice for this user and the video is not already owned.
/// Telegram requires an answer within 10 seconds, so this does one indexed
/// lookup and nothing else.
pub async fn approve_pre_checkout(bot: &Bot, db_pool: Arc<DbPool>, query: &PreCheckoutQuery) -> AppResult<()> {
    let buyer_id = query.from.id.0 as i64;

    let verdict = pre_checkout_verdict(&db_pool, buyer_id, &query.invoice_payload);

    match verdict {
        Ok(()) => {
            log::info!(
                "✅ Pre-checkout approved: user={}, payload={}",
                buyer_id,
                query.invoice_payload
            );
            bot.answer_pre_checkout_query(query.id.clone(), true).await?;
        }
        Err(reason) => {
            log::warn!(
                "🚫 Pre-checkout rejected: user={}, payload={}, reason={}",
                buyer_id,
                query.invoice_payload,
                reason
            );
            bot.answer_pre_checkout_query(query.id.clone(), false)
                .error_message(reason.user_message())
                .await?;
        }
    }
    Ok(())
}

fn pre_checkout_verdict(db_pool: &DbPool, buyer_id: i64, payload: &str) -> AppResult<()> {
    let correlation_id = invoices::parse_payload(payload)
        .ok_or_else(|| AppError::PaymentVerification(format!("foreign payload: {}", payload)))?;

    let conn = get_connection(db_pool)?;

    let pending = invoices::peek(&conn, correlation_id)?
        .ok_or_else(|| AppError::PaymentVerification(format!("no pending invoice for {}", correlation_id)))?;

    if pending.user_id != buyer_id {
        return Err(AppError::PaymentVerification(format!(
            "invoice {} belongs to user {}, checkout from {}",
            correlation_id, pending.user_id, buyer_id
        )));
    }

    if users::has_purchased(&conn, buyer_id, pending.video_id)? {
        return Err(AppError::Validation(
            "You already own this video. Find it under /mypurchases.".to_string(),
        ));
    }

    Ok(())
}

/// Handles a successful payment confirmation.
///
/// Consumes the pending invoice atomically, delivers the content and
/// records the purchase with the invoiced price. A confirmation whose
/// correlation id matches nothing is flagged to the operator and otherwise
/// ignored: it must never trigger delivery.
pub async fn handle_successful_payment(bot: &Bot, db_pool: Arc<DbPool>, msg: &Message) -> AppResult<()> {
    let payment = match msg.successful_payment() {
        Some(payment) => payment,
        None => return Ok(()),
    };

    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("💳 SUCCESSFUL PAYMENT EVENT");
    log::info!("  • Currency: {}", payment.currency);
    log::info!("  • Total amount: {}", payment.total_amount);
    log::info!("  • Invoice payload: {}", payment.invoice_payload);
    log::info!("  • Charge ID: {}", payment.telegram_payment_charge_id.0);
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let buyer_id = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(0);
    let charge_id = payment.telegram_payment_charge_id.0.clone();

    let pending = {
        let conn = get_connection(&db_pool)?;
        invoices::parse_payload(&payment.invoice_payload)
            .map(|correlation_id| invoices::take(&conn, correlation_id))
            .transpose()?
            .flatten()
    };

    let pending = match pending {
        Some(pending) => pending,
        None => {
            // Captured money with no matching invoice. Never deliver; wake
            // an operator instead.
            let err = AppError::PaymentVerification(format!(
                "confirmation with no pending invoice: payload={}, charge_id={}",
                payment.invoice_payload, charge_id
            ));
            log::error!("🚨 {}", err);
            notifications::notify_admin_payment_flagged(bot, buyer_id, &payment.invoice_payload, &charge_id).await;
            bot.send_message(msg.chat.id, err.user_message()).await?;
            return Err(err);
        }
    };

    transition(
        &pending.correlation_id,
        PurchaseState::InvoiceSent,
        PurchaseState::PaymentConfirmed,
    );

    if pending.user_id != buyer_id {
        log::warn!(
            "Confirmation sender {} differs from invoice owner {}; recording for the invoice owner",
            buyer_id,
            pending.user_id
        );
    }

    let delivery = deliver(bot, msg.chat.id, &pending).await;

    match &delivery {
        Ok(()) => {
            transition(
                &pending.correlation_id,
                PurchaseState::PaymentConfirmed,
                PurchaseState::Delivered,
            );
        }
        Err(e) => {
            // Payment is captured; the purchase is still recorded below so
            // the user can re-deliver from /mypurchases.
            log::error!("❌ Delivery failed for purchase [{}]: {}", pending.correlation_id, e);
            notifications::notify_admin_delivery_failed(bot, pending.user_id, pending.video_id, &charge_id).await;
        }
    }

    record(&db_pool, &pending, &charge_id)?;
    transition(
        &pending.correlation_id,
        if delivery.is_ok() {
            PurchaseState::Delivered
        } else {
            PurchaseState::PaymentConfirmed
        },
        PurchaseState::Recorded,
    );

    match delivery {
        Ok(()) => {
            bot.send_message(
                msg.chat.id,
                format!("✅ Thank you! \"{}\" is yours. Find it anytime under /mypurchases.", pending.title),
            )
            .await?;
            Ok(())
        }
        Err(e) => {
            bot.send_message(msg.chat.id, e.user_message()).await?;
            Err(e)
        }
    }
}

/// Sends the purchased video by its stored Telegram file id.
pub async fn deliver(bot: &Bot, chat_id: ChatId, pending: &PendingInvoice) -> AppResult<()> {
    let send = bot
        .send_video(chat_id, InputFile::file_id(FileId(pending.file_id.clone())))
        .caption(format!("🎬 {}", pending.title));

    tokio::time::timeout(config::payment::external_call_timeout(), send)
        .await
        .map_err(|_| AppError::DeliveryFailed(format!("send_video timed out for {}", pending.file_id)))?
        .map_err(|e| AppError::DeliveryFailed(format!("send_video: {}", e)))?;

    Ok(())
}

/// Records the purchase with the snapshot taken at invoice time.
///
/// The invoiced price is what gets recorded, regardless of any catalog
/// price change in between. `record_purchase` returning `false` means a
/// duplicate confirmation lost the race, which is fine: the history row
/// already exists.
fn record(db_pool: &DbPool, pending: &PendingInvoice, charge_id: &str) -> AppResult<()> {
    let conn = get_connection(db_pool)?;

    let inserted = users::record_purchase(
        &conn,
        pending.user_id,
        &NewPurchase {
            video_id: pending.video_id,
            title: pending.title.clone(),
            file_id: pending.file_id.clone(),
            price_paid: pending.price,
            charge_id: Some(charge_id.to_string()),
        },
    )?;

    if inserted {
        log::info!(
            "💾 Purchase recorded: user={}, video={}, price_paid={}, charge_id={}",
            pending.user_id,
            catalog::format_video_id(pending.video_id),
            pending.price,
            charge_id
        );
    } else {
        log::warn!(
            "Duplicate purchase ignored: user={}, video={}",
            pending.user_id,
            catalog::format_video_id(pending.video_id)
        );
    }
    Ok(())
}
