//! Dispatcher schema and handler chain builders

use std::sync::Arc;

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use crate::core::error::{AppError, AppResult};
use crate::payment::flow;
use crate::storage::db::DbPool;
use crate::telegram::bot::Command;
use crate::telegram::notifications::notify_admin_text;
use crate::telegram::sessions::{SessionStore, WizardInput, WizardOutcome};
use crate::telegram::{admin, commands, menu, Bot};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub db_pool: Arc<DbPool>,
    pub sessions: Arc<SessionStore>,
}

impl HandlerDeps {
    pub fn new(db_pool: Arc<DbPool>, sessions: Arc<SessionStore>) -> Self {
        Self { db_pool, sessions }
    }
}

/// Creates the main dispatcher schema for the Telegram bot.
///
/// This function returns a handler tree that can be used with teloxide's
/// Dispatcher. The same schema is used in production and in integration
/// tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_payment = deps.clone();
    let deps_cancel = deps.clone();
    let deps_commands = deps.clone();
    let deps_wizard = deps.clone();
    let deps_precheckout = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        // Successful payment handler must be first
        .branch(successful_payment_handler(deps_payment))
        // Hidden /cancel command (not in Command enum, aborts the wizard)
        .branch(cancel_handler(deps_cancel))
        // Command handler
        .branch(command_handler(deps_commands))
        // Wizard inputs from admins with an active add-video session
        .branch(wizard_message_handler(deps_wizard))
        // Pre-checkout query handler
        .branch(pre_checkout_handler(deps_precheckout))
        // Callback query handler
        .branch(callback_handler(deps_callback))
}

fn user_id_of(msg: &Message) -> i64 {
    msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(msg.chat.id.0)
}

/// Sends the user-safe message for an error; the full error goes to the log.
async fn report_error(bot: &Bot, chat_id: ChatId, context: &str, result: AppResult<()>) {
    if let Err(e) = result {
        log::error!("{} failed: {}", context, e);
        if let Err(send_err) = bot.send_message(chat_id, e.user_message()).await {
            log::error!("Failed to report error to chat {}: {}", chat_id.0, send_err);
        }
    }
}

/// The payment flow sends its own admin DM for these; a second generic
/// escalation here would page the operator twice for one event.
fn escalated_in_flow(e: &AppError) -> bool {
    matches!(e, AppError::PaymentVerification(_) | AppError::DeliveryFailed(_))
}

/// Handler for successful Telegram payments
fn successful_payment_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.successful_payment().is_some())
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                log::info!("Received successful_payment message");

                if let Err(e) = flow::handle_successful_payment(&bot, Arc::clone(&deps.db_pool), &msg).await {
                    log::error!("Failed to handle successful payment: {:?}", e);
                    if !escalated_in_flow(&e) {
                        notify_admin_text(
                            &bot,
                            &format!("PAYMENT HANDLER ERROR\nchat_id: {}\nerror: {:?}", msg.chat.id.0, e),
                        )
                        .await;
                    }
                }
                Ok(())
            }
        })
}

/// Handler for the hidden /cancel command
fn cancel_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().map(|text| text.starts_with("/cancel")).unwrap_or(false))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let user_id = user_id_of(&msg);
                let result = admin::handle_cancel(&bot, &deps.sessions, msg.chat.id, user_id).await;
                report_error(&bot, msg.chat.id, "/cancel", result).await;
                Ok(())
            }
        })
}

/// Handler for commands from the Command enum
fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter_command::<Command>()
        .endpoint(move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                let chat_id = msg.chat.id;
                let user_id = user_id_of(&msg);
                log::info!("Command {:?} from user {}", cmd, user_id);

                let result = match cmd {
                    Command::Start => commands::handle_start(&bot, deps.db_pool, &msg).await,
                    Command::Help => commands::handle_help(&bot, chat_id).await,
                    Command::List => commands::handle_list(&bot, deps.db_pool, chat_id).await,
                    Command::View(raw_id) => commands::handle_view(&bot, deps.db_pool, chat_id, &raw_id).await,
                    Command::Buy(raw_id) => commands::handle_buy(&bot, deps.db_pool, chat_id, user_id, &raw_id).await,
                    Command::Mypurchases => commands::handle_mypurchases(&bot, deps.db_pool, chat_id, user_id).await,
                    Command::Addvideo => admin::handle_addvideo(&bot, &deps.sessions, chat_id, user_id).await,
                    Command::Removevideo(raw_id) => {
                        admin::handle_removevideo(&bot, deps.db_pool, chat_id, user_id, &raw_id).await
                    }
                    Command::Updatevideo(args) => {
                        admin::handle_updatevideo(&bot, deps.db_pool, chat_id, user_id, &args).await
                    }
                    Command::Sales => admin::handle_sales(&bot, deps.db_pool, chat_id, user_id).await,
                    Command::Broadcast(text) => {
                        admin::handle_broadcast(&bot, deps.db_pool, chat_id, user_id, &text).await
                    }
                };

                report_error(&bot, chat_id, "Command", result).await;
                Ok(())
            }
        })
}

/// Handler for add-video wizard inputs
///
/// Only fires for users with an active session, so ordinary messages from
/// everyone else fall through untouched.
fn wizard_message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_filter = deps.clone();
    Update::filter_message()
        .filter(move |msg: Message| deps_filter.sessions.is_active(user_id_of(&msg)))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move {
                let chat_id = msg.chat.id;
                let user_id = user_id_of(&msg);

                let input = if let Some(video) = msg.video() {
                    WizardInput::VideoFile {
                        file_id: video.file.id.0.as_str(),
                    }
                } else if let Some(text) = msg.text() {
                    WizardInput::Text(text)
                } else {
                    let _ = bot
                        .send_message(chat_id, "Please answer with text, or the video file on the last step.")
                        .await;
                    return Ok(());
                };

                let step = match deps.sessions.advance(user_id, input) {
                    Some((WizardOutcome::Complete, Some(draft))) => {
                        let result = admin::finish_addvideo(&bot, deps.db_pool, chat_id, &draft).await;
                        report_error(&bot, chat_id, "Add-video wizard", result).await;
                        return Ok(());
                    }
                    Some((WizardOutcome::Next(step), _)) => step,
                    Some((WizardOutcome::Invalid(reason), _)) => {
                        let _ = bot.send_message(chat_id, reason).await;
                        return Ok(());
                    }
                    Some((WizardOutcome::Complete, None)) | None => {
                        // Session expired between the filter and here
                        let _ = bot
                            .send_message(chat_id, "That wizard has expired. Start again with /addvideo.")
                            .await;
                        return Ok(());
                    }
                };

                let _ = bot.send_message(chat_id, step.prompt()).await;
                Ok(())
            }
        })
}

/// Handler for pre-checkout queries (Telegram payments)
fn pre_checkout_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_pre_checkout_query().endpoint(move |bot: Bot, query: teloxide::types::PreCheckoutQuery| {
        let deps = deps.clone();
        async move {
            log::info!(
                "Received pre_checkout_query: id={}, payload={}",
                query.id,
                query.invoice_payload
            );

            if let Err(e) = flow::approve_pre_checkout(&bot, Arc::clone(&deps.db_pool), &query).await {
                log::error!("Failed to answer pre_checkout_query: {:?}", e);
            }
            Ok(())
        }
    })
}

/// Handler for callback queries (inline keyboard buttons)
fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query().endpoint(move |bot: Bot, q: CallbackQuery| {
        let deps = deps.clone();
        async move {
            if let Err(e) = menu::handle_menu_callback(bot, q, deps.db_pool.clone()).await {
                log::error!("Callback handler failed: {}", e);
            }
            Ok(())
        }
    })
}
