use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tokio::time::{interval, sleep};

use starmart::core::{config, init_logger, log_startup_configuration};
use starmart::payment::invoices;
use starmart::storage::{create_pool, get_connection};
use starmart::telegram::sessions::SessionStore;
use starmart::telegram::{create_bot, notifications, schema, setup_bot_commands, HandlerDeps};

/// Main entry point for the Telegram bot
///
/// # Errors
/// Returns an error if initialization fails (logging, database, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Set up global panic handler to catch panics in dispatcher
    // This allows us to log the panic and continue working instead of terminating
    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("Panic caught: {:?}", panic_info);
        if let Some(location) = panic_info.location() {
            log::error!("Panic at {}:{}:{}", location.file(), location.line(), location.column());
        }
        if let Some(msg) = panic_info.payload().downcast_ref::<&str>() {
            log::error!("Panic message: {}", msg);
        }
    }));

    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::LOG_FILE_PATH)?;

    log::info!("Starting bot...");
    log_startup_configuration();

    // Create database connection pool
    let db_pool = Arc::new(
        create_pool(&config::DATABASE_PATH).map_err(|e| anyhow::anyhow!("Failed to create database pool: {}", e))?,
    );

    // Create bot instance
    let bot = create_bot()?;

    // Get bot information; retry while the Bot API is still initializing
    let bot_info = {
        let startup_max_retries = 60;
        let mut startup_retry = 0;
        loop {
            match bot.get_me().await {
                Ok(info) => break info,
                Err(e) => {
                    let err_str = e.to_string();
                    let is_retryable = err_str.contains("restart")
                        || err_str.contains("network")
                        || err_str.contains("connection")
                        || err_str.contains("timed out")
                        || err_str.contains("Connection refused");

                    startup_retry += 1;
                    if startup_retry >= startup_max_retries || !is_retryable {
                        return Err(anyhow::anyhow!(
                            "Failed to connect to Bot API after {} retries: {}",
                            startup_retry,
                            e
                        ));
                    }

                    log::warn!(
                        "Bot API not ready (attempt {}/{}): {}. Retrying in 5 seconds...",
                        startup_retry,
                        startup_max_retries,
                        err_str
                    );
                    sleep(Duration::from_secs(5)).await;
                }
            }
        }
    };
    let bot_username = bot_info.username.as_deref().unwrap_or("starmart_bot");
    log::info!("Bot username: @{}, Bot ID: {}", bot_username, bot_info.id);

    // Set up bot commands in the Telegram UI
    setup_bot_commands(&bot).await?;

    // Notify admin about bot startup/restart
    notifications::notify_admin_startup(&bot, bot_username).await;

    // In-memory wizard sessions
    let sessions = Arc::new(SessionStore::new());

    // Purge expired pending invoices: once at startup, then periodically
    let db_pool_purge = Arc::clone(&db_pool);
    tokio::spawn(async move {
        let mut interval = interval(config::payment::purge_interval());
        loop {
            interval.tick().await;
            match get_connection(&db_pool_purge) {
                Ok(conn) => {
                    if let Err(e) = invoices::purge_expired(&conn) {
                        log::error!("Failed to purge expired pending invoices: {}", e);
                    }
                }
                Err(e) => log::error!("Failed to get DB connection for invoice purge: {}", e),
            }
        }
    });

    // Purge expired wizard sessions
    let sessions_purge = Arc::clone(&sessions);
    tokio::spawn(async move {
        let mut interval = interval(config::session::purge_interval());
        loop {
            interval.tick().await;
            sessions_purge.purge_expired();
        }
    });

    // Create handler dependencies for the modular schema
    let handler_deps = HandlerDeps::new(Arc::clone(&db_pool), Arc::clone(&sessions));
    let handler = schema(handler_deps);

    log::info!("================================================");
    log::info!("📡 Starting bot in long polling mode");
    log::info!("================================================");

    // Run the dispatcher with retry logic
    let mut retry_count = 0;
    let max_retries = config::retry::MAX_DISPATCHER_RETRIES;
    loop {
        let bot_clone = bot.clone();
        let handler_clone = handler.clone();

        // Create a new dispatcher in a separate task to isolate panics
        // "TX is dead" panics will be caught via the JoinHandle
        let handle = tokio::spawn(async move {
            use teloxide::update_listeners::Polling;

            // Create polling listener that drops pending updates on start
            let listener = Polling::builder(bot_clone.clone()).drop_pending_updates().build();

            Dispatcher::builder(bot_clone, handler_clone)
                .dependencies(DependencyMap::new())
                .enable_ctrlc_handler()
                .build()
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("An error from the update listener"),
                )
                .await
        });

        match handle.await {
            Ok(()) => {
                log::info!("Dispatcher shutdown gracefully");
                break;
            }
            Err(join_err) => {
                if join_err.is_panic() {
                    let panic_msg = join_err.to_string();
                    log::error!("Dispatcher panicked: {}", panic_msg);

                    if retry_count < max_retries {
                        retry_count += 1;
                        log::info!(
                            "Retrying dispatcher connection after panic (attempt {}/{})...",
                            retry_count,
                            max_retries
                        );
                        exponential_backoff(retry_count).await;
                    } else {
                        log::error!("Max retries reached after panic. Exiting...");
                        break;
                    }
                } else {
                    log::warn!("Dispatcher task was cancelled: {}", join_err);
                    break;
                }
            }
        }

        // Add a delay between retries to avoid overwhelming the API
        if retry_count > 0 {
            sleep(config::retry::dispatcher_delay()).await;
        }
    }

    Ok(())
}

/// Exponential backoff delay for retries
async fn exponential_backoff(retry_count: u32) {
    let delay = Duration::from_secs(config::retry::EXPONENTIAL_BACKOFF_BASE.pow(retry_count));
    sleep(delay).await;
}
