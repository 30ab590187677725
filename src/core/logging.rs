//! Logging initialization and startup diagnostics
//!
//! This module provides:
//! - Logger initialization (console + file)
//! - Admin/payment configuration validation and logging at startup

use anyhow::Result;
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;

use crate::core::config;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
///
/// # Returns
/// * `Ok(())` - Logger initialized successfully
/// * `Err(anyhow::Error)` - Failed to initialize logger
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs admin and payment configuration at application startup
///
/// Validates and logs:
/// - ADMIN_IDS / ADMIN_USER_ID presence (admin commands and escalations)
/// - Pending invoice TTL and external call timeout
pub fn log_startup_configuration() {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("⚙️  Startup Configuration Check");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let admin_ids = &*config::admin::ADMIN_IDS;
    if admin_ids.is_empty() {
        log::warn!("⚠️  ADMIN_IDS: not set — admin commands will be rejected for everyone");
    } else {
        log::info!("✅ ADMIN_IDS: {} admin(s) configured", admin_ids.len());
    }

    let admin_user_id = *config::admin::ADMIN_USER_ID;
    if admin_user_id == 0 {
        log::warn!("⚠️  ADMIN_USER_ID: not set — delivery failures cannot be escalated to an operator!");
    } else {
        log::info!("✅ ADMIN_USER_ID: {} (operator channel for escalations)", admin_user_id);
    }

    log::info!("📦 DATABASE_PATH: {}", &*config::DATABASE_PATH);
    log::info!(
        "💫 Payment: currency={}, pending invoice TTL={}s, external call timeout={}s",
        config::payment::CURRENCY,
        config::payment::PENDING_INVOICE_TTL_SECS,
        config::payment::EXTERNAL_CALL_TIMEOUT_SECS
    );
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
