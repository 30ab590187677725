//! Starmart - Telegram bot that sells videos for Telegram Stars
//!
//! This library provides all the core functionality for the Starmart bot:
//! the video catalog, purchase records, the Stars payment flow, and the
//! Telegram handlers on top.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, and logging
//! - `storage`: SQLite stores for the catalog, users, and purchases
//! - `payment`: Invoice correlation and the purchase state machine
//! - `telegram`: Telegram bot integration and handlers

pub mod core;
pub mod payment;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult};
pub use payment::{PendingInvoice, PurchaseState};
pub use storage::{create_pool, get_connection, DbConnection, DbPool};
pub use telegram::{create_bot, schema, HandlerDeps, HandlerError};
