//! Telegram bot integration and handlers

pub mod admin;
pub mod bot;
pub mod commands;
pub mod handlers;
pub mod menu;
pub mod notifications;
pub mod sessions;

pub use bot::{create_bot, setup_bot_commands, Command};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use teloxide::Bot;
