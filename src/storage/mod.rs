//! Durable stores: SQLite pool, catalog, users/purchases

pub mod catalog;
pub mod db;
pub mod users;

pub use db::{create_pool, get_connection, DbConnection, DbPool};
