//! User/Purchase store
//!
//! Users are created on first interaction. Purchase history is append-only:
//! rows are never updated or deleted, and the unique index on
//! (user_id, video_id) makes `record_purchase` an atomic check-and-append.

use rusqlite::Result;

use crate::storage::db::DbConnection;

/// A known bot user
#[derive(Debug, Clone)]
pub struct User {
    /// Telegram ID (platform-assigned)
    pub telegram_id: i64,
    /// Telegram username, display only
    pub username: Option<String>,
}

/// One recorded purchase
///
/// `title` and `file_id` are snapshots taken at purchase time so the record
/// stays displayable and re-deliverable after the video leaves the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct Purchase {
    pub video_id: i64,
    pub title: String,
    pub file_id: String,
    /// Price at invoice time, in Stars. Immutable once recorded.
    pub price_paid: i64,
    /// Telegram payment charge id, kept for audit
    pub charge_id: Option<String>,
    pub purchase_date: String,
}

/// Input for recording a new purchase
#[derive(Debug, Clone)]
pub struct NewPurchase {
    pub video_id: i64,
    pub title: String,
    pub file_id: String,
    pub price_paid: i64,
    pub charge_id: Option<String>,
}

/// Creates the user if unknown, otherwise refreshes the username. Idempotent.
pub fn get_or_create_user(conn: &DbConnection, telegram_id: i64, username: Option<&str>) -> Result<User> {
    conn.execute(
        "INSERT INTO users (telegram_id, username) VALUES (?1, ?2)
         ON CONFLICT(telegram_id) DO UPDATE SET username = excluded.username",
        &[&telegram_id as &dyn rusqlite::ToSql, &username as &dyn rusqlite::ToSql],
    )?;

    Ok(User {
        telegram_id,
        username: username.map(|s| s.to_string()),
    })
}

/// Gets a user by Telegram ID. Returns `Ok(None)` if unknown.
pub fn get_user(conn: &DbConnection, telegram_id: i64) -> Result<Option<User>> {
    let mut stmt = conn.prepare("SELECT telegram_id, username FROM users WHERE telegram_id = ?")?;
    let mut rows = stmt.query(&[&telegram_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(User {
            telegram_id: row.get(0)?,
            username: row.get(1)?,
        }))
    } else {
        Ok(None)
    }
}

/// Appends a purchase to the user's history.
///
/// Returns `true` if a row was inserted, `false` if the (user, video) pair
/// already had a purchase. `INSERT OR IGNORE` against the unique index makes
/// this safe under concurrent duplicate confirmations: exactly one caller
/// observes `true`.
pub fn record_purchase(conn: &DbConnection, user_id: i64, purchase: &NewPurchase) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO purchases (user_id, video_id, title, file_id, price_paid, charge_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        &[
            &user_id as &dyn rusqlite::ToSql,
            &purchase.video_id as &dyn rusqlite::ToSql,
            &purchase.title as &dyn rusqlite::ToSql,
            &purchase.file_id as &dyn rusqlite::ToSql,
            &purchase.price_paid as &dyn rusqlite::ToSql,
            &purchase.charge_id as &dyn rusqlite::ToSql,
        ],
    )?;

    Ok(inserted == 1)
}

/// Lists a user's purchases in insertion order (= purchase order).
pub fn list_purchases(conn: &DbConnection, user_id: i64) -> Result<Vec<Purchase>> {
    let mut stmt = conn.prepare(
        "SELECT video_id, title, file_id, price_paid, charge_id, purchase_date
         FROM purchases WHERE user_id = ? ORDER BY id",
    )?;
    let rows = stmt.query_map(&[&user_id as &dyn rusqlite::ToSql], |row| {
        Ok(Purchase {
            video_id: row.get(0)?,
            title: row.get(1)?,
            file_id: row.get(2)?,
            price_paid: row.get(3)?,
            charge_id: row.get(4)?,
            purchase_date: row.get(5)?,
        })
    })?;

    let mut purchases = Vec::new();
    for row in rows {
        purchases.push(row?);
    }
    Ok(purchases)
}

/// Checks whether the user already owns the video.
pub fn has_purchased(conn: &DbConnection, user_id: i64, video_id: i64) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM purchases WHERE user_id = ?1 AND video_id = ?2",
        &[&user_id as &dyn rusqlite::ToSql, &video_id as &dyn rusqlite::ToSql],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Gets one purchase by (user, video); used for re-delivery via `watch:`.
pub fn get_purchase(conn: &DbConnection, user_id: i64, video_id: i64) -> Result<Option<Purchase>> {
    let mut stmt = conn.prepare(
        "SELECT video_id, title, file_id, price_paid, charge_id, purchase_date
         FROM purchases WHERE user_id = ?1 AND video_id = ?2",
    )?;
    let mut rows = stmt.query(&[&user_id as &dyn rusqlite::ToSql, &video_id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(Purchase {
            video_id: row.get(0)?,
            title: row.get(1)?,
            file_id: row.get(2)?,
            price_paid: row.get(3)?,
            charge_id: row.get(4)?,
            purchase_date: row.get(5)?,
        }))
    } else {
        Ok(None)
    }
}

/// All known user ids, for broadcast fan-out.
pub fn all_user_ids(conn: &DbConnection) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT telegram_id FROM users ORDER BY telegram_id")?;
    let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;

    let mut ids = Vec::new();
    for row in rows {
        ids.push(row?);
    }
    Ok(ids)
}

/// Per-video sales line for the admin report
#[derive(Debug, Clone)]
pub struct VideoSales {
    pub video_id: i64,
    pub title: String,
    pub purchases: i64,
    pub revenue: i64,
}

/// Aggregated sales figures for the `/sales` admin command
#[derive(Debug, Clone, Default)]
pub struct SalesSummary {
    pub total_purchases: i64,
    pub total_revenue: i64,
    pub known_users: i64,
    pub per_video: Vec<VideoSales>,
}

/// Computes the sales summary from recorded purchases.
///
/// Grouping uses the purchase snapshots, so videos removed from the catalog
/// still show up in the report.
pub fn sales_summary(conn: &DbConnection) -> Result<SalesSummary> {
    let (total_purchases, total_revenue): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(price_paid), 0) FROM purchases",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let known_users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;

    let mut stmt = conn.prepare(
        "SELECT video_id, title, COUNT(*), SUM(price_paid)
         FROM purchases GROUP BY video_id, title ORDER BY SUM(price_paid) DESC",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok(VideoSales {
            video_id: row.get(0)?,
            title: row.get(1)?,
            purchases: row.get(2)?,
            revenue: row.get(3)?,
        })
    })?;

    let mut per_video = Vec::new();
    for row in rows {
        per_video.push(row?);
    }

    Ok(SalesSummary {
        total_purchases,
        total_revenue,
        known_users,
        per_video,
    })
}
