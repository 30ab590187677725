//! Pending-invoice store
//!
//! Every invoice the bot sends gets an opaque correlation id (UUID v4) that
//! travels in the invoice payload. A payment confirmation is only acted on
//! if its correlation id still matches an outstanding row here, which is
//! what stops replayed or spoofed confirmations from triggering delivery.
//!
//! Rows are persisted in SQLite so a confirmation arriving after a process
//! restart can still be verified. Entries expire after a TTL and are purged
//! by a background task.

use rusqlite::Result;
use uuid::Uuid;

use crate::core::config;
use crate::storage::db::DbConnection;

/// An invoice that was sent but not yet confirmed
///
/// Carries a snapshot of the video's price, title and delivery handle: the
/// catalog may change (or lose the video entirely) between invoice and
/// confirmation, and the buyer gets exactly what was invoiced.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingInvoice {
    pub correlation_id: String,
    pub user_id: i64,
    pub video_id: i64,
    pub title: String,
    pub file_id: String,
    /// Invoice price in Stars; becomes `price_paid` when recorded
    pub price: i64,
}

/// Generates a fresh opaque correlation id.
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Builds the invoice payload for a correlation id.
pub fn payload_for(correlation_id: &str) -> String {
    format!("{}{}", config::payment::PAYLOAD_PREFIX, correlation_id)
}

/// Extracts the correlation id from an invoice payload, if it is ours.
pub fn parse_payload(payload: &str) -> Option<&str> {
    payload
        .strip_prefix(config::payment::PAYLOAD_PREFIX)
        .filter(|rest| !rest.is_empty())
}

/// Persists a pending invoice.
pub fn insert(conn: &DbConnection, invoice: &PendingInvoice) -> Result<()> {
    conn.execute(
        "INSERT INTO pending_invoices (correlation_id, user_id, video_id, title, file_id, price)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        &[
            &invoice.correlation_id as &dyn rusqlite::ToSql,
            &invoice.user_id as &dyn rusqlite::ToSql,
            &invoice.video_id as &dyn rusqlite::ToSql,
            &invoice.title as &dyn rusqlite::ToSql,
            &invoice.file_id as &dyn rusqlite::ToSql,
            &invoice.price as &dyn rusqlite::ToSql,
        ],
    )?;
    Ok(())
}

/// Looks up an outstanding, unexpired pending invoice without consuming it.
///
/// Used by the pre-checkout handler, which may fire more than once for the
/// same invoice.
pub fn peek(conn: &DbConnection, correlation_id: &str) -> Result<Option<PendingInvoice>> {
    let mut stmt = conn.prepare(
        "SELECT correlation_id, user_id, video_id, title, file_id, price
         FROM pending_invoices
         WHERE correlation_id = ?1
           AND created_at >= datetime('now', '-' || ?2 || ' seconds')",
    )?;
    let mut rows = stmt.query(&[
        &correlation_id as &dyn rusqlite::ToSql,
        &config::payment::PENDING_INVOICE_TTL_SECS as &dyn rusqlite::ToSql,
    ])?;

    if let Some(row) = rows.next()? {
        Ok(Some(PendingInvoice {
            correlation_id: row.get(0)?,
            user_id: row.get(1)?,
            video_id: row.get(2)?,
            title: row.get(3)?,
            file_id: row.get(4)?,
            price: row.get(5)?,
        }))
    } else {
        Ok(None)
    }
}

/// Atomically takes (consumes) a pending invoice.
///
/// The DELETE row count decides the winner when duplicate confirmations
/// race: only the caller whose DELETE removed the row gets the invoice back,
/// every other caller gets `None`.
pub fn take(conn: &DbConnection, correlation_id: &str) -> Result<Option<PendingInvoice>> {
    let invoice = match peek(conn, correlation_id)? {
        Some(invoice) => invoice,
        None => return Ok(None),
    };

    let deleted = conn.execute(
        "DELETE FROM pending_invoices WHERE correlation_id = ?",
        &[&correlation_id as &dyn rusqlite::ToSql],
    )?;

    if deleted == 1 {
        Ok(Some(invoice))
    } else {
        // Another confirmation consumed it between the SELECT and the DELETE
        Ok(None)
    }
}

/// Deletes expired pending invoices; returns how many were removed.
pub fn purge_expired(conn: &DbConnection) -> Result<usize> {
    let purged = conn.execute(
        "DELETE FROM pending_invoices
         WHERE created_at < datetime('now', '-' || ?1 || ' seconds')",
        &[&config::payment::PENDING_INVOICE_TTL_SECS as &dyn rusqlite::ToSql],
    )?;

    if purged > 0 {
        log::info!("Purged {} expired pending invoice(s)", purged);
    }
    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_correlation_ids_are_unique() {
        assert_ne!(new_correlation_id(), new_correlation_id());
    }

    #[test]
    fn test_payload_round_trip() {
        let id = new_correlation_id();
        let payload = payload_for(&id);
        assert_eq!(parse_payload(&payload), Some(id.as_str()));
    }

    #[test]
    fn test_parse_payload_rejects_foreign_payloads() {
        assert_eq!(parse_payload("subscription:premium:123"), None);
        assert_eq!(parse_payload("purchase:"), None);
        assert_eq!(parse_payload(""), None);
        assert_eq!(parse_payload("video_1"), None);
    }
}
