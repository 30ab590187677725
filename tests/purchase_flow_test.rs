//! Integration tests for the purchase flow invariants
//!
//! These exercise the storage and invoice layers the payment flow is built
//! from: correlation-id matching, consume-once semantics, price snapshots,
//! and at-most-one purchase per (user, video).
//!
//! Run with: cargo test --test purchase_flow_test

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use starmart::payment::invoices::{self, PendingInvoice};
use starmart::storage::catalog::{self, NewVideo, VideoUpdate};
use starmart::storage::users::{self, NewPurchase};
use starmart::storage::{create_pool, get_connection, DbPool};

const BUYER: i64 = 1001;

fn test_pool() -> (TempDir, DbPool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("test.sqlite");
    let pool = create_pool(path.to_str().expect("utf-8 path")).expect("pool");
    (dir, pool)
}

fn add_catalog_video(pool: &DbPool, title: &str, price: i64) -> i64 {
    let conn = get_connection(pool).unwrap();
    catalog::add_video(
        &conn,
        &NewVideo {
            title: title.to_string(),
            description: "A longer description of the content.".to_string(),
            price,
            duration: "10:30".to_string(),
            file_id: "BAAC_test_file".to_string(),
            category: None,
            tags: vec![],
        },
    )
    .unwrap()
}

/// Mirrors what start_purchase persists after creating the invoice link.
fn send_invoice(pool: &DbPool, user_id: i64, video_id: i64) -> PendingInvoice {
    let conn = get_connection(pool).unwrap();
    let video = catalog::get_video(&conn, video_id).unwrap().unwrap();
    let invoice = PendingInvoice {
        correlation_id: invoices::new_correlation_id(),
        user_id,
        video_id: video.id,
        title: video.title,
        file_id: video.file_id,
        price: video.price,
    };
    invoices::insert(&conn, &invoice).unwrap();
    invoice
}

/// Mirrors what handle_successful_payment records after delivery.
fn record_confirmed(pool: &DbPool, invoice: &PendingInvoice, charge_id: &str) -> bool {
    let conn = get_connection(pool).unwrap();
    users::record_purchase(
        &conn,
        invoice.user_id,
        &NewPurchase {
            video_id: invoice.video_id,
            title: invoice.title.clone(),
            file_id: invoice.file_id.clone(),
            price_paid: invoice.price,
            charge_id: Some(charge_id.to_string()),
        },
    )
    .unwrap()
}

// ============================================================================
// Correlation-id verification
// ============================================================================

#[test]
fn test_confirmation_must_match_outstanding_invoice() {
    let (_dir, pool) = test_pool();
    let video_id = add_catalog_video(&pool, "Rust Basics", 50);
    let invoice = send_invoice(&pool, BUYER, video_id);

    let conn = get_connection(&pool).unwrap();

    // Unknown correlation id never yields an invoice
    assert!(invoices::take(&conn, "ffffffff-0000-0000-0000-000000000000").unwrap().is_none());

    // The real one does, exactly once
    let taken = invoices::take(&conn, &invoice.correlation_id).unwrap().expect("first take wins");
    assert_eq!(taken, invoice);
    assert!(
        invoices::take(&conn, &invoice.correlation_id).unwrap().is_none(),
        "a consumed invoice must not match again"
    );
}

#[test]
fn test_peek_does_not_consume() {
    let (_dir, pool) = test_pool();
    let video_id = add_catalog_video(&pool, "Rust Basics", 50);
    let invoice = send_invoice(&pool, BUYER, video_id);

    let conn = get_connection(&pool).unwrap();

    // Pre-checkout may peek repeatedly
    assert!(invoices::peek(&conn, &invoice.correlation_id).unwrap().is_some());
    assert!(invoices::peek(&conn, &invoice.correlation_id).unwrap().is_some());
    assert!(invoices::take(&conn, &invoice.correlation_id).unwrap().is_some());
}

#[test]
fn test_pending_invoices_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.sqlite");

    let correlation_id = {
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        let video_id = add_catalog_video(&pool, "Rust Basics", 50);
        send_invoice(&pool, BUYER, video_id).correlation_id
    };

    // A confirmation arriving after a restart still verifies
    let pool = create_pool(path.to_str().unwrap()).unwrap();
    let conn = get_connection(&pool).unwrap();
    assert!(invoices::take(&conn, &correlation_id).unwrap().is_some());
}

#[test]
fn test_expired_invoices_are_rejected_and_purged() {
    let (_dir, pool) = test_pool();
    let video_id = add_catalog_video(&pool, "Rust Basics", 50);
    let invoice = send_invoice(&pool, BUYER, video_id);

    let conn = get_connection(&pool).unwrap();

    // Age the row past the TTL
    conn.execute(
        "UPDATE pending_invoices SET created_at = datetime('now', '-2 days') WHERE correlation_id = ?",
        [&invoice.correlation_id],
    )
    .unwrap();

    assert!(invoices::peek(&conn, &invoice.correlation_id).unwrap().is_none());
    assert!(invoices::take(&conn, &invoice.correlation_id).unwrap().is_none());
    assert_eq!(invoices::purge_expired(&conn).unwrap(), 1);
}

// ============================================================================
// Price snapshots
// ============================================================================

#[test]
fn test_price_paid_is_the_invoiced_price() {
    let (_dir, pool) = test_pool();
    let video_id = add_catalog_video(&pool, "Rust Basics", 50);
    let invoice = send_invoice(&pool, BUYER, video_id);

    // Catalog price changes between invoice and confirmation
    {
        let conn = get_connection(&pool).unwrap();
        catalog::update_video(
            &conn,
            video_id,
            &VideoUpdate {
                price: Some(999),
                ..VideoUpdate::default()
            },
        )
        .unwrap();
    }

    let conn = get_connection(&pool).unwrap();
    let taken = invoices::take(&conn, &invoice.correlation_id).unwrap().unwrap();
    assert!(record_confirmed(&pool, &taken, "charge_1"));

    let purchases = users::list_purchases(&conn, BUYER).unwrap();
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0].price_paid, 50, "the invoiced price is what gets recorded");
    assert_eq!(purchases[0].charge_id.as_deref(), Some("charge_1"));
}

#[test]
fn test_purchase_history_survives_catalog_removal() {
    let (_dir, pool) = test_pool();
    let video_id = add_catalog_video(&pool, "Rust Basics", 50);
    let invoice = send_invoice(&pool, BUYER, video_id);

    let conn = get_connection(&pool).unwrap();
    let taken = invoices::take(&conn, &invoice.correlation_id).unwrap().unwrap();
    assert!(record_confirmed(&pool, &taken, "charge_1"));

    catalog::remove_video(&conn, video_id).unwrap();

    // History still shows the title, and re-delivery still has a file_id
    let purchases = users::list_purchases(&conn, BUYER).unwrap();
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0].title, "Rust Basics");

    let purchase = users::get_purchase(&conn, BUYER, video_id).unwrap().expect("re-watchable");
    assert_eq!(purchase.file_id, "BAAC_test_file");
}

// ============================================================================
// At-most-one purchase per (user, video)
// ============================================================================

#[test]
fn test_duplicate_confirmations_record_exactly_one_purchase() {
    let (_dir, pool) = test_pool();
    let video_id = add_catalog_video(&pool, "Rust Basics", 50);
    let invoice = send_invoice(&pool, BUYER, video_id);

    let conn = get_connection(&pool).unwrap();
    let taken = invoices::take(&conn, &invoice.correlation_id).unwrap().unwrap();

    assert!(record_confirmed(&pool, &taken, "charge_1"));
    // A replayed confirmation loses the INSERT OR IGNORE race
    assert!(!record_confirmed(&pool, &taken, "charge_2"));

    let purchases = users::list_purchases(&conn, BUYER).unwrap();
    assert_eq!(purchases.len(), 1);
    assert_eq!(purchases[0].charge_id.as_deref(), Some("charge_1"));
}

#[test]
fn test_has_purchased_blocks_rebuy() {
    let (_dir, pool) = test_pool();
    let video_id = add_catalog_video(&pool, "Rust Basics", 50);
    let invoice = send_invoice(&pool, BUYER, video_id);

    let conn = get_connection(&pool).unwrap();
    assert!(!users::has_purchased(&conn, BUYER, video_id).unwrap());

    let taken = invoices::take(&conn, &invoice.correlation_id).unwrap().unwrap();
    record_confirmed(&pool, &taken, "charge_1");

    assert!(users::has_purchased(&conn, BUYER, video_id).unwrap());
    // A different user is unaffected
    assert!(!users::has_purchased(&conn, 2002, video_id).unwrap());
}

// ============================================================================
// Users and the sales report
// ============================================================================

#[test]
fn test_get_or_create_user_is_idempotent() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    users::get_or_create_user(&conn, BUYER, Some("alice")).unwrap();
    users::get_or_create_user(&conn, BUYER, Some("alice_renamed")).unwrap();

    let user = users::get_user(&conn, BUYER).unwrap().unwrap();
    assert_eq!(user.username.as_deref(), Some("alice_renamed"));
    assert_eq!(users::all_user_ids(&conn).unwrap(), vec![BUYER]);
}

#[test]
fn test_sales_summary_counts_revenue_per_video() {
    let (_dir, pool) = test_pool();
    let first = add_catalog_video(&pool, "First", 10);
    let second = add_catalog_video(&pool, "Second", 30);

    let conn = get_connection(&pool).unwrap();
    users::get_or_create_user(&conn, BUYER, Some("alice")).unwrap();
    users::get_or_create_user(&conn, 2002, Some("bob")).unwrap();

    for (user, video) in [(BUYER, first), (2002, first), (2002, second)] {
        let invoice = send_invoice(&pool, user, video);
        let taken = invoices::take(&conn, &invoice.correlation_id).unwrap().unwrap();
        assert!(record_confirmed(&pool, &taken, &format!("charge_{}_{}", user, video)));
    }

    let summary = users::sales_summary(&conn).unwrap();
    assert_eq!(summary.total_purchases, 3);
    assert_eq!(summary.total_revenue, 10 + 10 + 30);
    assert_eq!(summary.known_users, 2);

    // Ordered by revenue, descending
    assert_eq!(summary.per_video.len(), 2);
    assert_eq!(summary.per_video[0].revenue, 30);
    assert_eq!(summary.per_video[1].video_id, first);
    assert_eq!(summary.per_video[1].purchases, 2);
}
