//! Integration tests for the catalog store
//!
//! Run with: cargo test --test catalog_store_test

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use starmart::storage::catalog::{self, NewVideo, VideoUpdate};
use starmart::storage::{create_pool, get_connection, DbPool};
use starmart::AppError;

fn test_pool() -> (TempDir, DbPool) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("test.sqlite");
    let pool = create_pool(path.to_str().expect("utf-8 path")).expect("pool");
    (dir, pool)
}

fn sample_video(title: &str, price: i64) -> NewVideo {
    NewVideo {
        title: title.to_string(),
        description: "A longer description of the content.".to_string(),
        price,
        duration: "10:30".to_string(),
        file_id: "BAAC_test_file".to_string(),
        category: Some("tutorial".to_string()),
        tags: vec!["rust".to_string(), "async".to_string()],
    }
}

#[test]
fn test_add_then_get_round_trips_all_fields() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    let id = catalog::add_video(&conn, &sample_video("Rust Basics", 50)).unwrap();
    let video = catalog::get_video(&conn, id).unwrap().expect("video exists");

    assert_eq!(video.title, "Rust Basics");
    assert_eq!(video.price, 50);
    assert_eq!(video.duration, "10:30");
    assert_eq!(video.category.as_deref(), Some("tutorial"));
    assert_eq!(video.tags, vec!["rust".to_string(), "async".to_string()]);
}

#[test]
fn test_list_is_ordered_and_complete() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    let first = catalog::add_video(&conn, &sample_video("First", 10)).unwrap();
    let second = catalog::add_video(&conn, &sample_video("Second", 20)).unwrap();
    let third = catalog::add_video(&conn, &sample_video("Third", 30)).unwrap();

    let videos = catalog::list_videos(&conn).unwrap();
    let ids: Vec<i64> = videos.iter().map(|v| v.id).collect();
    assert_eq!(ids, vec![first, second, third]);
}

#[test]
fn test_get_unknown_video_is_none() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    assert!(catalog::get_video(&conn, 999).unwrap().is_none());
}

#[test]
fn test_add_rejects_invalid_input() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    let mut invalid = sample_video("Valid Title", 50);
    invalid.price = 0;
    assert!(matches!(catalog::add_video(&conn, &invalid), Err(AppError::Validation(_))));

    let mut invalid = sample_video("Valid Title", 50);
    invalid.title = "   ".to_string();
    assert!(matches!(catalog::add_video(&conn, &invalid), Err(AppError::Validation(_))));

    // Nothing was persisted
    assert!(catalog::list_videos(&conn).unwrap().is_empty());
}

#[test]
fn test_update_merges_only_provided_fields() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    let id = catalog::add_video(&conn, &sample_video("Rust Basics", 50)).unwrap();

    let updated = catalog::update_video(
        &conn,
        id,
        &VideoUpdate {
            price: Some(75),
            title: Some("Rust Basics, Revised".to_string()),
            ..VideoUpdate::default()
        },
    )
    .unwrap();

    assert_eq!(updated.price, 75);
    assert_eq!(updated.title, "Rust Basics, Revised");
    // Untouched fields survive
    assert_eq!(updated.description, "A longer description of the content.");
    assert_eq!(updated.duration, "10:30");

    let reread = catalog::get_video(&conn, id).unwrap().unwrap();
    assert_eq!(reread, updated);
}

#[test]
fn test_update_unknown_video_is_not_found() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    let result = catalog::update_video(
        &conn,
        42,
        &VideoUpdate {
            price: Some(10),
            ..VideoUpdate::default()
        },
    );
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[test]
fn test_update_rejects_empty_and_invalid() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    let id = catalog::add_video(&conn, &sample_video("Rust Basics", 50)).unwrap();

    assert!(matches!(
        catalog::update_video(&conn, id, &VideoUpdate::default()),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        catalog::update_video(
            &conn,
            id,
            &VideoUpdate {
                price: Some(-1),
                ..VideoUpdate::default()
            }
        ),
        Err(AppError::Validation(_))
    ));

    // Failed updates change nothing
    assert_eq!(catalog::get_video(&conn, id).unwrap().unwrap().price, 50);
}

#[test]
fn test_price_above_invoice_cap_is_rejected() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    // 2^32 + 1 would truncate to a 1-Star invoice if it ever reached the
    // payment flow; the store must refuse it on both write paths.
    let over_cap: i64 = 4_294_967_297;

    assert!(matches!(
        catalog::add_video(&conn, &sample_video("Overpriced", over_cap)),
        Err(AppError::Validation(_))
    ));

    let id = catalog::add_video(&conn, &sample_video("Rust Basics", 50)).unwrap();
    assert!(matches!(
        catalog::update_video(
            &conn,
            id,
            &VideoUpdate {
                price: Some(over_cap),
                ..VideoUpdate::default()
            }
        ),
        Err(AppError::Validation(_))
    ));
    assert_eq!(catalog::get_video(&conn, id).unwrap().unwrap().price, 50);
}

#[test]
fn test_update_with_empty_category_clears_it() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    let id = catalog::add_video(&conn, &sample_video("Rust Basics", 50)).unwrap();
    assert_eq!(catalog::get_video(&conn, id).unwrap().unwrap().category.as_deref(), Some("tutorial"));

    let updated = catalog::update_video(
        &conn,
        id,
        &VideoUpdate {
            category: Some(String::new()),
            ..VideoUpdate::default()
        },
    )
    .unwrap();
    assert_eq!(updated.category, None);
    assert_eq!(catalog::get_video(&conn, id).unwrap().unwrap().category, None);
}

#[test]
fn test_remove_then_remove_again_is_not_found() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    let id = catalog::add_video(&conn, &sample_video("Rust Basics", 50)).unwrap();
    catalog::remove_video(&conn, id).unwrap();

    assert!(catalog::get_video(&conn, id).unwrap().is_none());
    assert!(matches!(catalog::remove_video(&conn, id), Err(AppError::NotFound(_))));
}

#[test]
fn test_ids_are_never_reused_after_removal() {
    let (_dir, pool) = test_pool();
    let conn = get_connection(&pool).unwrap();

    let first = catalog::add_video(&conn, &sample_video("First", 10)).unwrap();
    catalog::remove_video(&conn, first).unwrap();

    let second = catalog::add_video(&conn, &sample_video("Second", 20)).unwrap();
    assert!(second > first, "removed ids must not be reassigned");
}

#[test]
fn test_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("test.sqlite");

    let id = {
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        let conn = get_connection(&pool).unwrap();
        catalog::add_video(&conn, &sample_video("Durable", 40)).unwrap()
    };

    // Fresh pool over the same file sees the same data
    let pool = create_pool(path.to_str().unwrap()).unwrap();
    let conn = get_connection(&pool).unwrap();
    let video = catalog::get_video(&conn, id).unwrap().expect("survives reopen");
    assert_eq!(video.title, "Durable");
}
