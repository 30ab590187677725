//! Catalog store: video records for sale
//!
//! Videos are the unit of sale. Ids are assigned by SQLite AUTOINCREMENT and
//! never reused, so a purchase made before a removal keeps pointing at a
//! unique id. User-facing ids are rendered as `video_<n>`.

use rusqlite::Result;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::db::DbConnection;

/// A video in the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Price in Telegram Stars (positive integer)
    pub price: i64,
    /// Display duration, e.g. "10:30"
    pub duration: String,
    /// Opaque Telegram file_id used to re-send the content without re-upload
    pub file_id: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

/// Input for adding a new video to the catalog
#[derive(Debug, Clone, Default)]
pub struct NewVideo {
    pub title: String,
    pub description: String,
    pub price: i64,
    pub duration: String,
    pub file_id: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

/// Partial update for an existing video; `None` fields keep their value.
///
/// `category: Some("")` clears the stored category (the one optional
/// field, so an empty value means "remove" rather than "keep").
#[derive(Debug, Clone, Default)]
pub struct VideoUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i64>,
    pub duration: Option<String>,
    pub file_id: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl VideoUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.duration.is_none()
            && self.file_id.is_none()
            && self.category.is_none()
            && self.tags.is_none()
    }
}

/// Renders a catalog id the way users see it: `video_<n>`
pub fn format_video_id(id: i64) -> String {
    format!("video_{}", id)
}

/// Parses a user-supplied video id; accepts both `video_3` and `3`
pub fn parse_video_id(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix("video_").unwrap_or(trimmed);
    digits.parse::<i64>().ok().filter(|id| *id > 0)
}

/// Every price in the catalog must pass this; invoice amounts are u32 and
/// the Bot API caps Stars invoices, so an unbounded i64 must never reach
/// `create_invoice_link`.
pub fn validate_price(price: i64) -> AppResult<()> {
    if price <= 0 || price > config::payment::MAX_PRICE_STARS {
        return Err(AppError::Validation(format!(
            "Price must be between 1 and {} Stars.",
            config::payment::MAX_PRICE_STARS
        )));
    }
    Ok(())
}

fn validate_new_video(video: &NewVideo) -> AppResult<()> {
    if video.title.trim().is_empty() {
        return Err(AppError::Validation("Title must not be empty.".to_string()));
    }
    if video.description.trim().is_empty() {
        return Err(AppError::Validation("Description must not be empty.".to_string()));
    }
    validate_price(video.price)?;
    if video.file_id.trim().is_empty() {
        return Err(AppError::Validation("A video file is required.".to_string()));
    }
    Ok(())
}

fn tags_to_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

fn tags_from_json(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Adds a new video to the catalog and returns its assigned id.
///
/// # Errors
///
/// Returns `AppError::Validation` if required fields are missing or the
/// price is out of range; database errors otherwise.
pub fn add_video(conn: &DbConnection, video: &NewVideo) -> AppResult<i64> {
    validate_new_video(video)?;

    conn.execute(
        "INSERT INTO videos (title, description, price, duration, file_id, category, tags)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        &[
            &video.title as &dyn rusqlite::ToSql,
            &video.description as &dyn rusqlite::ToSql,
            &video.price as &dyn rusqlite::ToSql,
            &video.duration as &dyn rusqlite::ToSql,
            &video.file_id as &dyn rusqlite::ToSql,
            &video.category as &dyn rusqlite::ToSql,
            &tags_to_json(&video.tags) as &dyn rusqlite::ToSql,
        ],
    )
    .map_err(AppError::Database)?;

    Ok(conn.last_insert_rowid())
}

fn row_to_video(row: &rusqlite::Row<'_>) -> Result<Video> {
    Ok(Video {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        duration: row.get(4)?,
        file_id: row.get(5)?,
        category: row.get(6)?,
        tags: tags_from_json(&row.get::<_, String>(7)?),
    })
}

/// Gets a video by id. Returns `Ok(None)` for an unknown id.
pub fn get_video(conn: &DbConnection, id: i64) -> Result<Option<Video>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, price, duration, file_id, category, tags
         FROM videos WHERE id = ?",
    )?;
    let mut rows = stmt.query(&[&id as &dyn rusqlite::ToSql])?;

    if let Some(row) = rows.next()? {
        Ok(Some(row_to_video(row)?))
    } else {
        Ok(None)
    }
}

/// Lists all videos in insertion order (deterministic: ORDER BY id).
pub fn list_videos(conn: &DbConnection) -> Result<Vec<Video>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, price, duration, file_id, category, tags
         FROM videos ORDER BY id",
    )?;
    let rows = stmt.query_map([], |row| row_to_video(row))?;

    let mut videos = Vec::new();
    for row in rows {
        videos.push(row?);
    }
    Ok(videos)
}

/// Merges the provided fields into an existing video.
///
/// # Errors
///
/// `AppError::NotFound` for an unknown id, `AppError::Validation` for an
/// empty update or an out-of-range price.
pub fn update_video(conn: &DbConnection, id: i64, update: &VideoUpdate) -> AppResult<Video> {
    if update.is_empty() {
        return Err(AppError::Validation("Nothing to update.".to_string()));
    }
    if let Some(price) = update.price {
        validate_price(price)?;
    }

    let current = get_video(conn, id)?
        .ok_or_else(|| AppError::NotFound(format!("Video {}", format_video_id(id))))?;

    let merged = Video {
        id,
        title: update.title.clone().unwrap_or(current.title),
        description: update.description.clone().unwrap_or(current.description),
        price: update.price.unwrap_or(current.price),
        duration: update.duration.clone().unwrap_or(current.duration),
        file_id: update.file_id.clone().unwrap_or(current.file_id),
        category: match &update.category {
            Some(value) if value.is_empty() => None,
            Some(value) => Some(value.clone()),
            None => current.category,
        },
        tags: update.tags.clone().unwrap_or(current.tags),
    };

    conn.execute(
        "UPDATE videos SET title = ?1, description = ?2, price = ?3, duration = ?4,
         file_id = ?5, category = ?6, tags = ?7 WHERE id = ?8",
        &[
            &merged.title as &dyn rusqlite::ToSql,
            &merged.description as &dyn rusqlite::ToSql,
            &merged.price as &dyn rusqlite::ToSql,
            &merged.duration as &dyn rusqlite::ToSql,
            &merged.file_id as &dyn rusqlite::ToSql,
            &merged.category as &dyn rusqlite::ToSql,
            &tags_to_json(&merged.tags) as &dyn rusqlite::ToSql,
            &id as &dyn rusqlite::ToSql,
        ],
    )
    .map_err(AppError::Database)?;

    Ok(merged)
}

/// Removes a video from the catalog.
///
/// Historical purchases are snapshots and are deliberately left untouched.
///
/// # Errors
///
/// `AppError::NotFound` for an unknown id.
pub fn remove_video(conn: &DbConnection, id: i64) -> AppResult<()> {
    let removed = conn
        .execute("DELETE FROM videos WHERE id = ?", &[&id as &dyn rusqlite::ToSql])
        .map_err(AppError::Database)?;

    if removed == 0 {
        return Err(AppError::NotFound(format!("Video {}", format_video_id(id))));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_id_accepts_both_forms() {
        assert_eq!(parse_video_id("video_3"), Some(3));
        assert_eq!(parse_video_id("3"), Some(3));
        assert_eq!(parse_video_id("  video_12 "), Some(12));
    }

    #[test]
    fn test_parse_video_id_rejects_garbage() {
        assert_eq!(parse_video_id("video_"), None);
        assert_eq!(parse_video_id("video_-1"), None);
        assert_eq!(parse_video_id("0"), None);
        assert_eq!(parse_video_id("abc"), None);
        assert_eq!(parse_video_id(""), None);
    }

    #[test]
    fn test_format_video_id_round_trip() {
        assert_eq!(parse_video_id(&format_video_id(42)), Some(42));
    }

    #[test]
    fn test_tags_json_round_trip() {
        let tags = vec!["tutorial".to_string(), "rust".to_string()];
        assert_eq!(tags_from_json(&tags_to_json(&tags)), tags);
        assert!(tags_from_json("not json").is_empty());
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let mut video = NewVideo {
            title: "Intro".to_string(),
            description: "A proper description".to_string(),
            price: 100,
            duration: "10:30".to_string(),
            file_id: "BAAC123".to_string(),
            ..NewVideo::default()
        };
        assert!(validate_new_video(&video).is_ok());

        video.price = 0;
        assert!(matches!(validate_new_video(&video), Err(AppError::Validation(_))));

        video.price = 100;
        video.title = "  ".to_string();
        assert!(matches!(validate_new_video(&video), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_validate_price_bounds() {
        assert!(validate_price(1).is_ok());
        assert!(validate_price(config::payment::MAX_PRICE_STARS).is_ok());

        assert!(matches!(validate_price(0), Err(AppError::Validation(_))));
        assert!(matches!(
            validate_price(config::payment::MAX_PRICE_STARS + 1),
            Err(AppError::Validation(_))
        ));
        // A price that would wrap a u32 invoice amount down to 1 Star
        assert!(matches!(validate_price((u32::MAX as i64) + 2), Err(AppError::Validation(_))));
    }
}
