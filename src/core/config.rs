use once_cell::sync::Lazy;
use std::env;
use std::time::Duration;

/// Bot token
/// Read from BOT_TOKEN or TELOXIDE_TOKEN environment variable
pub static BOT_TOKEN: Lazy<String> = Lazy::new(|| {
    env::var("BOT_TOKEN")
        .or_else(|_| env::var("TELOXIDE_TOKEN"))
        .unwrap_or_else(|_| String::new())
});

/// Database file path
/// Read from DATABASE_PATH environment variable
/// Default: database.sqlite
pub static DATABASE_PATH: Lazy<String> =
    Lazy::new(|| env::var("DATABASE_PATH").unwrap_or_else(|_| "database.sqlite".to_string()));

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub static LOG_FILE_PATH: Lazy<String> =
    Lazy::new(|| env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string()));

/// Custom Bot API server URL (optional, for a local Bot API instance)
/// Read from BOT_API_URL environment variable
pub static BOT_API_URL: Lazy<Option<String>> = Lazy::new(|| env::var("BOT_API_URL").ok());

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for HTTP requests to the Bot API (in seconds)
    pub const REQUEST_TIMEOUT_SECS: u64 = 60;

    /// Request timeout duration
    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Admin configuration
pub mod admin {
    use once_cell::sync::Lazy;
    use std::env;

    pub(crate) fn parse_admin_ids(raw: &str) -> Vec<i64> {
        raw.split([',', ' ', '\n', '\t'])
            .filter_map(|part| part.trim().parse::<i64>().ok())
            .collect()
    }

    /// Admin user IDs (comma-separated)
    /// Read from ADMIN_IDS environment variable
    pub static ADMIN_IDS: Lazy<Vec<i64>> = Lazy::new(|| {
        env::var("ADMIN_IDS")
            .ok()
            .map(|raw| parse_admin_ids(&raw))
            .unwrap_or_default()
    });

    /// Admin user ID for direct messages (operator channel for escalations)
    /// Read from ADMIN_USER_ID or fallback to first ADMIN_IDS entry
    /// Defaults to 0 if not set (no admin notifications)
    pub static ADMIN_USER_ID: Lazy<i64> = Lazy::new(|| {
        env::var("ADMIN_USER_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .or_else(|| ADMIN_IDS.first().copied())
            .unwrap_or(0)
    });
}

/// Payment flow configuration
pub mod payment {
    use super::Duration;

    /// Currency code for Telegram Stars invoices
    pub const CURRENCY: &str = "XTR";

    /// Invoice payload prefix; the rest is the opaque correlation id
    pub const PAYLOAD_PREFIX: &str = "purchase:";

    /// Upper bound for a video price in Stars. Keeps prices inside the
    /// Bot API invoice range; `LabeledPrice` amounts are u32.
    pub const MAX_PRICE_STARS: i64 = 100_000;

    /// Timeout for outbound platform calls (invoice creation, delivery)
    pub const EXTERNAL_CALL_TIMEOUT_SECS: u64 = 30;

    /// How long a pending invoice stays claimable before it expires
    pub const PENDING_INVOICE_TTL_SECS: i64 = 24 * 60 * 60;

    /// Interval between purges of expired pending invoices
    pub const PURGE_INTERVAL_SECS: u64 = 15 * 60;

    pub fn external_call_timeout() -> Duration {
        Duration::from_secs(EXTERNAL_CALL_TIMEOUT_SECS)
    }

    pub fn purge_interval() -> Duration {
        Duration::from_secs(PURGE_INTERVAL_SECS)
    }
}

/// Admin add-video wizard session configuration
pub mod session {
    use super::Duration;

    /// A wizard session with no input for this long is expired
    pub const SESSION_TTL_SECS: u64 = 10 * 60;

    /// Interval between purges of expired wizard sessions
    pub const PURGE_INTERVAL_SECS: u64 = 60;

    pub fn ttl() -> Duration {
        Duration::from_secs(SESSION_TTL_SECS)
    }

    pub fn purge_interval() -> Duration {
        Duration::from_secs(PURGE_INTERVAL_SECS)
    }
}

/// Dispatcher retry configuration
pub mod retry {
    use super::Duration;

    /// How many times the dispatcher is restarted after a panic
    pub const MAX_DISPATCHER_RETRIES: u32 = 5;

    /// Base for exponential backoff between dispatcher restarts (seconds)
    pub const EXPONENTIAL_BACKOFF_BASE: u64 = 2;

    /// Fixed delay added between dispatcher restarts
    pub const DISPATCHER_DELAY_SECS: u64 = 5;

    pub fn dispatcher_delay() -> Duration {
        Duration::from_secs(DISPATCHER_DELAY_SECS)
    }
}

/// Broadcast configuration
pub mod broadcast {
    use super::Duration;

    /// Delay between consecutive sends to avoid Bot API flood limits (ms)
    pub const INTER_SEND_DELAY_MS: u64 = 50;

    pub fn inter_send_delay() -> Duration {
        Duration::from_millis(INTER_SEND_DELAY_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_ids_comma_separated() {
        assert_eq!(admin::parse_admin_ids("1,2,3"), vec![1, 2, 3]);
    }

    #[test]
    fn test_parse_admin_ids_mixed_separators_and_garbage() {
        assert_eq!(admin::parse_admin_ids("10, 20\tabc 30\n40"), vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_parse_admin_ids_empty() {
        assert!(admin::parse_admin_ids("").is_empty());
        assert!(admin::parse_admin_ids("not numbers").is_empty());
    }

    #[test]
    fn test_payload_prefix_shape() {
        assert!(payment::PAYLOAD_PREFIX.ends_with(':'));
    }
}
