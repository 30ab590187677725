use thiserror::Error;

/// Centralized error types for the application
///
/// All errors in the application are converted to this enum for consistent
/// error handling. Uses `thiserror` for automatic conversion and display
/// formatting.
///
/// The payment-specific variants are deliberately distinct:
/// `PaymentVerification` aborts a flow before anything was delivered, while
/// `DeliveryFailed` happens after payment was captured and must reach an
/// operator instead of being retried silently.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Database connection pool errors
    #[error("Database pool error: {0}")]
    DatabasePool(#[from] r2d2::Error),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unknown video or user id
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed add/update input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Non-admin invoking an admin command
    #[error("Unauthorized")]
    Unauthorized,

    /// Payment confirmation did not match an outstanding invoice
    #[error("Payment verification failed: {0}")]
    PaymentVerification(String),

    /// Post-payment content delivery error
    #[error("Delivery failed: {0}")]
    DeliveryFailed(String),

    /// Outbound platform call exceeded its timeout
    #[error("External call timed out: {0}")]
    ExternalTimeout(&'static str),
}

impl AppError {
    /// User-facing message for this error. Never exposes internal detail
    /// (SQL, stack traces, API payloads); the full error is logged separately.
    pub fn user_message(&self) -> String {
        match self {
            AppError::NotFound(what) => format!("{} not found.", what),
            AppError::Validation(msg) => msg.clone(),
            AppError::Unauthorized => "You don't have permission to use this command.".to_string(),
            AppError::PaymentVerification(_) => {
                "This payment could not be verified. If you were charged, please contact support.".to_string()
            }
            AppError::DeliveryFailed(_) => {
                "Your payment went through, but delivering the video failed. \
                 An operator has been notified — you can also retry from /mypurchases."
                    .to_string()
            }
            AppError::ExternalTimeout(_) => {
                "Telegram did not respond in time. Nothing was charged — please try again.".to_string()
            }
            _ => "Sorry, an error occurred while processing your request. Please try again later.".to_string(),
        }
    }
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_internals() {
        let err = AppError::Database(rusqlite::Error::InvalidQuery);
        let msg = err.user_message();
        assert!(!msg.contains("SQL"));
        assert!(!msg.contains("InvalidQuery"));
    }

    #[test]
    fn test_not_found_names_the_subject() {
        let err = AppError::NotFound("Video video_7".to_string());
        assert_eq!(err.user_message(), "Video video_7 not found.");
    }

    #[test]
    fn test_delivery_failure_points_to_purchases() {
        let err = AppError::DeliveryFailed("bad file_id".to_string());
        assert!(err.user_message().contains("/mypurchases"));
        // The internal reason stays out of the user text
        assert!(!err.user_message().contains("file_id"));
    }

    #[test]
    fn test_timeout_says_nothing_charged() {
        let err = AppError::ExternalTimeout("send_invoice");
        assert!(err.user_message().contains("Nothing was charged"));
    }
}
