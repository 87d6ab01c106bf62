//! Error types for the Slack transport.
//!
//! Tracker failures are wrapped unchanged so the bot can log the full cause
//! while showing the user a generic message.

use buildreq_tracker::TrackerError;
use thiserror::Error;

/// Errors that can occur during Slack operations.
#[derive(Error, Debug)]
pub enum SlackError {
    /// Configuration error (missing or invalid config).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication error (invalid token, revoked, etc.).
    #[error("Authentication error: {0}")]
    Auth(String),

    /// API request failed.
    #[error("Slack API error: {0}")]
    Api(String),

    /// API rate limited.
    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_secs: u64,
    },

    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(String),

    /// WebSocket connection error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(String),

    /// Operation timed out.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Channel not found or bot not in channel.
    #[error("Channel error: {0}")]
    Channel(String),

    /// Invalid payload received from Slack.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Failure raised by the task pipeline.
    #[error(transparent)]
    Tracker(#[from] TrackerError),
}

impl From<reqwest::Error> for SlackError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SlackError::Timeout(err.to_string())
        } else if err.is_connect() {
            SlackError::Network(format!("Connection failed: {}", err))
        } else {
            SlackError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SlackError {
    fn from(err: serde_json::Error) -> Self {
        SlackError::Json(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SlackError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        SlackError::WebSocket(err.to_string())
    }
}

/// Result type for Slack operations.
pub type SlackResult<T> = std::result::Result<T, SlackError>;

/// An `ok: false` response from the Slack Web API.
#[derive(Debug, Clone)]
pub struct SlackApiError {
    /// Error code from Slack (e.g., "channel_not_found").
    pub code: String,
    /// Method that returned the error.
    pub method: String,
}

impl SlackApiError {
    pub fn new(method: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            method: method.into(),
        }
    }

    /// Read the error code out of a Web API response body.
    pub fn from_response(method: &str, response: &serde_json::Value) -> Self {
        let code = response
            .get("error")
            .and_then(|e| e.as_str())
            .unwrap_or("unknown");
        Self::new(method, code)
    }
}

impl From<SlackApiError> for SlackError {
    fn from(err: SlackApiError) -> Self {
        match err.code.as_str() {
            "ratelimited" | "rate_limited" => SlackError::RateLimited {
                retry_after_secs: 30,
            },
            "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked" => {
                SlackError::Auth(format!("{} failed: {}", err.method, err.code))
            }
            "channel_not_found" | "not_in_channel" => {
                SlackError::Channel(format!("{} failed: {}", err.method, err.code))
            }
            _ => SlackError::Api(format!("{} failed: {}", err.method, err.code)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SlackError::Config("missing token".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing token");

        let err = SlackError::RateLimited {
            retry_after_secs: 60,
        };
        assert_eq!(err.to_string(), "Rate limited: retry after 60 seconds");
    }

    #[test]
    fn test_tracker_error_is_transparent() {
        let err: SlackError = TrackerError::UpstreamUnavailable("502 Bad Gateway".into()).into();
        assert!(matches!(err, SlackError::Tracker(_)));
        assert_eq!(err.to_string(), "Tracker unavailable: 502 Bad Gateway");
    }

    #[test]
    fn test_api_error_conversion() {
        let err: SlackError = SlackApiError::new("chat.postMessage", "invalid_auth").into();
        assert!(matches!(err, SlackError::Auth(_)));

        let err: SlackError = SlackApiError::new("chat.postMessage", "not_in_channel").into();
        assert!(matches!(err, SlackError::Channel(_)));

        let err: SlackError = SlackApiError::new("views.publish", "invalid_blocks").into();
        assert_eq!(
            err.to_string(),
            "Slack API error: views.publish failed: invalid_blocks"
        );
    }

    #[test]
    fn test_api_error_from_response() {
        let body = serde_json::json!({"ok": false, "error": "ratelimited"});
        let err: SlackError = SlackApiError::from_response("chat.postMessage", &body).into();
        assert!(matches!(err, SlackError::RateLimited { .. }));

        let err = SlackApiError::from_response("auth.test", &serde_json::json!({"ok": false}));
        assert_eq!(err.code, "unknown");
    }
}
