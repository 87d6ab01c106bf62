//! Error types for the task pipeline.
//!
//! Every error raised by the core propagates to the caller untouched; the
//! core never retries and never substitutes a fallback for a failed fetch or
//! a malformed field.

use thiserror::Error;

/// Errors that can occur while fetching or normalizing tasks.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// The tracker could not be reached or refused the request
    /// (network failure, bad credentials, rate limiting, server error).
    #[error("Tracker unavailable: {0}")]
    UpstreamUnavailable(String),

    /// A date or timestamp field did not match its expected format.
    #[error("Malformed {field} value '{value}': expected {expected}")]
    MalformedDate {
        /// Name of the offending field (e.g. `due_on`).
        field: &'static str,
        /// The raw value received from the tracker.
        value: String,
        /// Human-readable description of the expected format.
        expected: &'static str,
    },

    /// A task has no section membership and the grouping policy rejects it.
    #[error("Task '{task}' has no section membership")]
    MissingMembership {
        /// Name of the task.
        task: String,
    },

    /// A task id that is not a tracker gid (digits only).
    #[error("Invalid task id '{0}': expected digits")]
    InvalidTaskId(String),

    /// Configuration error (missing or invalid setting).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TrackerError {
    /// Whether the error came from the tracker rather than from local data.
    pub fn is_upstream(&self) -> bool {
        matches!(self, TrackerError::UpstreamUnavailable(_))
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TrackerError::UpstreamUnavailable(format!("request timed out: {}", err))
        } else if err.is_connect() {
            TrackerError::UpstreamUnavailable(format!("connection failed: {}", err))
        } else if err.is_decode() {
            TrackerError::UpstreamUnavailable(format!("undecodable response: {}", err))
        } else {
            TrackerError::UpstreamUnavailable(err.to_string())
        }
    }
}

/// Result type for tracker operations.
pub type TrackerResult<T> = std::result::Result<T, TrackerError>;
