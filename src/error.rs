//! Error types for the Jira client and the concurrent scan engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors that can occur while talking to the Jira REST API.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Missing Jira base URL: JIRA_BASE_URL environment variable not set")]
    MissingBaseUrl,

    #[error("Missing Jira credentials: JIRA_USER and JIRA_TOKEN environment variables not set")]
    MissingCredentials,

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Jira API returned status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited by Jira API (retry after {retry_after:?} seconds)")]
    RateLimited { retry_after: Option<u64> },

    #[error("Issue '{0}' not found")]
    IssueNotFound(String),

    #[error("Failed to decode Jira response: {0}")]
    Decode(String),

    #[error("Fetch timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors that can occur while running a scan.
///
/// Lane failures alone do not surface here: the scan keeps going on the
/// remaining lanes and hands back the partial aggregate in
/// [`ScanOutcome`](crate::scan::ScanOutcome), where callers opt into
/// strictness via
/// [`require_complete`](crate::scan::ScanOutcome::require_complete).
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid scan configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Scan was cancelled before completion")]
    Cancelled,

    #[error("{failed} of {workers} scan lanes failed; aggregate is incomplete")]
    Partial {
        failed: usize,
        workers: usize,
        errors: Vec<LaneError>,
    },
}

/// A single lane's terminal failure, recorded in the scan outcome.
///
/// Carries the rendered fetch error rather than the source error so outcomes
/// stay `Clone` and serializable.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("lane {lane} failed at offset {offset}: {message}")]
pub struct LaneError {
    /// Lane that closed on this failure.
    pub lane: usize,
    /// Page offset the failed fetch was issued for.
    pub offset: u64,
    /// Rendered fetch error.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_display() {
        let err = ClientError::Api {
            status: 400,
            message: "Field 'priority' is required".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Jira API returned status 400: Field 'priority' is required"
        );
    }

    #[test]
    fn test_lane_error_display() {
        let err = LaneError {
            lane: 2,
            offset: 50,
            message: "connection reset".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "lane 2 failed at offset 50: connection reset"
        );
    }

    #[test]
    fn test_partial_error_display() {
        let err = ScanError::Partial {
            failed: 1,
            workers: 3,
            errors: vec![LaneError {
                lane: 0,
                offset: 75,
                message: "boom".to_string(),
            }],
        };
        assert_eq!(
            err.to_string(),
            "1 of 3 scan lanes failed; aggregate is incomplete"
        );
    }

    #[test]
    fn test_lane_error_serde_round_trip() {
        let err = LaneError {
            lane: 7,
            offset: 175,
            message: "HTTP request failed: timeout".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: LaneError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
