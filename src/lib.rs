//! jirascan: concurrent Jira search aggregation and issue operations.
//!
//! The crate has two layers:
//!
//! - [`client`]: an authenticated Jira REST v2 client with single-issue
//!   operations (fetch, create, update) and JQL search
//! - [`scan`]: a concurrent paginated scan engine that fans one JQL query
//!   out over many lanes and aggregates every matching issue key
//!
//! ```no_run
//! use jirascan::client::{JiraClient, JiraConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = JiraClient::new(JiraConfig::new("https://jira.example.com", "bot", "token"));
//! let outcome = client.scan_project("VEGA", Some(-30), 4).await?;
//! println!("{} issues updated in the last 30 minutes", outcome.keys.len());
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod client;
pub mod error;
pub mod jql;
pub mod scan;

// Re-export commonly used types
pub use client::{Credentials, JiraClient, JiraConfig};
pub use error::{ClientError, ClientResult, LaneError, ScanError};
pub use jql::JqlQuery;
pub use scan::{
    PageFetcher, ScanCanceller, ScanObserver, ScanOptions, ScanOutcome, ScanStats, Scanner,
};
