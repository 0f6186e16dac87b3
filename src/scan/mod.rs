//! Concurrent paginated scan engine.
//!
//! A scan fans one JQL query out over a set of lanes, each fetching a
//! different page of the result set, and funnels every page into a single
//! aggregation task:
//!
//! - **Scanner**: coordinator that owns the paging cursor, seeds each lane
//!   with an offset, and reissues offsets as lanes report back
//! - **Lanes**: worker tasks that execute one page fetch at a time against a
//!   [`PageFetcher`]
//! - **Aggregator**: single task that appends fetched keys and drives the
//!   optional [`ScanObserver`]
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────┐
//!                  │   Scanner    │  owns the offset cursor and
//!                  │ (coordinator)│  the lane map
//!                  └──┬───────▲───┘
//!        assignments  │       │  reports (fetched / end-of-data / failed)
//!         ┌───────────┼───────┴────────┐
//!         ▼           ▼                ▼
//!    ┌─────────┐ ┌─────────┐     ┌─────────┐
//!    │ Lane 0  │ │ Lane 1  │ ... │ Lane N  │
//!    └────┬────┘ └────┬────┘     └────┬────┘
//!         │           │  fetched pages│
//!         └───────────┼───────────────┘
//!                     ▼
//!               ┌────────────┐
//!               │ Aggregator │ ──► ScanOutcome.keys
//!               └────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use jirascan::client::{JiraClient, JiraConfig};
//! use jirascan::scan::{ScanOptions, Scanner};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let client = JiraClient::new(JiraConfig::from_env()?);
//! let options = ScanOptions::new()
//!     .with_workers(8)
//!     .with_fetch_timeout(Duration::from_secs(30));
//! let scanner = Scanner::new(Arc::new(client), options)?;
//! let canceller = scanner.canceller();
//!
//! let outcome = scanner.run("project=VEGA AND updatedDate >= -30m").await?;
//! println!("{} issues, {} failed lanes", outcome.keys.len(), outcome.lane_errors.len());
//! ```
//!
//! # Guarantees
//!
//! - **Disjoint offsets**: the cursor has a single owner, so no page is
//!   fetched twice and none is skipped while lanes stay healthy
//! - **Bounded in-flight work**: each lane holds at most one assignment, and
//!   the page channel is bounded, so a stalled aggregator backpressures the
//!   lanes instead of buffering without limit
//! - **Best effort on failure**: a failed lane closes alone; the rest of the
//!   scan finishes and the outcome says what was lost
//! - **Prompt cancellation**: a cancel signal stops the coordinator, every
//!   lane (mid-fetch included) and the aggregator

pub mod aggregator;
pub mod coordinator;
pub mod fetcher;
mod worker;

// Re-export main types for convenience
pub use aggregator::{ScanObserver, ScanProgress};
pub use coordinator::{
    ScanCanceller, ScanOptions, ScanOutcome, ScanStats, Scanner, DEFAULT_PAGE_SIZE,
    DEFAULT_WORKERS,
};
pub use fetcher::{FetchedPage, PageFetcher, PageRequest};
