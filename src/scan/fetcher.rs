//! The boundary between the scan engine and the remote search API.

use async_trait::async_trait;

use crate::error::ClientError;

/// A single page-fetch assignment issued by the scan coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based index of the first record in the page.
    pub offset: u64,
    /// Maximum number of records the page may contain.
    pub limit: u32,
}

/// A non-empty page of issue keys, tagged with where it came from.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Lane that fetched the page.
    pub lane: usize,
    /// Offset the page was fetched at.
    pub offset: u64,
    /// Issue keys in server order.
    pub keys: Vec<String>,
}

/// Fetches one page of search results at a given offset.
///
/// Implementations must tolerate offsets past the end of the result set and
/// answer them with an empty page: the scan engine treats an empty page as
/// end-of-data for the asking lane. [`JiraClient`](crate::client::JiraClient)
/// implements this against `/rest/api/2/search`; tests substitute in-memory
/// fetchers.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Returns the issue keys matching `jql`, starting at `offset`, at most
    /// `limit` of them, in server order.
    async fn fetch_page(
        &self,
        jql: &str,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<String>, ClientError>;
}
