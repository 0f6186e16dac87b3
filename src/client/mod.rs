//! Jira REST v2 client: authenticated transport, single-issue operations,
//! and entry points into the concurrent scan engine.
//!
//! [`JiraClient`] covers two styles of use:
//!
//! - **Single-issue operations**: [`issue`](JiraClient::issue),
//!   [`summary`](JiraClient::summary), [`create_issue`](JiraClient::create_issue),
//!   [`update_issue`](JiraClient::update_issue)
//! - **Bulk scans**: [`search`](JiraClient::search) and
//!   [`scan_project`](JiraClient::scan_project), which fan the query out
//!   over the scan engine in [`crate::scan`]
//!
//! For observer callbacks or a cancellation handle, build a
//! [`Scanner`](crate::scan::Scanner) directly over a clone of the client.

pub mod config;
pub mod issue;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};
use urlencoding::encode;

use crate::error::{ClientError, ClientResult, ScanError};
use crate::jql::JqlQuery;
use crate::scan::{PageFetcher, ScanOptions, ScanOutcome, Scanner};

pub use config::{Credentials, JiraConfig};
pub use issue::{Issue, IssueFields, IssueUpdate, NameRef, NewIssue, ProjectRef};

use issue::{CreatedIssue, SearchResponse};

/// Authenticated Jira REST v2 client.
///
/// Cloning is cheap: the underlying HTTP client is reference-counted and
/// connection pools are shared between clones.
#[derive(Debug, Clone)]
pub struct JiraClient {
    http: Client,
    config: JiraConfig,
}

impl JiraClient {
    /// Creates a client from the given configuration.
    pub fn new(config: JiraConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .expect("Failed to build HTTP client");
        Self { http, config }
    }

    /// Creates a client from `JIRA_BASE_URL`, `JIRA_USER` and `JIRA_TOKEN`.
    pub fn from_env() -> ClientResult<Self> {
        Ok(Self::new(JiraConfig::from_env()?))
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = request
            .basic_auth(
                &self.config.credentials.username,
                Some(&self.config.credentials.token),
            )
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(ClientError::RateLimited { retry_after });
        }
        if !status.is_success() {
            // Jira error bodies carry the field-level validation messages;
            // keep them verbatim.
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ClientResult<T> {
        let response = self.send(self.http.get(url)).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Fetches a single issue by key.
    pub async fn issue(&self, key: &str) -> ClientResult<Issue> {
        let url = self.url(&format!("/rest/api/2/issue/{}", encode(key)));
        match self.get_json::<Issue>(&url).await {
            Err(ClientError::Api { status: 404, .. }) => {
                Err(ClientError::IssueNotFound(key.to_string()))
            }
            other => other,
        }
    }

    /// Returns the internal numeric id of an issue.
    pub async fn issue_id(&self, key: &str) -> ClientResult<String> {
        Ok(self.issue(key).await?.id)
    }

    /// Returns the raw field object of an issue.
    pub async fn issue_fields(&self, key: &str) -> ClientResult<Value> {
        Ok(self.issue(key).await?.fields)
    }

    /// Fetches an issue and decodes its fields into `T`.
    pub async fn issue_fields_as<T: DeserializeOwned>(&self, key: &str) -> ClientResult<T> {
        let fields = self.issue_fields(key).await?;
        serde_json::from_value(fields).map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Returns the summary line of an issue.
    pub async fn summary(&self, key: &str) -> ClientResult<String> {
        let fields = self.issue_fields(key).await?;
        fields
            .get("summary")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Decode(format!("issue '{key}' has no summary field")))
    }

    /// Creates an issue and returns its new key.
    pub async fn create_issue(&self, new_issue: &NewIssue) -> ClientResult<String> {
        let url = self.url("/rest/api/2/issue");
        let response = self.send(self.http.post(&url).json(new_issue)).await?;
        let created: CreatedIssue = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        info!(key = %created.key, "Created issue");
        Ok(created.key)
    }

    /// Updates fields of an existing issue, returning the key on success.
    pub async fn update_issue(&self, key: &str, update: &IssueUpdate) -> ClientResult<String> {
        let url = self.url(&format!("/rest/api/2/issue/{}", encode(key)));
        self.send(self.http.put(&url).json(update)).await?;
        info!(key, "Updated issue");
        Ok(key.to_string())
    }

    /// Runs a concurrent scan over an arbitrary JQL query with default
    /// options and the given lane count.
    pub async fn search(&self, jql: &str, workers: usize) -> Result<ScanOutcome, ScanError> {
        self.search_with(jql, ScanOptions::new().with_workers(workers))
            .await
    }

    /// Runs a concurrent scan over an arbitrary JQL query.
    pub async fn search_with(
        &self,
        jql: &str,
        options: ScanOptions,
    ) -> Result<ScanOutcome, ScanError> {
        Scanner::new(Arc::new(self.clone()), options)?.run(jql).await
    }

    /// Scans a whole project and returns every matching issue key.
    ///
    /// `updated_within` is a relative window in minutes, passed through to
    /// JQL unchanged; negative values reach into the past, so the last half
    /// hour is `Some(-30)`. `None` scans the entire project.
    pub async fn scan_project(
        &self,
        project: &str,
        updated_within: Option<i64>,
        workers: usize,
    ) -> Result<ScanOutcome, ScanError> {
        let mut query = JqlQuery::for_project(project);
        if let Some(minutes) = updated_within {
            query = query.updated_within(minutes);
        }
        self.search(&query.build()?, workers).await
    }
}

#[async_trait]
impl PageFetcher for JiraClient {
    async fn fetch_page(
        &self,
        jql: &str,
        offset: u64,
        limit: u32,
    ) -> Result<Vec<String>, ClientError> {
        let url = self.url(&format!(
            "/rest/api/2/search?jql={}&startAt={}&maxResults={}",
            encode(jql),
            offset,
            limit
        ));
        let page: SearchResponse = self.get_json(&url).await?;
        debug!(
            offset,
            returned = page.issues.len(),
            total = page.total,
            "Fetched search page"
        );
        Ok(page.issues.into_iter().map(|issue| issue.key).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_construction_normalizes_base_url() {
        let client = JiraClient::new(JiraConfig::new("https://jira.example.com/", "bot", "tok"));
        assert_eq!(client.base_url(), "https://jira.example.com");
        assert_eq!(
            client.url("/rest/api/2/issue/VEGA-1"),
            "https://jira.example.com/rest/api/2/issue/VEGA-1"
        );
    }

    #[test]
    fn test_search_page_url_encodes_the_query() {
        let client = JiraClient::new(JiraConfig::new("https://jira.example.com", "bot", "tok"));
        let jql = "project=VEGA AND updatedDate >= -30m";
        let url = client.url(&format!(
            "/rest/api/2/search?jql={}&startAt={}&maxResults={}",
            encode(jql),
            50,
            25
        ));
        assert_eq!(
            url,
            "https://jira.example.com/rest/api/2/search?jql=project%3DVEGA%20AND%20updatedDate%20%3E%3D%20-30m&startAt=50&maxResults=25"
        );
    }

    #[test]
    fn test_clients_clone_cheaply_for_the_scan_engine() {
        let client = JiraClient::new(JiraConfig::new("https://jira.example.com", "bot", "tok"));
        let fetcher: Arc<dyn PageFetcher> = Arc::new(client.clone());
        drop(fetcher);
        assert_eq!(client.base_url(), "https://jira.example.com");
    }
}
