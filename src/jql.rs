//! Minimal JQL construction for project scans.
//!
//! Only the two clauses the scan engine needs are modelled: a project filter
//! and an optional `updatedDate` recency window. Anything richer should be
//! written as a raw JQL string and passed to
//! [`JiraClient::search`](crate::client::JiraClient::search) directly.

use crate::error::ScanError;

/// Builder for the JQL string driving a project scan.
///
/// ```
/// use jirascan::jql::JqlQuery;
///
/// let jql = JqlQuery::for_project("VEGA").updated_within(-30).build().unwrap();
/// assert_eq!(jql, "project=VEGA AND updatedDate >= -30m");
/// ```
#[derive(Debug, Clone)]
pub struct JqlQuery {
    project: String,
    updated_within: Option<i64>,
}

impl JqlQuery {
    /// Starts a query scoped to a single project key.
    pub fn for_project(project: &str) -> Self {
        Self {
            project: project.trim().to_string(),
            updated_within: None,
        }
    }

    /// Restricts the query to issues updated within a relative window of
    /// `minutes`, rendered as a JQL `updatedDate >= <minutes>m` clause.
    ///
    /// JQL relative times count negative values into the past, so the last
    /// half hour is `updated_within(-30)`. The value is passed through
    /// unchanged; the clause is emitted whenever a window is set.
    pub fn updated_within(mut self, minutes: i64) -> Self {
        self.updated_within = Some(minutes);
        self
    }

    /// Renders the final JQL string.
    pub fn build(&self) -> Result<String, ScanError> {
        if self.project.is_empty() {
            return Err(ScanError::InvalidConfiguration(
                "project key must not be empty".to_string(),
            ));
        }

        let mut jql = format!("project={}", self.project);
        if let Some(minutes) = self.updated_within {
            jql.push_str(&format!(" AND updatedDate >= {}m", minutes));
        }
        Ok(jql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_only_query() {
        let jql = JqlQuery::for_project("VEGA").build().unwrap();
        assert_eq!(jql, "project=VEGA");
    }

    #[test]
    fn test_recency_window_always_applied() {
        let jql = JqlQuery::for_project("VEGA")
            .updated_within(-30)
            .build()
            .unwrap();
        assert_eq!(jql, "project=VEGA AND updatedDate >= -30m");

        // The sign is the caller's choice; positive windows render unchanged.
        let jql = JqlQuery::for_project("VEGA")
            .updated_within(30)
            .build()
            .unwrap();
        assert_eq!(jql, "project=VEGA AND updatedDate >= 30m");
    }

    #[test]
    fn test_project_key_trimmed() {
        let jql = JqlQuery::for_project("  VEGA  ").build().unwrap();
        assert_eq!(jql, "project=VEGA");
    }

    #[test]
    fn test_empty_project_rejected() {
        let err = JqlQuery::for_project("   ").build().unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfiguration(_)));
    }
}
