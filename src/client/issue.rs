//! Wire types for the Jira REST v2 API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An issue as returned by `GET /rest/api/2/issue/{key}`.
///
/// `fields` is kept as raw JSON: Jira instances differ wildly in the fields
/// they attach, so the client exposes the raw object and lets callers decode
/// the subset they care about via
/// [`issue_fields_as`](crate::client::JiraClient::issue_fields_as).
#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    /// Internal numeric id, as a string.
    pub id: String,
    /// Human-readable key, e.g. `VEGA-1704`.
    pub key: String,
    /// Raw field object.
    #[serde(default)]
    pub fields: Value,
}

/// Reference to a project by key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectRef {
    pub key: String,
}

/// Reference to a named entity: issue type, assignee, component or version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameRef {
    pub name: String,
}

/// Field payload for issue creation and update.
///
/// Only the commonly written fields are modelled. Everything else, custom
/// fields included, goes through [`with_custom`](IssueFields::with_custom)
/// and is flattened into the same `fields` object on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    // Jira spells this one without the camel hump.
    #[serde(rename = "issuetype", skip_serializing_if = "Option::is_none")]
    pub issue_type: Option<NameRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee: Option<NameRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<NameRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fix_versions: Vec<NameRef>,
    /// Custom fields (`customfield_*`) and anything else not modelled above.
    #[serde(flatten)]
    pub custom: Map<String, Value>,
}

impl IssueFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(mut self, key: &str) -> Self {
        self.project = Some(ProjectRef {
            key: key.to_string(),
        });
        self
    }

    pub fn with_summary(mut self, summary: &str) -> Self {
        self.summary = Some(summary.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn with_issue_type(mut self, name: &str) -> Self {
        self.issue_type = Some(NameRef {
            name: name.to_string(),
        });
        self
    }

    pub fn with_assignee(mut self, name: &str) -> Self {
        self.assignee = Some(NameRef {
            name: name.to_string(),
        });
        self
    }

    pub fn with_component(mut self, name: &str) -> Self {
        self.components.push(NameRef {
            name: name.to_string(),
        });
        self
    }

    pub fn with_fix_version(mut self, name: &str) -> Self {
        self.fix_versions.push(NameRef {
            name: name.to_string(),
        });
        self
    }

    pub fn with_custom(mut self, field: &str, value: Value) -> Self {
        self.custom.insert(field.to_string(), value);
        self
    }
}

/// Body of `POST /rest/api/2/issue`.
#[derive(Debug, Clone, Serialize)]
pub struct NewIssue {
    pub fields: IssueFields,
}

impl NewIssue {
    pub fn new(fields: IssueFields) -> Self {
        Self { fields }
    }
}

/// Body of `PUT /rest/api/2/issue/{key}`.
#[derive(Debug, Clone, Serialize)]
pub struct IssueUpdate {
    pub fields: IssueFields,
}

impl IssueUpdate {
    pub fn new(fields: IssueFields) -> Self {
        Self { fields }
    }
}

/// Response body of `POST /rest/api/2/issue`.
#[derive(Debug, Deserialize)]
pub(crate) struct CreatedIssue {
    pub key: String,
}

/// Response envelope of `GET /rest/api/2/search`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub issues: Vec<SearchIssue>,
    #[serde(default)]
    pub total: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchIssue {
    pub key: String,
}
