//! Client configuration and credential loading.

use std::time::Duration;

use crate::error::{ClientError, ClientResult};

/// Environment variable holding the Jira base URL.
pub const ENV_BASE_URL: &str = "JIRA_BASE_URL";
/// Environment variable holding the Jira username.
pub const ENV_USER: &str = "JIRA_USER";
/// Environment variable holding the Jira API token (or password).
pub const ENV_TOKEN: &str = "JIRA_TOKEN";

const DEFAULT_TIMEOUT_SECS: u64 = 60;
const DEFAULT_USER_AGENT: &str = "jirascan/0.1";

/// Basic-auth identity sent with every request.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

/// Connection settings for a [`JiraClient`](crate::client::JiraClient).
#[derive(Debug, Clone)]
pub struct JiraConfig {
    /// Base URL of the Jira instance, without a trailing slash.
    pub base_url: String,
    /// Basic-auth credentials.
    pub credentials: Credentials,
    /// Whole-request timeout applied to every HTTP call.
    pub timeout: Duration,
    /// User-Agent header value.
    pub user_agent: String,
}

impl JiraConfig {
    pub fn new(base_url: &str, username: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: Credentials {
                username: username.to_string(),
                token: token.to_string(),
            },
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    /// Loads the configuration from `JIRA_BASE_URL`, `JIRA_USER` and
    /// `JIRA_TOKEN`.
    pub fn from_env() -> ClientResult<Self> {
        let base_url = std::env::var(ENV_BASE_URL).map_err(|_| ClientError::MissingBaseUrl)?;
        let username = std::env::var(ENV_USER).map_err(|_| ClientError::MissingCredentials)?;
        let token = std::env::var(ENV_TOKEN).map_err(|_| ClientError::MissingCredentials)?;
        Ok(Self::new(&base_url, &username, &token))
    }
}
