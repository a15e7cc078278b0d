//! GitLab backend configuration.

use secrecy::SecretString;
use std::time::Duration;

/// gitlab.com REST endpoint.
pub const DEFAULT_API_URL: &str = "https://gitlab.com/api/v4";

/// Username treated as an instance administrator.
pub const DEFAULT_SUPERUSER: &str = "root";

const API_SUFFIX: &str = "/api/v4";

/// Connection and discovery settings for [`GitLabPlatform`](crate::GitLabPlatform).
#[derive(Debug, Clone)]
pub struct GitLabConfig {
    /// Personal access token, sent as `PRIVATE-TOKEN`
    pub token: SecretString,
    /// API base URL, e.g. `https://gitlab.example.inc/api/v4`
    pub api_url: String,
    /// Username that counts as admin regardless of the `is_admin` flag
    pub superuser: Option<String>,
    /// Items requested per listing page
    pub page_size: u8,
    /// How many times to look for the push-started pipeline
    pub discovery_attempts: u32,
    /// Delay between two discovery attempts
    pub discovery_interval: Duration,
    /// Create a pipeline for the branch when none was started by the push
    pub create_on_missing: bool,
}

impl GitLabConfig {
    /// Configuration for gitlab.com.
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            api_url: DEFAULT_API_URL.to_string(),
            superuser: Some(DEFAULT_SUPERUSER.to_string()),
            page_size: 100,
            discovery_attempts: 5,
            discovery_interval: Duration::from_secs(2),
            create_on_missing: true,
        }
    }

    /// Use a self-hosted instance.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override (or clear) the superuser name.
    #[must_use]
    pub fn with_superuser(mut self, name: Option<String>) -> Self {
        self.superuser = name;
        self
    }

    /// Set the listing page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u8) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set pipeline discovery attempts and the delay between them.
    #[must_use]
    pub const fn with_discovery(mut self, attempts: u32, interval: Duration) -> Self {
        self.discovery_attempts = attempts;
        self.discovery_interval = interval;
        self
    }

    /// Whether to create a pipeline when discovery finds none.
    #[must_use]
    pub const fn with_create_on_missing(mut self, create: bool) -> Self {
        self.create_on_missing = create;
        self
    }

    /// Web origin hosting the git remotes: the API URL without `/api/v4`.
    #[must_use]
    pub fn web_origin(&self) -> &str {
        self.api_url
            .strip_suffix(API_SUFFIX)
            .unwrap_or(&self.api_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_web_origin_strips_api_suffix() {
        let config = GitLabConfig::new(SecretString::from("t"))
            .with_api_url("https://gitlab.example.inc/api/v4/");
        assert_eq!(config.web_origin(), "https://gitlab.example.inc");
    }

    #[test]
    fn test_web_origin_without_suffix() {
        let config =
            GitLabConfig::new(SecretString::from("t")).with_api_url("http://10.0.0.5:8080");
        assert_eq!(config.web_origin(), "http://10.0.0.5:8080");
    }

    #[test]
    fn test_defaults() {
        let config = GitLabConfig::new(SecretString::from("t"));
        assert_eq!(config.web_origin(), "https://gitlab.com");
        assert_eq!(config.superuser.as_deref(), Some("root"));
        assert!(config.create_on_missing);
    }
}
