//! GitHub backend configuration.

use secrecy::SecretString;
use std::time::Duration;

/// Public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Connection and discovery settings for [`GitHubPlatform`](crate::GitHubPlatform).
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// Personal access token
    pub token: SecretString,
    /// REST API base URL (`https://api.github.com`, or `https://host/api/v3` for Enterprise Server)
    pub api_url: String,
    /// Repositories requested per listing page
    pub page_size: u8,
    /// How many times to look for the push-started run before giving up
    pub discovery_attempts: u32,
    /// Delay between two discovery attempts
    pub discovery_interval: Duration,
}

impl GitHubConfig {
    /// Configuration for github.com.
    #[must_use]
    pub fn new(token: SecretString) -> Self {
        Self {
            token,
            api_url: DEFAULT_API_URL.to_string(),
            page_size: 100,
            discovery_attempts: 10,
            discovery_interval: Duration::from_secs(3),
        }
    }

    /// Use another API base URL.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the listing page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u8) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set run discovery attempts and the delay between them.
    #[must_use]
    pub const fn with_discovery(mut self, attempts: u32, interval: Duration) -> Self {
        self.discovery_attempts = attempts;
        self.discovery_interval = interval;
        self
    }

    /// Web origin that hosts the git remotes (`https://github.com` for the public API).
    #[must_use]
    pub fn web_origin(&self) -> String {
        let (scheme, rest) = self
            .api_url
            .split_once("://")
            .unwrap_or(("https", self.api_url.as_str()));
        let host = rest.split('/').next().unwrap_or(rest);
        let host = if host == "api.github.com" {
            "github.com"
        } else {
            host
        };
        format!("{scheme}://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> GitHubConfig {
        GitHubConfig::new(SecretString::from("t")).with_api_url(url)
    }

    #[test]
    fn test_web_origin_public() {
        assert_eq!(config(DEFAULT_API_URL).web_origin(), "https://github.com");
    }

    #[test]
    fn test_web_origin_enterprise() {
        assert_eq!(
            config("https://ghe.example.inc/api/v3/").web_origin(),
            "https://ghe.example.inc"
        );
    }

    #[test]
    fn test_web_origin_keeps_scheme_and_port() {
        assert_eq!(
            config("http://127.0.0.1:8080").web_origin(),
            "http://127.0.0.1:8080"
        );
    }
}
