//! Elasticsearch client configuration.

use std::time::Duration;

use crate::error::{IndexError, Result};

/// Default Elasticsearch endpoint.
pub const DEFAULT_URL: &str = "http://localhost:9200";

/// Default timeout for a single HTTP request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for [`crate::ElasticsearchStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElasticsearchConfig {
    /// Base URL, e.g. `http://localhost:9200`.
    pub url: String,
    /// Limit on each request.
    pub timeout: Duration,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

impl ElasticsearchConfig {
    /// Creates a config for the given base URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Config`] if the URL is not http(s) or the
    /// timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(IndexError::Config(
                "index url must start with http:// or https://".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(IndexError::Config("timeout must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_localhost() {
        let config = ElasticsearchConfig::default();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let config = ElasticsearchConfig::new("http://es:9200/");
        assert_eq!(config.base_url(), "http://es:9200");
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert!(ElasticsearchConfig::new("es:9200").validate().is_err());
        assert!(
            ElasticsearchConfig::new("https://es")
                .with_timeout(Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
