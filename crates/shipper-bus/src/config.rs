//! Bus connection configuration.

use std::fmt;
use std::time::Duration;

use crate::error::{BusError, Result};

/// Default NATS client port.
pub const DEFAULT_NATS_PORT: u16 = 4222;

/// Default timeout for a single bus round trip.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Username/password pair for the bus.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account name.
    pub username: String,
    /// Account password.
    pub password: String,
}

impl Credentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Connection settings for the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// Server host name or address.
    pub server: String,
    /// Server port.
    pub port: u16,
    /// Cluster the durable streams live in.
    pub cluster_id: String,
    /// Optional credentials.
    pub credentials: Option<Credentials>,
    /// Limit on each connect, publish, subscribe and ack call.
    pub request_timeout: Duration,
}

impl BusConfig {
    /// Creates a config for the given server and cluster.
    #[must_use]
    pub fn new(server: impl Into<String>, cluster_id: impl Into<String>) -> Self {
        Self {
            server: server.into(),
            port: DEFAULT_NATS_PORT,
            cluster_id: cluster_id.into(),
            credentials: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Sets the server port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the per-call timeout.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the server URL, without credentials.
    #[must_use]
    pub fn server_url(&self) -> String {
        format!("nats://{}:{}", self.server, self.port)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Config`] if the server or cluster is empty or the
    /// timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.server.trim().is_empty() {
            return Err(BusError::Config("need a bus server to connect".to_string()));
        }
        if self.cluster_id.trim().is_empty() {
            return Err(BusError::Config("need a cluster name to connect".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(BusError::Config("request timeout must be positive".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = BusConfig::new("localhost", "test");
        assert_eq!(config.port, DEFAULT_NATS_PORT);
        assert_eq!(config.request_timeout, DEFAULT_REQUEST_TIMEOUT);
        assert!(config.credentials.is_none());
        assert_eq!(config.server_url(), "nats://localhost:4222");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_setters() {
        let config = BusConfig::new("nats.internal", "prod")
            .with_port(14222)
            .with_credentials(Credentials::new("icinga", "secret"))
            .with_request_timeout(Duration::from_secs(3));

        assert_eq!(config.server_url(), "nats://nats.internal:14222");
        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(
            config.credentials.as_ref().map(|c| c.username.as_str()),
            Some("icinga")
        );
    }

    #[test]
    fn validate_rejects_missing_server_and_cluster() {
        assert!(matches!(
            BusConfig::new("", "test").validate(),
            Err(BusError::Config(_))
        ));
        assert!(matches!(
            BusConfig::new("localhost", " ").validate(),
            Err(BusError::Config(_))
        ));
        assert!(matches!(
            BusConfig::new("localhost", "test")
                .with_request_timeout(Duration::ZERO)
                .validate(),
            Err(BusError::Config(_))
        ));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("icinga", "hunter2"));
        assert!(debug.contains("icinga"));
        assert!(!debug.contains("hunter2"));
    }
}
