//! Client configuration with builder pattern.
//!
//! Provides type-safe configuration for the metakv client:
//! - Server endpoint
//! - Connect and request timeouts
//! - Reconnect policy for channel loss

use std::time::Duration;

use snafu::ensure;

use crate::error::{ConfigSnafu, Result};

/// Default request timeout (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout (5 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Reconnect backoff policy.
///
/// After channel loss the client redials with exponential backoff:
/// `initial_backoff * multiplier^attempt`, capped at `max_backoff`, with
/// ±`jitter` randomness to spread simultaneous reconnects. Attempts
/// continue until the client is explicitly closed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    /// First delay after a channel loss.
    pub initial_backoff: Duration,
    /// Upper bound on the delay between attempts.
    pub max_backoff: Duration,
    /// Backoff growth factor.
    pub multiplier: f64,
    /// Jitter factor in `[0, 1]` applied to each delay.
    pub jitter: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: 0.25,
        }
    }
}

/// Configuration for the metakv client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server endpoint, `host:port`.
    pub(crate) endpoint: String,

    /// Request timeout.
    pub(crate) request_timeout: Duration,

    /// Connection establishment timeout.
    pub(crate) connect_timeout: Duration,

    /// Whether the client redials automatically after channel loss.
    pub(crate) auto_reconnect: bool,

    /// Backoff policy for reconnect attempts.
    pub(crate) reconnect: ReconnectPolicy,
}

impl ClientConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Returns the configured endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Returns whether automatic reconnect is enabled.
    #[must_use]
    pub fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    /// Returns the reconnect policy.
    #[must_use]
    pub fn reconnect(&self) -> &ReconnectPolicy {
        &self.reconnect
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    endpoint: Option<String>,
    request_timeout: Duration,
    connect_timeout: Duration,
    auto_reconnect: bool,
    reconnect: ReconnectPolicy,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        ClientConfigBuilder {
            endpoint: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            auto_reconnect: true,
            reconnect: ReconnectPolicy::default(),
        }
    }
}

impl ClientConfigBuilder {
    /// Sets the server endpoint (`host:port`). Required.
    #[must_use]
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the request timeout.
    ///
    /// Default: 30 seconds.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the connection establishment timeout.
    ///
    /// Default: 5 seconds.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enables or disables automatic reconnect.
    ///
    /// Default: enabled. Tests that assert on channel loss disable it.
    #[must_use]
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Sets the reconnect backoff policy.
    ///
    /// Default: [`ReconnectPolicy::default()`] (1s doubling to a 10s cap).
    #[must_use]
    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Validates and builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the endpoint is missing or
    /// empty, or a timeout is zero.
    pub fn build(self) -> Result<ClientConfig> {
        let endpoint = self.endpoint.unwrap_or_default();
        ensure!(!endpoint.is_empty(), ConfigSnafu { message: "endpoint is required" });
        ensure!(
            !self.request_timeout.is_zero(),
            ConfigSnafu { message: "request timeout must be non-zero" }
        );
        ensure!(
            !self.connect_timeout.is_zero(),
            ConfigSnafu { message: "connect timeout must be non-zero" }
        );
        Ok(ClientConfig {
            endpoint,
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            auto_reconnect: self.auto_reconnect,
            reconnect: self.reconnect,
        })
    }
}
