//! Builder pattern for client configuration.
//!
//! Provides a fluent API for configuring and connecting [`Client`] instances.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use molequeue_client::Client;
//!
//! # fn example() -> molequeue_client::Result<()> {
//! let client = Client::builder()
//!     .endpoint("MoleQueue")
//!     .default_timeout(Duration::from_secs(10))
//!     .connect()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::transport::{Connector, DEFAULT_ENDPOINT_NAME, Endpoint};

use super::core::Client;
use super::options::ClientOptions;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`] connection.
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Clone)]
pub struct ClientBuilder {
    /// Endpoint name or socket path.
    endpoint: String,
    /// Limits and timeouts.
    options: ClientOptions,
    /// Transport factory; the local socket connector when unset.
    connector: Option<Arc<dyn Connector>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("endpoint", &self.endpoint)
            .field("options", &self.options)
            .field("custom_connector", &self.connector.is_some())
            .finish()
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a builder targeting the default `MoleQueue` endpoint.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT_NAME.to_string(),
            options: ClientOptions::new(),
            connector: None,
        }
    }

    /// Sets the endpoint.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Server name (e.g. "MoleQueue") or socket path
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the timeout used by [`Client::call_default`].
    #[inline]
    #[must_use]
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.options.default_timeout = timeout;
        self
    }

    /// Sets the timeout for opening the socket.
    #[inline]
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Sets the cap on concurrently outstanding requests.
    #[inline]
    #[must_use]
    pub fn max_pending_requests(mut self, max: usize) -> Self {
        self.options.max_pending_requests = max;
        self
    }

    /// Sets the largest inbound frame accepted, in bytes.
    #[inline]
    #[must_use]
    pub fn max_frame_size(mut self, bytes: usize) -> Self {
        self.options.max_frame_size = bytes;
        self
    }

    /// Replaces all limits at once.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Uses a custom transport instead of the local socket.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Connects with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`](crate::Error::Config) if the endpoint or an option is invalid
    /// - [`Error::Connection`](crate::Error::Connection) if the server is not listening
    /// - [`Error::ConnectionTimeout`](crate::Error::ConnectionTimeout) if the socket does not open in time
    pub fn connect(self) -> Result<Client> {
        self.options.validate()?;
        let endpoint = Endpoint::resolve(&self.endpoint)?;
        let connector = self.resolve_connector()?;

        Client::open(endpoint, self.options, connector.as_ref())
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Returns the configured connector, or the platform default.
    fn resolve_connector(&self) -> Result<Arc<dyn Connector>> {
        if let Some(connector) = &self.connector {
            return Ok(Arc::clone(connector));
        }

        #[cfg(unix)]
        {
            Ok(Arc::new(crate::transport::LocalSocketConnector::new(
                self.options.connect_timeout,
                self.options.max_frame_size,
            )))
        }

        #[cfg(not(unix))]
        {
            Err(crate::error::Error::config(
                "No local socket transport on this platform. Use .connector() to supply one.",
            ))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
