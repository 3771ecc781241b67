//! Client connection settings.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use molequeue_client::ClientOptions;
//!
//! let options = ClientOptions::new()
//!     .with_default_timeout(Duration::from_secs(5))
//!     .with_max_pending_requests(16);
//!
//! assert!(options.validate().is_ok());
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};
use crate::transport::frame::{DEFAULT_MAX_FRAME_SIZE, NULL_LENGTH};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for [`Client::call_default`](crate::Client::call_default).
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for opening the local socket.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default cap on concurrently outstanding requests.
pub const DEFAULT_MAX_PENDING_REQUESTS: usize = 100;

// ============================================================================
// ClientOptions
// ============================================================================

/// Tunable limits of one client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Timeout used by the `*_default` calls.
    pub default_timeout: Duration,

    /// Timeout for opening the socket.
    pub connect_timeout: Duration,

    /// Calls beyond this many outstanding requests fail immediately.
    pub max_pending_requests: usize,

    /// Largest inbound frame payload accepted, in bytes.
    pub max_frame_size: usize,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            default_timeout: DEFAULT_CALL_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_pending_requests: DEFAULT_MAX_PENDING_REQUESTS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Sets the default call timeout.
    #[inline]
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the outstanding request cap.
    #[inline]
    #[must_use]
    pub const fn with_max_pending_requests(mut self, max: usize) -> Self {
        self.max_pending_requests = max;
        self
    }

    /// Sets the inbound frame size limit.
    #[inline]
    #[must_use]
    pub const fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientOptions {
    /// Checks that every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout.is_zero() {
            return Err(Error::config("connect_timeout must be greater than zero"));
        }
        if self.max_pending_requests == 0 {
            return Err(Error::config(
                "max_pending_requests must be greater than zero",
            ));
        }
        if self.max_frame_size == 0 {
            return Err(Error::config("max_frame_size must be greater than zero"));
        }
        if !u32::try_from(self.max_frame_size).is_ok_and(|len| len < NULL_LENGTH) {
            return Err(Error::config(format!(
                "max_frame_size must be below {NULL_LENGTH} bytes"
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
