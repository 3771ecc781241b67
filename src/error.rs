//! Error types for the MoleQueue client.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use std::time::Duration;
//! use molequeue_client::{Client, Result};
//!
//! fn example(client: &Client) -> Result<()> {
//!     let outcome = client.submit("TestQueue", "TestProgram", Duration::from_secs(30))?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Transport | [`Error::Connection`], [`Error::ConnectionTimeout`], [`Error::ConnectionClosed`] |
//! | Remote | [`Error::Remote`] |
//! | Protocol | [`Error::Protocol`], [`Error::MalformedFrame`] |
//! | Registration | [`Error::InvalidCallback`] |
//! | Execution | [`Error::RequestTimeout`] |
//! | External | [`Error::Io`], [`Error::Json`] |
//!
//! A call that simply runs out of time is *not* an error: it is reported as
//! [`CallOutcome::TimedOut`](crate::CallOutcome::TimedOut). Use
//! [`CallOutcome::into_result`](crate::CallOutcome::into_result) to turn it
//! into [`Error::RequestTimeout`] when `?` is more convenient.

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::result::Result as StdResult;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::identifiers::PacketId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when client options or the endpoint name are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Transport failure.
    ///
    /// Returned when the local socket cannot be opened or a send fails.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Timeout while opening the local socket.
    #[error("Connection timeout after {timeout_ms}ms")]
    ConnectionTimeout {
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Connection closed, either by [`Client::disconnect`](crate::Client::disconnect)
    /// or by the server hanging up.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Remote Errors
    // ========================================================================
    /// The server answered with a JSON-RPC error object.
    #[error("Remote error {code}: {message}")]
    Remote {
        /// Server supplied error code.
        code: i64,
        /// Server supplied error message.
        message: String,
        /// Optional structured error data.
        data: Option<Value>,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or unexpected reply payload.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Inbound frame could not be decoded.
    ///
    /// Only produced on the I/O thread, where it is logged and the frame is
    /// dropped. It never reaches a caller of [`Client::call`](crate::Client::call).
    #[error("Malformed frame: {message}")]
    MalformedFrame {
        /// Why the frame was rejected.
        message: String,
    },

    // ========================================================================
    // Registration Errors
    // ========================================================================
    /// Notification callback rejected at registration time.
    #[error("Invalid callback: {message}")]
    InvalidCallback {
        /// Why the callback was rejected.
        message: String,
    },

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// A request timed out.
    ///
    /// Only produced by [`CallOutcome::into_result`](crate::CallOutcome::into_result).
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The packet id that timed out.
        request_id: PacketId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] IoError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a connection timeout error.
    #[inline]
    pub fn connection_timeout(timeout_ms: u64) -> Self {
        Self::ConnectionTimeout { timeout_ms }
    }

    /// Creates a remote error.
    #[inline]
    pub fn remote(code: i64, message: impl Into<String>, data: Option<Value>) -> Self {
        Self::Remote {
            code,
            message: message.into(),
            data,
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a malformed frame error.
    #[inline]
    pub fn malformed_frame(message: impl Into<String>) -> Self {
        Self::MalformedFrame {
            message: message.into(),
        }
    }

    /// Creates an invalid callback error.
    #[inline]
    pub fn invalid_callback(message: impl Into<String>) -> Self {
        Self::InvalidCallback {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: PacketId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::ConnectionTimeout { .. } | Self::RequestTimeout { .. }
        )
    }

    /// Returns `true` if this is a transport error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionTimeout { .. } | Self::ConnectionClosed
        )
    }

    /// Returns `true` if the server rejected the request.
    #[inline]
    #[must_use]
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }

    /// Returns the server error code, if this is a remote error.
    #[inline]
    #[must_use]
    pub fn remote_code(&self) -> Option<i64> {
        match self {
            Self::Remote { code, .. } => Some(*code),
            _ => None,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
#[inline]
#[must_use]
pub(crate) fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::ErrorKind;

    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = Error::connection("socket missing");
        assert_eq!(err.to_string(), "Connection failed: socket missing");
    }

    #[test]
    fn test_remote_error_display() {
        let err = Error::remote(7, "bad queue", None);
        assert_eq!(err.to_string(), "Remote error 7: bad queue");
    }

    #[test]
    fn test_remote_code() {
        let err = Error::remote(-32601, "Method not found", Some(json!("fooBar")));
        assert!(err.is_remote());
        assert_eq!(err.remote_code(), Some(-32601));
        assert_eq!(Error::ConnectionClosed.remote_code(), None);
    }

    #[test]
    fn test_is_timeout() {
        let id = PacketId::new(3).expect("valid packet id");
        let timeout_err = Error::request_timeout(id, 1000);
        let other_err = Error::connection("test");

        assert!(timeout_err.is_timeout());
        assert!(!other_err.is_timeout());
        assert_eq!(
            timeout_err.to_string(),
            "Request 3 timed out after 1000ms"
        );
    }

    #[test]
    fn test_is_connection_error() {
        assert!(Error::connection("test").is_connection_error());
        assert!(Error::connection_timeout(10).is_connection_error());
        assert!(Error::ConnectionClosed.is_connection_error());
        assert!(!Error::config("test").is_connection_error());
        assert!(!Error::remote(1, "x", None).is_connection_error());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = IoError::new(ErrorKind::NotFound, "no such socket");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn test_duration_ms_saturates() {
        assert_eq!(duration_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }
}
