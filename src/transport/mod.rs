//! Local socket transport layer.
//!
//! This module defines the transport contract the client is built on and
//! provides two implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                         ┌─────────────────┐
//! │  Client (Rust)       │                         │  MoleQueue      │
//! │                      │      local socket       │  server         │
//! │  caller threads ─────┼──► molequeue-io ───────►│                 │
//! │  FrameSink  ◄────────┼─── thread       ◄───────│                 │
//! └──────────────────────┘   <tmp>/MoleQueue       └─────────────────┘
//! ```
//!
//! # Contract
//!
//! | Operation | Rust item |
//! |-----------|-----------|
//! | `connect(address)` | [`Connector::connect`] |
//! | `send(bytes)` | [`Transport::send`] |
//! | `onReceive(callback)` | the [`FrameSink`] handed to `connect` |
//! | `close()` | [`Transport::close`] |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `frame` | Length-prefixed frame codec |
//! | `local` | Unix local socket transport with a dedicated I/O thread |
//! | `memory` | In-process transport for tests and embedding |

// ============================================================================
// Submodules
// ============================================================================

/// Length-prefixed frame codec.
pub mod frame;

/// Unix local socket transport.
#[cfg(unix)]
pub mod local;

/// In-process transport.
pub mod memory;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};

// ============================================================================
// Re-exports
// ============================================================================

#[cfg(unix)]
pub use local::LocalSocketConnector;
pub use memory::{MemoryConnector, MemoryPeer, memory_pair};

// ============================================================================
// Constants
// ============================================================================

/// Name of the server's local socket when none is configured.
pub const DEFAULT_ENDPOINT_NAME: &str = "MoleQueue";

// ============================================================================
// Traits
// ============================================================================

/// Receiver of inbound frames.
///
/// Called on the transport's I/O thread. Implementations must return
/// promptly; the next frame is not read until `on_frame` returns.
pub trait FrameSink: Send + Sync + 'static {
    /// Handles one complete inbound frame payload.
    fn on_frame(&self, frame: Vec<u8>);

    /// Called once when the channel closes for any reason.
    fn on_closed(&self) {}
}

/// A connected, message-framed duplex channel.
///
/// `send` may be called concurrently from any number of threads; the
/// transport serializes writes internally.
pub trait Transport: Send + Sync {
    /// Sends one frame payload, returning once it has been written.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the channel is closed
    /// - [`Error::Connection`] if the write fails
    fn send(&self, frame: Vec<u8>) -> Result<()>;

    /// Flushes queued frames, stops the I/O thread and closes the channel.
    ///
    /// Calling `close` more than once is a no-op.
    fn close(&self) -> Result<()>;
}

/// Opens transports.
pub trait Connector: Send + Sync {
    /// Connects to `endpoint`, delivering inbound frames to `sink`.
    ///
    /// # Errors
    ///
    /// Returns a transport error if the endpoint cannot be reached.
    fn connect(&self, endpoint: &Endpoint, sink: Arc<dyn FrameSink>) -> Result<Box<dyn Transport>>;
}

// ============================================================================
// Endpoint
// ============================================================================

/// A resolved local socket address.
///
/// A name containing a path separator is used verbatim; a bare name such as
/// `"MoleQueue"` resolves to `<temp dir>/MoleQueue`, where the server
/// creates its socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    name: String,
    path: PathBuf,
}

impl Endpoint {
    /// Resolves an endpoint name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `name` is empty or blank.
    pub fn resolve(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::config("Endpoint name must not be empty"));
        }

        let path = if name.contains(std::path::MAIN_SEPARATOR) || name.contains('/') {
            PathBuf::from(&name)
        } else {
            std::env::temp_dir().join(&name)
        };

        Ok(Self { name, path })
    }

    /// The name the endpoint was resolved from.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The socket path.
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name_resolves_to_temp_dir() {
        let endpoint = Endpoint::resolve(DEFAULT_ENDPOINT_NAME).expect("resolve");
        assert_eq!(endpoint.name(), "MoleQueue");
        assert_eq!(endpoint.path(), std::env::temp_dir().join("MoleQueue"));
    }

    #[test]
    fn test_path_is_used_verbatim() {
        let endpoint = Endpoint::resolve("/run/user/1000/MoleQueue").expect("resolve");
        assert_eq!(endpoint.path(), Path::new("/run/user/1000/MoleQueue"));
        assert_eq!(endpoint.to_string(), "/run/user/1000/MoleQueue");
    }

    #[test]
    fn test_empty_name_rejected() {
        assert!(matches!(Endpoint::resolve(""), Err(Error::Config { .. })));
        assert!(matches!(Endpoint::resolve("   "), Err(Error::Config { .. })));
    }
}
