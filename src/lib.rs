//! MoleQueue client - Correlated JSON-RPC calls over a local socket.
//!
//! This library lets any number of application threads issue blocking,
//! timeout-bounded calls to a MoleQueue server over one persistent
//! connection, and delivers the server's unsolicited notifications to
//! registered callbacks.
//!
//! # Architecture
//!
//! The client follows a caller-thread / I/O-thread model:
//!
//! - **Caller threads**: assign a packet id, register a pending slot, send,
//!   then block on a condition variable until the slot is filled or the
//!   timeout elapses
//! - **I/O thread** (`molequeue-io`): reads frames, routes replies to their
//!   slots by id and hands notifications to callbacks in registration order
//!
//! Key design principles:
//!
//! - Each [`Client`] owns its connection, I/O thread and correlation state
//! - Replies are matched by id only; concurrent calls may complete in any order
//! - A timeout is an outcome ([`CallOutcome::TimedOut`]), not an error
//! - A panicking notification callback never stops the others
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use molequeue_client::{CallOutcome, Client, Result};
//!
//! fn main() -> Result<()> {
//!     let client = Client::connect("MoleQueue")?;
//!
//!     client.register_notification(|notification| {
//!         println!("{}: {}", notification.method, notification.params);
//!     });
//!
//!     if let CallOutcome::Completed(id) =
//!         client.submit("TestQueue", "TestProgram", Duration::from_secs(30))?
//!     {
//!         println!("Submitted job {id}");
//!     }
//!
//!     client.disconnect()
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`Client`] facade, builder and options |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | JSON-RPC envelopes and MoleQueue payloads |
//! | [`rpc`] | Packet ids, pending table, receive loop, dispatcher |
//! | [`transport`] | Transport contract, local socket and in-memory transports |

// ============================================================================
// Modules
// ============================================================================

/// Client facade.
///
/// Use [`Client::connect()`] or [`Client::builder()`] to open a connection.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for packets and jobs.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// JSON-RPC protocol message types.
pub mod protocol;

/// Request/reply correlation engine.
pub mod rpc;

/// Transport layer.
///
/// Framed duplex channels the client runs on.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{CallOutcome, Client, ClientBuilder, ClientOptions};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{MoleQueueId, PacketId};

// Protocol types
pub use protocol::{
    JobInfo, JobRequest, JobState, JobStateChange, Notification, QueueList, RpcError,
    SubmitJobResult,
};

// Correlation types
pub use rpc::NotificationCallback;

// Transport types
#[cfg(unix)]
pub use transport::LocalSocketConnector;
pub use transport::{Connector, Endpoint, FrameSink, MemoryConnector, MemoryPeer, Transport, memory_pair};
