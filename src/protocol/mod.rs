//! MoleQueue JSON-RPC message types.
//!
//! This module defines the message format exchanged with a MoleQueue server
//! over the local socket.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Client → Server | Method call, carries a packet id |
//! | `Reply` | Server → Client | `result` or `error` for one packet id |
//! | `Notification` | Server → Client | Id-less event, e.g. `jobStateChanged` |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `envelope` | JSON-RPC envelopes and inbound classification |
//! | `job` | MoleQueue method names and payload schemas |

// ============================================================================
// Submodules
// ============================================================================

/// JSON-RPC envelopes.
pub mod envelope;

/// MoleQueue payload schemas.
pub mod job;

// ============================================================================
// Re-exports
// ============================================================================

pub use envelope::{
    Inbound, JSONRPC_VERSION, Notification, Reply, ReplyPayload, Request, RpcError, error_code,
};
pub use job::{
    CancelJobResult, JobInfo, JobRequest, JobState, JobStateChange, Method, MoleQueueIdParams,
    QueueList, SubmitJobResult,
};
