//! Request/reply correlation.
//!
//! The pieces shared between caller threads and the I/O thread:
//!
//! | Module | Runs on | Description |
//! |--------|---------|-------------|
//! | `packet_id` | caller | Unique, increasing packet ids |
//! | `pending` | both | Slots that hand replies to blocked callers |
//! | `receive` | I/O | Classifies inbound frames |
//! | `dispatcher` | I/O | Ordered notification fan-out |

// ============================================================================
// Submodules
// ============================================================================

/// Notification fan-out.
pub mod dispatcher;

/// Packet id generation.
pub mod packet_id;

/// Pending request table.
pub mod pending;

/// Inbound frame routing.
pub mod receive;

// ============================================================================
// Re-exports
// ============================================================================

pub use dispatcher::{NotificationCallback, NotificationDispatcher};
pub use packet_id::PacketIdGenerator;
pub use pending::PendingRequestTable;
pub use receive::ReceiveLoop;
