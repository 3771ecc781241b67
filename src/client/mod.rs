//! MoleQueue client module.
//!
//! This module provides the main entry point for talking to a server.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | One connection; blocking calls and notification callbacks |
//! | [`ClientBuilder`] | Fluent configuration builder |
//! | [`ClientOptions`] | Timeouts and limits |
//! | [`CallOutcome`] | Completed or timed out |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for client configuration.
pub mod builder;

/// Core client implementation.
pub mod core;

/// Client timeouts and limits.
pub mod options;

/// Outcome of a bounded call.
pub mod outcome;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ClientBuilder;
pub use self::core::Client;
pub use options::ClientOptions;
pub use outcome::CallOutcome;
