//! Type-safe identifiers.
//!
//! Newtype wrappers keep JSON-RPC packet ids and server-assigned job ids
//! from being mixed up at compile time.
//!
//! | Type | Assigned by | Zero allowed |
//! |------|-------------|--------------|
//! | [`PacketId`] | client, per connection | no |
//! | [`MoleQueueId`] | server, per job | yes (the server's "invalid job") |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::num::NonZeroU64;

use serde::{Deserialize, Serialize};

// ============================================================================
// PacketId
// ============================================================================

/// JSON-RPC correlation id.
///
/// Unique and strictly increasing for the lifetime of a connection. Zero is
/// reserved as the "no id" sentinel carried by notifications, so a
/// `PacketId` is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PacketId(NonZeroU64);

impl PacketId {
    /// Creates a packet id, returning `None` for zero.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Option<Self> {
        match NonZeroU64::new(value) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// The first id issued on a connection.
    #[inline]
    #[must_use]
    pub const fn first() -> Self {
        Self(NonZeroU64::MIN)
    }

    /// Returns the id following this one.
    #[inline]
    #[must_use]
    pub const fn successor(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// MoleQueueId
// ============================================================================

/// Server-assigned job identifier.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MoleQueueId(u64);

impl MoleQueueId {
    /// Wraps a raw job id.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns `true` unless this is the server's "invalid job" id (zero).
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl From<u64> for MoleQueueId {
    #[inline]
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for MoleQueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
