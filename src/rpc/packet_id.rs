//! Packet id assignment.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;

use crate::identifiers::PacketId;

// ============================================================================
// PacketIdGenerator
// ============================================================================

/// Issues correlation ids for one connection: 1, 2, 3, …
///
/// Safe to share between caller threads; no id is ever issued twice.
#[derive(Debug)]
pub struct PacketIdGenerator {
    next: Mutex<PacketId>,
}

impl PacketIdGenerator {
    /// Creates a generator whose first id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next: Mutex::new(PacketId::first()),
        }
    }

    /// Returns the next id.
    pub fn next(&self) -> PacketId {
        let mut next = self.next.lock();
        let id = *next;
        *next = id.successor();
        id
    }
}

impl Default for PacketIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
