//! Pending request table.
//!
//! The hand-off point between caller threads and the I/O thread. A caller
//! registers an empty slot before sending, then blocks in [`wait`]; the I/O
//! thread fills the slot from the receive loop and wakes every waiter.
//!
//! One mutex guards all slots and one condition variable is shared by every
//! id. A fill therefore broadcasts, and each woken waiter re-checks only its
//! own slot. The cost is a wakeup storm proportional to the number of
//! concurrent waiters.
//!
//! # Timeout race
//!
//! A waiter that times out removes its slot under the lock. A reply filled
//! before that point is still returned; a reply arriving after it finds no
//! slot and is dropped.
//!
//! [`wait`]: PendingRequestTable::wait

// ============================================================================
// Imports
// ============================================================================

use std::collections::hash_map::Entry;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::PacketId;
use crate::protocol::Reply;

// ============================================================================
// Types
// ============================================================================

/// Slots keyed by packet id; `None` until the reply arrives.
type SlotMap = FxHashMap<PacketId, Option<Reply>>;

#[derive(Debug, Default)]
struct TableState {
    slots: SlotMap,
    closed: bool,
}

// ============================================================================
// PendingRequestTable
// ============================================================================

/// Correlation table between outstanding requests and their replies.
#[derive(Debug)]
pub struct PendingRequestTable {
    state: Mutex<TableState>,
    reply_ready: Condvar,
    /// Most slots held at once.
    capacity: usize,
}

impl Default for PendingRequestTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingRequestTable {
    /// Creates an empty, open table with no limit on outstanding requests.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    /// Creates an empty, open table holding at most `capacity` slots.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(TableState::default()),
            reply_ready: Condvar::new(),
            capacity,
        }
    }

    /// Returns the most slots the table holds at once.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Inserts an empty slot for `id`.
    ///
    /// Must be called before the request is sent so that a fast reply always
    /// finds its slot.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if the table has been closed
    /// - [`Error::Protocol`] if `id` is already pending or the table is full
    pub fn register(&self, id: PacketId) -> Result<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::ConnectionClosed);
        }

        let pending = state.slots.len();
        if pending >= self.capacity {
            warn!(%id, pending, max = self.capacity, "Too many pending requests");
            return Err(Error::protocol(format!(
                "Too many pending requests: {pending}/{}",
                self.capacity
            )));
        }

        match state.slots.entry(id) {
            Entry::Occupied(_) => Err(Error::protocol(format!(
                "Packet id {id} is already pending"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(None);
                Ok(())
            }
        }
    }

    /// Stores the reply for `id` and wakes all waiters.
    ///
    /// Returns `false` and drops the reply if `id` is not pending (the waiter
    /// timed out or never existed) or was already filled.
    pub fn fill(&self, id: PacketId, reply: Reply) -> bool {
        let mut state = self.state.lock();

        match state.slots.get_mut(&id) {
            Some(slot) if slot.is_none() => {
                *slot = Some(reply);
                drop(state);
                self.reply_ready.notify_all();
                trace!(%id, "Reply stored");
                true
            }
            Some(_) => {
                warn!(%id, "Duplicate reply dropped");
                false
            }
            None => {
                debug!(%id, "Reply for unknown or abandoned request dropped");
                false
            }
        }
    }

    /// Blocks until the reply for `id` arrives or `timeout` elapses.
    ///
    /// The slot is removed on every return path. Returns `None` on timeout,
    /// when the table is closed while waiting, or when `id` was never
    /// registered.
    pub fn wait(&self, id: PacketId, timeout: Duration) -> Option<Reply> {
        let deadline = Instant::now().checked_add(timeout);
        let mut state = self.state.lock();

        loop {
            match state.slots.get(&id) {
                Some(Some(_)) => return state.slots.remove(&id).flatten(),
                Some(None) => {}
                None => return None,
            }

            if state.closed {
                state.slots.remove(&id);
                return None;
            }

            match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        state.slots.remove(&id);
                        trace!(%id, "Wait timed out");
                        return None;
                    }
                    // Wakes for other ids or spurious wakes loop back to the
                    // slot check with a recomputed remaining time.
                    let _ = self.reply_ready.wait_for(&mut state, remaining);
                }
                None => self.reply_ready.wait(&mut state),
            }
        }
    }

    /// Removes the slot for `id` without waiting.
    ///
    /// Used when sending fails after registration.
    pub fn remove(&self, id: PacketId) -> bool {
        self.state.lock().slots.remove(&id).is_some()
    }

    /// Closes the table.
    ///
    /// Drops every slot, wakes every waiter (they return `None`), and makes
    /// later [`register`](Self::register) calls fail. Returns the number of
    /// requests that were still outstanding.
    pub fn close(&self) -> usize {
        let mut state = self.state.lock();
        if state.closed {
            return 0;
        }
        state.closed = true;
        let outstanding = state.slots.len();
        state.slots.clear();
        drop(state);

        self.reply_ready.notify_all();
        if outstanding > 0 {
            debug!(outstanding, "Abandoned pending requests on close");
        }
        outstanding
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of outstanding requests.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().slots.len()
    }

    /// Returns `true` if no request is outstanding.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Barrier};
    use std::thread;

    use serde_json::json;

    fn id(value: u64) -> PacketId {
        PacketId::new(value).expect("valid packet id")
    }

    #[test]
    fn test_fill_then_wait() {
        let table = PendingRequestTable::new();
        table.register(id(1)).expect("register");
        assert!(table.fill(id(1), Reply::result(id(1), json!(42))));

        let reply = table.wait(id(1), Duration::from_secs(1)).expect("reply");
        assert_eq!(reply, Reply::result(id(1), json!(42)));
        assert!(table.is_empty());
    }

    #[test]
    fn test_duplicate_register_rejected() {
        let table = PendingRequestTable::new();
        table.register(id(1)).expect("register");
        assert!(matches!(
            table.register(id(1)),
            Err(Error::Protocol { .. })
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_fill_unknown_id_is_dropped() {
        let table = PendingRequestTable::new();
        assert!(!table.fill(id(9), Reply::result(id(9), json!(null))));
        assert!(table.is_empty());
    }

    #[test]
    fn test_second_fill_is_dropped() {
        let table = PendingRequestTable::new();
        table.register(id(1)).expect("register");
        assert!(table.fill(id(1), Reply::result(id(1), json!("first"))));
        assert!(!table.fill(id(1), Reply::result(id(1), json!("second"))));

        let reply = table.wait(id(1), Duration::from_millis(10)).expect("reply");
        assert_eq!(reply.into_result().expect("result"), json!("first"));
    }

    #[test]
    fn test_wait_times_out_and_removes_slot() {
        let table = PendingRequestTable::new();
        table.register(id(1)).expect("register");

        let timeout = Duration::from_millis(150);
        let start = Instant::now();
        assert!(table.wait(id(1), timeout).is_none());
        let elapsed = start.elapsed();

        assert!(elapsed >= timeout, "returned early after {elapsed:?}");
        assert!(elapsed < timeout + Duration::from_secs(1));
        assert!(table.is_empty());

        // Late reply after the abandon is dropped.
        assert!(!table.fill(id(1), Reply::result(id(1), json!(1))));
        assert!(table.is_empty());
    }

    #[test]
    fn test_timeout_honored_despite_unrelated_wakes() {
        let table = Arc::new(PendingRequestTable::new());
        table.register(id(1)).expect("register");

        let noise = {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                for n in 2..40 {
                    let other = id(n);
                    table.register(other).expect("register");
                    table.fill(other, Reply::result(other, json!(n)));
                    thread::sleep(Duration::from_millis(5));
                }
            })
        };

        let timeout = Duration::from_millis(200);
        let start = Instant::now();
        assert!(table.wait(id(1), timeout).is_none());
        let elapsed = start.elapsed();
        noise.join().expect("noise thread");

        assert!(elapsed >= timeout, "returned early after {elapsed:?}");
        assert!(elapsed < timeout + Duration::from_secs(1));
    }

    #[test]
    fn test_waiters_get_only_their_reply() {
        let table = Arc::new(PendingRequestTable::new());
        let ids: Vec<_> = (1..=16).map(id).collect();
        for &id in &ids {
            table.register(id).expect("register");
        }

        let waiters: Vec<_> = ids
            .iter()
            .map(|&id| {
                let table = Arc::clone(&table);
                thread::spawn(move || (id, table.wait(id, Duration::from_secs(5))))
            })
            .collect();

        // Fill in reverse order.
        for &id in ids.iter().rev() {
            assert!(table.fill(id, Reply::result(id, json!(id.get()))));
        }

        for waiter in waiters {
            let (id, reply) = waiter.join().expect("waiter panicked");
            let reply = reply.expect("reply");
            assert_eq!(reply.id, id);
            assert_eq!(reply.into_result().expect("result"), json!(id.get()));
        }
        assert!(table.is_empty());
    }

    #[test]
    fn test_close_wakes_waiters() {
        let table = Arc::new(PendingRequestTable::new());
        table.register(id(1)).expect("register");

        let waiter = {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                let start = Instant::now();
                let reply = table.wait(id(1), Duration::from_secs(30));
                (reply, start.elapsed())
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert_eq!(table.close(), 1);

        let (reply, elapsed) = waiter.join().expect("waiter panicked");
        assert!(reply.is_none());
        assert!(elapsed < Duration::from_secs(5));

        assert!(table.is_closed());
        assert!(matches!(table.register(id(2)), Err(Error::ConnectionClosed)));
        assert_eq!(table.close(), 0);
    }

    #[test]
    fn test_wait_unregistered_returns_immediately() {
        let table = PendingRequestTable::new();
        let start = Instant::now();
        assert!(table.wait(id(5), Duration::from_secs(10)).is_none());
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_remove() {
        let table = PendingRequestTable::new();
        table.register(id(1)).expect("register");
        assert!(table.remove(id(1)));
        assert!(!table.remove(id(1)));
    }

    #[test]
    fn test_capacity_enforced_under_concurrency() {
        const CAPACITY: usize = 4;
        const THREADS: u64 = 16;

        let table = Arc::new(PendingRequestTable::with_capacity(CAPACITY));
        let barrier = Arc::new(Barrier::new(THREADS as usize));

        let handles: Vec<_> = (1..=THREADS)
            .map(|n| {
                let table = Arc::clone(&table);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    table.register(id(n)).is_ok()
                })
            })
            .collect();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().expect("register thread"))
            .filter(|ok| *ok)
            .count();

        assert_eq!(accepted, CAPACITY);
        assert_eq!(table.len(), CAPACITY);
    }

    #[test]
    fn test_full_table_accepts_after_removal() {
        let table = PendingRequestTable::with_capacity(1);
        table.register(id(1)).expect("register");

        let err = table.register(id(2)).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
        assert!(err.to_string().contains("1/1"));

        assert!(table.remove(id(1)));
        table.register(id(2)).expect("register after removal");
    }
}
