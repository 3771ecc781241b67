//! Inbound frame routing.
//!
//! Runs on the transport's I/O thread. Each frame is classified once and
//! either fills a pending slot or goes to the notification dispatcher.
//! Undecodable frames are logged and dropped; they never stop the loop.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::protocol::Inbound;
use crate::transport::FrameSink;

use super::dispatcher::NotificationDispatcher;
use super::pending::PendingRequestTable;

// ============================================================================
// ReceiveLoop
// ============================================================================

/// Routes inbound frames to the pending table or the dispatcher.
#[derive(Debug, Clone)]
pub struct ReceiveLoop {
    pending: Arc<PendingRequestTable>,
    dispatcher: Arc<NotificationDispatcher>,
}

impl ReceiveLoop {
    /// Creates a loop over shared state.
    #[must_use]
    pub fn new(pending: Arc<PendingRequestTable>, dispatcher: Arc<NotificationDispatcher>) -> Self {
        Self {
            pending,
            dispatcher,
        }
    }

    /// Handles one inbound frame.
    pub fn handle_frame(&self, frame: &[u8]) {
        match Inbound::decode(frame) {
            Ok(Inbound::Reply(reply)) => {
                let id = reply.id;
                if self.pending.fill(id, reply) {
                    trace!(%id, "Reply routed");
                }
            }

            Ok(Inbound::Notification(notification)) => {
                trace!(method = %notification.method, "Notification received");
                self.dispatcher.dispatch(&notification);
            }

            Err(e) => {
                warn!(error = %e, len = frame.len(), "Dropping inbound frame");
            }
        }
    }
}

impl FrameSink for ReceiveLoop {
    fn on_frame(&self, frame: Vec<u8>) {
        self.handle_frame(&frame);
    }

    fn on_closed(&self) {
        let abandoned = self.pending.close();
        debug!(abandoned, "Channel closed");
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use parking_lot::Mutex;
    use serde_json::json;

    use crate::identifiers::PacketId;
    use crate::protocol::{Notification, Reply};

    fn id(value: u64) -> PacketId {
        PacketId::new(value).expect("valid packet id")
    }

    fn setup() -> (ReceiveLoop, Arc<PendingRequestTable>, Arc<Mutex<Vec<Notification>>>) {
        let pending = Arc::new(PendingRequestTable::new());
        let dispatcher = Arc::new(NotificationDispatcher::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            dispatcher.register(Arc::new(move |n: &Notification| seen.lock().push(n.clone())));
        }
        (
            ReceiveLoop::new(Arc::clone(&pending), dispatcher),
            pending,
            seen,
        )
    }

    #[test]
    fn test_reply_fills_pending_slot() {
        let (receive, pending, seen) = setup();
        pending.register(id(1)).expect("register");

        receive.handle_frame(br#"{"jsonrpc":"2.0","id":1,"result":{"moleQueueId":42}}"#);

        let reply = pending.wait(id(1), Duration::from_millis(10)).expect("reply");
        assert_eq!(reply, Reply::result(id(1), json!({"moleQueueId": 42})));
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_notification_is_dispatched() {
        let (receive, pending, seen) = setup();

        receive.handle_frame(
            br#"{"jsonrpc":"2.0","method":"jobStateChanged","params":{"moleQueueId":42}}"#,
        );

        assert_eq!(
            *seen.lock(),
            vec![Notification::new("jobStateChanged", json!({"moleQueueId": 42}))]
        );
        assert!(pending.is_empty());
    }

    #[test]
    fn test_malformed_frames_are_dropped() {
        let (receive, pending, seen) = setup();
        pending.register(id(1)).expect("register");

        receive.handle_frame(b"not json");
        receive.handle_frame(br#"{"id":1}"#);
        receive.handle_frame(br#"{"jsonrpc":"2.0","method":"jobStateChanged"}"#);

        // The loop keeps going: one notification got through, the slot is
        // still empty.
        assert_eq!(seen.lock().len(), 1);
        assert!(pending.wait(id(1), Duration::from_millis(10)).is_none());
    }

    #[test]
    fn test_reply_for_unknown_id_is_dropped() {
        let (receive, pending, seen) = setup();
        receive.handle_frame(br#"{"jsonrpc":"2.0","id":77,"result":null}"#);
        assert!(pending.is_empty());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_on_closed_closes_table() {
        let (receive, pending, _) = setup();
        pending.register(id(1)).expect("register");

        receive.on_closed();

        assert!(pending.is_closed());
        assert!(pending.is_empty());
    }
}
