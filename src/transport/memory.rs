//! In-process transport.
//!
//! [`memory_pair`] returns a [`MemoryConnector`] for the client and a
//! [`MemoryPeer`] that plays the server: it reads what the client sent and
//! injects inbound frames. Injection runs the client's receive path
//! synchronously on the injecting thread, which makes ordering in tests
//! deterministic.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use molequeue_client::{Client, memory_pair};
//! use serde_json::json;
//!
//! # fn main() -> molequeue_client::Result<()> {
//! let (connector, peer) = memory_pair();
//! let client = Client::builder().connector(connector).connect()?;
//!
//! let server = std::thread::spawn(move || {
//!     let request = peer.recv_request(Duration::from_secs(5)).unwrap().unwrap();
//!     peer.reply(request.id, json!({"moleQueueId": 42}));
//! });
//!
//! let outcome = client.submit("TestQueue", "TestProgram", Duration::from_secs(5))?;
//! assert_eq!(outcome.completed().map(|id| id.get()), Some(42));
//! server.join().unwrap();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Error, Result};
use crate::identifiers::PacketId;
use crate::protocol::{JSONRPC_VERSION, Request, RpcError};

use super::{Connector, Endpoint, FrameSink, Transport};

// ============================================================================
// Shared State
// ============================================================================

#[derive(Default)]
struct Outbound {
    frames: VecDeque<Vec<u8>>,
    closed: bool,
    fail_sends: bool,
}

#[derive(Default)]
struct Shared {
    sink: Mutex<Option<Arc<dyn FrameSink>>>,
    outbound: Mutex<Outbound>,
    frame_sent: Condvar,
}

impl Shared {
    fn sink(&self) -> Option<Arc<dyn FrameSink>> {
        self.sink.lock().clone()
    }

    /// Marks the channel closed and notifies the client side once.
    fn shut(&self) {
        {
            let mut outbound = self.outbound.lock();
            if outbound.closed {
                return;
            }
            outbound.closed = true;
        }
        self.frame_sent.notify_all();

        if let Some(sink) = self.sink.lock().take() {
            sink.on_closed();
        }
    }
}

/// Creates a connected connector/peer pair.
#[must_use]
pub fn memory_pair() -> (MemoryConnector, MemoryPeer) {
    let shared = Arc::new(Shared::default());
    (
        MemoryConnector {
            shared: Arc::clone(&shared),
        },
        MemoryPeer { shared },
    )
}

// ============================================================================
// MemoryConnector
// ============================================================================

/// Client half of an in-process channel.
///
/// Can be connected once; later connects fail.
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

impl Connector for MemoryConnector {
    fn connect(&self, endpoint: &Endpoint, sink: Arc<dyn FrameSink>) -> Result<Box<dyn Transport>> {
        if self.shared.outbound.lock().closed {
            return Err(Error::connection("In-memory channel is closed"));
        }

        let mut slot = self.shared.sink.lock();
        if slot.is_some() {
            return Err(Error::connection("In-memory channel is already connected"));
        }
        *slot = Some(sink);

        debug!(%endpoint, "Connected in-memory transport");
        Ok(Box::new(MemoryTransport {
            shared: Arc::clone(&self.shared),
        }))
    }
}

// ============================================================================
// MemoryTransport
// ============================================================================

struct MemoryTransport {
    shared: Arc<Shared>,
}

impl Transport for MemoryTransport {
    fn send(&self, frame: Vec<u8>) -> Result<()> {
        let mut outbound = self.shared.outbound.lock();
        if outbound.closed {
            return Err(Error::ConnectionClosed);
        }
        if outbound.fail_sends {
            return Err(Error::connection("Send failed: injected failure"));
        }

        outbound.frames.push_back(frame);
        drop(outbound);
        self.shared.frame_sent.notify_all();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.shared.shut();
        Ok(())
    }
}

// ============================================================================
// MemoryPeer
// ============================================================================

/// Server half of an in-process channel.
pub struct MemoryPeer {
    shared: Arc<Shared>,
}

impl MemoryPeer {
    /// Waits up to `timeout` for the next frame the client sent.
    ///
    /// Returns `None` on timeout, or once the channel is closed and drained.
    pub fn recv(&self, timeout: Duration) -> Option<Vec<u8>> {
        let deadline = Instant::now() + timeout;
        let mut outbound = self.shared.outbound.lock();

        loop {
            if let Some(frame) = outbound.frames.pop_front() {
                return Some(frame);
            }
            if outbound.closed {
                return None;
            }
            if self
                .shared
                .frame_sent
                .wait_until(&mut outbound, deadline)
                .timed_out()
            {
                return outbound.frames.pop_front();
            }
        }
    }

    /// Waits for the next frame and decodes it as a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the frame is not a request envelope.
    pub fn recv_request(&self, timeout: Duration) -> Result<Option<Request>> {
        self.recv(timeout)
            .map(|frame| serde_json::from_slice(&frame).map_err(Error::from))
            .transpose()
    }

    /// Delivers one raw inbound frame to the client, on this thread.
    ///
    /// Returns `false` if the client is not connected.
    pub fn inject(&self, frame: impl Into<Vec<u8>>) -> bool {
        match self.shared.sink() {
            Some(sink) => {
                sink.on_frame(frame.into());
                true
            }
            None => false,
        }
    }

    /// Delivers a JSON value as one inbound frame.
    pub fn inject_json(&self, value: &Value) -> bool {
        self.inject(value.to_string())
    }

    /// Sends a success reply for `id`.
    pub fn reply(&self, id: PacketId, result: Value) -> bool {
        self.inject_json(&json!({"jsonrpc": JSONRPC_VERSION, "id": id, "result": result}))
    }

    /// Sends an error reply for `id`.
    pub fn reply_error(&self, id: PacketId, error: RpcError) -> bool {
        self.inject_json(&json!({"jsonrpc": JSONRPC_VERSION, "id": id, "error": error}))
    }

    /// Sends a notification.
    pub fn notify(&self, method: &str, params: Value) -> bool {
        self.inject_json(&json!({"jsonrpc": JSONRPC_VERSION, "method": method, "params": params}))
    }

    /// Makes every following client send fail with a transport error.
    pub fn fail_sends(&self, fail: bool) {
        self.shared.outbound.lock().fail_sends = fail;
    }

    /// Closes the channel from the server side.
    pub fn hang_up(&self) {
        self.shared.shut();
    }

    /// Returns `true` once either side closed the channel.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.outbound.lock().closed
    }
}

// ============================================================================
// Tests
// ============================================================================
