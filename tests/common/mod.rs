//! Shared utilities for integration tests.
//!
//! Provides a scripted MoleQueue server listening on a Unix socket in a
//! temporary directory, plus logging initialization.

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use std::os::unix::net::UnixListener as StdUnixListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use molequeue_client::PacketId;
use molequeue_client::protocol::{JSONRPC_VERSION, Request};
use molequeue_client::transport::frame::{DEFAULT_MAX_FRAME_SIZE, read_frame, write_frame};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixListener;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Logging
// ============================================================================

/// Initialize tracing/logging once per test binary.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("molequeue_client=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Actions
// ============================================================================

/// What the fake server does in response to one request.
#[derive(Debug, Clone)]
pub enum Action {
    /// Writes one frame.
    Send(Value),
    /// Writes bytes as-is, without framing.
    Raw(Vec<u8>),
    /// Closes the connection.
    HangUp,
}

/// A success reply.
pub fn reply(id: PacketId, result: Value) -> Action {
    Action::Send(json!({"jsonrpc": JSONRPC_VERSION, "id": id, "result": result}))
}

/// An error reply.
pub fn error_reply(id: PacketId, code: i64, message: &str) -> Action {
    Action::Send(json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": {"code": code, "message": message}
    }))
}

/// A notification.
pub fn notification(method: &str, params: Value) -> Action {
    Action::Send(json!({"jsonrpc": JSONRPC_VERSION, "method": method, "params": params}))
}

// ============================================================================
// FakeServer
// ============================================================================

/// Scripted server accepting a single client connection.
pub struct FakeServer {
    /// Owns the socket directory.
    _dir: TempDir,
    /// Socket path.
    path: PathBuf,
    /// Every request received, in arrival order.
    requests: Arc<Mutex<Vec<Request>>>,
    /// Server thread.
    thread: Option<JoinHandle<()>>,
}

impl FakeServer {
    /// Starts a server that answers each request with `handler`.
    pub fn spawn<H>(handler: H) -> Self
    where
        H: FnMut(&Request) -> Vec<Action> + Send + 'static,
    {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("MoleQueue");

        // Bound before returning so the client never races the listener.
        let listener = StdUnixListener::bind(&path).expect("bind socket");
        listener.set_nonblocking(true).expect("non-blocking listener");

        let requests = Arc::new(Mutex::new(Vec::new()));
        let thread = {
            let requests = Arc::clone(&requests);
            thread::Builder::new()
                .name("fake-molequeue".to_string())
                .spawn(move || serve(listener, handler, requests))
                .expect("spawn server thread")
        };

        Self {
            _dir: dir,
            path,
            requests,
            thread: Some(thread),
        }
    }

    /// Socket path to connect to.
    pub fn endpoint(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    /// Waits for the server to finish; the client must have disconnected.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            thread.join().expect("server thread panicked");
        }
    }
}

fn serve<H>(listener: StdUnixListener, mut handler: H, requests: Arc<Mutex<Vec<Request>>>)
where
    H: FnMut(&Request) -> Vec<Action>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("server runtime");

    runtime.block_on(async move {
        let listener = UnixListener::from_std(listener).expect("tokio listener");
        let (stream, _) = listener.accept().await.expect("accept");
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);

        while let Ok(Some(frame)) = read_frame(&mut reader, DEFAULT_MAX_FRAME_SIZE).await {
            let request: Request = serde_json::from_slice(&frame).expect("request envelope");
            requests.lock().push(request.clone());

            for action in handler(&request) {
                match action {
                    Action::Send(value) => {
                        let payload = value.to_string();
                        if write_frame(&mut write_half, payload.as_bytes()).await.is_err() {
                            return;
                        }
                    }
                    Action::Raw(bytes) => {
                        if write_half.write_all(&bytes).await.is_err() {
                            return;
                        }
                    }
                    Action::HangUp => return,
                }
            }
        }
    });
}
