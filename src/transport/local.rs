//! Unix local socket transport.
//!
//! Each connection owns one OS thread, `molequeue-io`, running a
//! single-threaded tokio runtime. The thread handles:
//!
//! - Reading frames from the socket and handing them to the [`FrameSink`]
//! - Writing frames queued by caller threads, in queue order
//! - Flushing and closing the socket on shutdown
//!
//! Caller threads never touch the socket. [`Transport::send`] queues the
//! frame and blocks until the I/O thread reports the write result.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, trace, warn};

use crate::client::options::DEFAULT_CONNECT_TIMEOUT;
use crate::error::{Error, Result, duration_ms};

use super::frame::{self, DEFAULT_MAX_FRAME_SIZE};
use super::{Connector, Endpoint, FrameSink, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Name of the per-connection I/O thread.
pub const IO_THREAD_NAME: &str = "molequeue-io";

// ============================================================================
// TransportCommand
// ============================================================================

/// Commands for the I/O loop.
enum TransportCommand {
    /// Write a frame and report the result.
    Send {
        frame: Vec<u8>,
        ack: oneshot::Sender<Result<()>>,
    },
    /// Flush, close the socket and stop the loop.
    Shutdown,
}

// ============================================================================
// LocalSocketConnector
// ============================================================================

/// Opens [`Transport`]s over Unix local sockets.
#[derive(Debug, Clone)]
pub struct LocalSocketConnector {
    connect_timeout: Duration,
    max_frame_size: usize,
}

impl Default for LocalSocketConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_FRAME_SIZE)
    }
}

impl LocalSocketConnector {
    /// Creates a connector.
    #[inline]
    #[must_use]
    pub const fn new(connect_timeout: Duration, max_frame_size: usize) -> Self {
        Self {
            connect_timeout,
            max_frame_size,
        }
    }
}

impl Connector for LocalSocketConnector {
    fn connect(&self, endpoint: &Endpoint, sink: Arc<dyn FrameSink>) -> Result<Box<dyn Transport>> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        let io = IoLoop {
            path: endpoint.path().to_path_buf(),
            connect_timeout: self.connect_timeout,
            max_frame_size: self.max_frame_size,
            sink,
        };

        let io_thread = thread::Builder::new()
            .name(IO_THREAD_NAME.to_string())
            .spawn(move || io.run(command_rx, ready_tx))?;

        match ready_rx.blocking_recv() {
            Ok(Ok(())) => {
                info!(%endpoint, "Connected to local socket");
                let io_thread_id = io_thread.thread().id();
                Ok(Box::new(LocalSocketTransport {
                    command_tx,
                    io_thread: Mutex::new(Some(io_thread)),
                    io_thread_id,
                }))
            }
            Ok(Err(e)) => {
                let _ = io_thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = io_thread.join();
                Err(Error::connection("I/O thread exited during connect"))
            }
        }
    }
}

// ============================================================================
// LocalSocketTransport
// ============================================================================

/// Connected local socket.
struct LocalSocketTransport {
    /// Channel for sending commands to the I/O loop.
    command_tx: mpsc::UnboundedSender<TransportCommand>,
    /// I/O thread, taken on close.
    io_thread: Mutex<Option<JoinHandle<()>>>,
    /// Id of the I/O thread, to refuse blocking sends from callbacks.
    io_thread_id: ThreadId,
}

impl Transport for LocalSocketTransport {
    fn send(&self, frame: Vec<u8>) -> Result<()> {
        if thread::current().id() == self.io_thread_id {
            return Err(Error::protocol(
                "Blocking sends are not allowed from the I/O thread",
            ));
        }

        let (ack, ack_rx) = oneshot::channel();
        self.command_tx
            .send(TransportCommand::Send { frame, ack })
            .map_err(|_| Error::ConnectionClosed)?;

        ack_rx.blocking_recv().map_err(|_| Error::ConnectionClosed)?
    }

    fn close(&self) -> Result<()> {
        let Some(io_thread) = self.io_thread.lock().take() else {
            return Ok(());
        };

        // Queued after every pending send, so those are written first.
        let _ = self.command_tx.send(TransportCommand::Shutdown);

        if thread::current().id() == self.io_thread_id {
            // Closing from a callback: the loop stops once the callback returns.
            return Ok(());
        }

        io_thread
            .join()
            .map_err(|_| Error::connection("I/O thread panicked"))
    }
}

impl Drop for LocalSocketTransport {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// ============================================================================
// IoLoop
// ============================================================================

/// State moved onto the I/O thread.
struct IoLoop {
    path: PathBuf,
    connect_timeout: Duration,
    max_frame_size: usize,
    sink: Arc<dyn FrameSink>,
}

impl IoLoop {
    /// Thread entry point.
    fn run(
        self,
        command_rx: mpsc::UnboundedReceiver<TransportCommand>,
        ready_tx: oneshot::Sender<Result<()>>,
    ) {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(e) => {
                let _ = ready_tx.send(Err(e.into()));
                return;
            }
        };

        runtime.block_on(async move {
            let stream = match self.open().await {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            if ready_tx.send(Ok(())).is_err() {
                return;
            }

            self.run_event_loop(stream, command_rx).await;
        });
    }

    /// Opens the socket within the connect timeout.
    async fn open(&self) -> Result<UnixStream> {
        match timeout(self.connect_timeout, UnixStream::connect(&self.path)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(Error::connection(format!(
                "Cannot connect to {}: {e}",
                self.path.display()
            ))),
            Err(_) => Err(Error::connection_timeout(
                duration_ms(self.connect_timeout),
            )),
        }
    }

    /// Event loop that owns the socket.
    async fn run_event_loop(
        self,
        stream: UnixStream,
        mut command_rx: mpsc::UnboundedReceiver<TransportCommand>,
    ) {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = tokio::spawn(Self::read_frames(
            read_half,
            Arc::clone(&self.sink),
            self.max_frame_size,
        ));

        loop {
            tokio::select! {
                // Inbound frames are handled by the reader task; it only
                // finishes when the socket closes.
                result = &mut reader => {
                    match result {
                        Ok(Ok(())) => debug!("Local socket closed by server"),
                        Ok(Err(e)) => error!(error = %e, "Local socket read failed"),
                        Err(e) => error!(error = %e, "Reader task failed"),
                    }
                    break;
                }

                // Commands from caller threads
                command = command_rx.recv() => {
                    match command {
                        Some(TransportCommand::Send { frame, ack }) => {
                            Self::handle_send(&mut write_half, &frame, ack).await;
                        }

                        Some(TransportCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = write_half.flush().await;
                            let _ = write_half.shutdown().await;
                            reader.abort();
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            reader.abort();
                            break;
                        }
                    }
                }
            }
        }

        // Queued sends that never ran fail with ConnectionClosed once
        // command_rx drops.
        self.sink.on_closed();
        debug!("I/O loop terminated");
    }

    /// Reads frames until the socket closes.
    async fn read_frames(
        read_half: OwnedReadHalf,
        sink: Arc<dyn FrameSink>,
        max_frame_size: usize,
    ) -> Result<()> {
        let mut reader = BufReader::new(read_half);
        while let Some(payload) = frame::read_frame(&mut reader, max_frame_size).await? {
            sink.on_frame(payload);
        }
        Ok(())
    }

    /// Writes one frame and reports the result to the caller.
    async fn handle_send(
        write_half: &mut OwnedWriteHalf,
        payload: &[u8],
        ack: oneshot::Sender<Result<()>>,
    ) {
        let result = frame::write_frame(write_half, payload)
            .await
            .map_err(|e| Error::connection(format!("Send failed: {e}")));

        match &result {
            Ok(()) => trace!(len = payload.len(), "Frame sent"),
            Err(e) => warn!(error = %e, "Failed to send frame"),
        }

        let _ = ack.send(result);
    }
}
