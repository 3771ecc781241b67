//! MoleQueue client facade.
//!
//! A [`Client`] owns one connection: the transport, its I/O thread, the
//! pending request table and the notification dispatcher. Calls block the
//! calling thread; any number of threads may call concurrently.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use molequeue_client::{CallOutcome, Client};
//!
//! # fn example() -> molequeue_client::Result<()> {
//! let client = Client::connect("MoleQueue")?;
//!
//! client.on_job_state_changed(|change| {
//!     println!("job {} is now {}", change.mole_queue_id, change.new_state);
//! });
//!
//! match client.submit("TestQueue", "TestProgram", Duration::from_secs(5))? {
//!     CallOutcome::Completed(id) => println!("submitted job {id}"),
//!     CallOutcome::TimedOut => println!("no answer"),
//! }
//!
//! client.disconnect()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result, duration_ms};
use crate::identifiers::MoleQueueId;
use crate::protocol::{
    CancelJobResult, JobInfo, JobRequest, JobStateChange, Method, MoleQueueIdParams, Notification,
    QueueList, Request, SubmitJobResult,
};
use crate::rpc::{NotificationDispatcher, PacketIdGenerator, PendingRequestTable, ReceiveLoop};
use crate::transport::{Connector, Endpoint, Transport};

use super::builder::ClientBuilder;
use super::options::ClientOptions;
use super::outcome::CallOutcome;

// ============================================================================
// Client
// ============================================================================

/// A connection to a MoleQueue server.
///
/// Dropping the client disconnects it.
pub struct Client {
    /// Where the client is connected.
    endpoint: Endpoint,
    /// Limits and timeouts.
    options: ClientOptions,
    /// Outbound half of the connection.
    transport: Box<dyn Transport>,
    /// Correlation id source.
    packet_ids: PacketIdGenerator,
    /// Outstanding requests, shared with the receive loop.
    pending: Arc<PendingRequestTable>,
    /// Notification observers, shared with the receive loop.
    dispatcher: Arc<NotificationDispatcher>,
    /// Cleared by the first `disconnect`.
    connected: AtomicBool,
}

// ============================================================================
// Client - Display
// ============================================================================

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.endpoint)
            .field("connected", &self.is_connected())
            .field("pending", &self.pending_count())
            .field("callbacks", &self.dispatcher.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Connection
// ============================================================================

impl Client {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Connects to `endpoint` with default options.
    ///
    /// A bare name such as `"MoleQueue"` resolves to the server's socket in
    /// the temp directory; a path is used as is.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the endpoint name is blank
    /// - [`Error::Connection`] if the server is not listening
    /// - [`Error::ConnectionTimeout`] if the socket does not open in time
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous runtime.
    pub fn connect(endpoint: impl Into<String>) -> Result<Self> {
        Self::builder().endpoint(endpoint).connect()
    }

    /// Wires the correlation state to a freshly opened transport.
    pub(crate) fn open(
        endpoint: Endpoint,
        options: ClientOptions,
        connector: &dyn Connector,
    ) -> Result<Self> {
        let pending = Arc::new(PendingRequestTable::with_capacity(
            options.max_pending_requests,
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new());
        let receive = ReceiveLoop::new(Arc::clone(&pending), Arc::clone(&dispatcher));

        let transport = connector.connect(&endpoint, Arc::new(receive))?;
        info!(%endpoint, "Client connected");

        Ok(Self {
            endpoint,
            options,
            transport,
            packet_ids: PacketIdGenerator::new(),
            pending,
            dispatcher,
            connected: AtomicBool::new(true),
        })
    }

    /// Closes the connection.
    ///
    /// Queued sends are flushed, the I/O thread stops, and every caller
    /// still blocked in a call returns [`CallOutcome::TimedOut`]. Later calls
    /// fail with [`Error::ConnectionClosed`]. Calling this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the I/O thread did not shut down
    /// cleanly. The client is disconnected regardless.
    pub fn disconnect(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let result = self.transport.close();
        let abandoned = self.pending.close();
        info!(endpoint = %self.endpoint, abandoned, "Client disconnected");
        result
    }

    /// Returns `true` until the client disconnects or the server hangs up.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && !self.pending.is_closed()
    }

    /// The endpoint this client is connected to.
    #[inline]
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Timeout used by [`call_default`](Self::call_default).
    #[inline]
    #[must_use]
    pub fn default_timeout(&self) -> Duration {
        self.options.default_timeout
    }

    /// Number of requests still waiting for a reply.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

// ============================================================================
// Client - Calls
// ============================================================================

impl Client {
    /// Sends a request and blocks until its reply arrives or `timeout`
    /// elapses.
    ///
    /// Must not be called from a notification callback: replies are read by
    /// the thread running the callback.
    ///
    /// # Errors
    ///
    /// - [`Error::Remote`] if the server answered with an error object
    /// - [`Error::ConnectionClosed`] if the client is disconnected
    /// - [`Error::Connection`] if the request could not be written
    /// - [`Error::Protocol`] if too many requests are pending
    pub fn call(&self, method: &str, params: Value, timeout: Duration) -> Result<CallOutcome<Value>> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(Error::ConnectionClosed);
        }

        let id = self.packet_ids.next();
        let frame = Request::new(id, method, params).to_bytes()?;

        // Registered before sending so a fast reply finds its slot. The
        // pending cap is enforced under the same lock.
        self.pending.register(id)?;

        if let Err(e) = self.transport.send(frame) {
            self.pending.remove(id);
            warn!(%id, method, error = %e, "Request send failed");
            return Err(e);
        }
        debug!(%id, method, "Request sent");

        match self.pending.wait(id, timeout) {
            Some(reply) => {
                debug!(%id, method, error = reply.is_error(), "Reply received");
                reply.into_result().map(CallOutcome::Completed)
            }
            None => {
                debug!(%id, method, timeout_ms = duration_ms(timeout), "Request timed out");
                Ok(CallOutcome::TimedOut)
            }
        }
    }

    /// [`call`](Self::call) with the configured default timeout.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call).
    pub fn call_default(&self, method: &str, params: Value) -> Result<CallOutcome<Value>> {
        self.call(method, params, self.options.default_timeout)
    }

    /// Submits a job with only a queue and program set.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call), plus [`Error::Protocol`] if the result
    /// carries no job id.
    pub fn submit(
        &self,
        queue: &str,
        program: &str,
        timeout: Duration,
    ) -> Result<CallOutcome<MoleQueueId>> {
        let outcome = self.submit_job(&JobRequest::new(queue, program), timeout)?;
        Ok(outcome.map(|result| result.mole_queue_id))
    }

    /// Submits a fully described job.
    ///
    /// # Errors
    ///
    /// Same as [`submit`](Self::submit).
    pub fn submit_job(
        &self,
        request: &JobRequest,
        timeout: Duration,
    ) -> Result<CallOutcome<SubmitJobResult>> {
        self.call_typed(Method::SubmitJob, request, timeout)
    }

    /// Asks the server to cancel a job, returning the canceled job's id.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call); an unknown job is an [`Error::Remote`].
    pub fn cancel_job(&self, id: MoleQueueId, timeout: Duration) -> Result<CallOutcome<MoleQueueId>> {
        let params = MoleQueueIdParams { mole_queue_id: id };
        let outcome: CallOutcome<CancelJobResult> =
            self.call_typed(Method::CancelJob, &params, timeout)?;
        Ok(outcome.map(CancelJobResult::mole_queue_id))
    }

    /// Fetches the server's record of a job.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call); an unknown job is an [`Error::Remote`].
    pub fn lookup_job(&self, id: MoleQueueId, timeout: Duration) -> Result<CallOutcome<JobInfo>> {
        let params = MoleQueueIdParams { mole_queue_id: id };
        self.call_typed(Method::LookupJob, &params, timeout)
    }

    /// Lists the server's queues and the programs each one runs.
    ///
    /// # Errors
    ///
    /// Same as [`call`](Self::call).
    pub fn list_queues(&self, timeout: Duration) -> Result<CallOutcome<QueueList>> {
        self.call_typed(Method::ListQueues, &Value::Null, timeout)
    }

    /// Serializes `params`, calls `method` and decodes the result as `R`.
    fn call_typed<P, R>(&self, method: Method, params: &P, timeout: Duration) -> Result<CallOutcome<R>>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)?;
        self.call(method.as_str(), params, timeout)?
            .try_map(|result| {
                serde_json::from_value(result)
                    .map_err(|e| Error::protocol(format!("Unexpected {method} result: {e}")))
            })
    }
}

// ============================================================================
// Client - Notifications
// ============================================================================

impl Client {
    /// Registers a callback for every notification.
    ///
    /// Callbacks run on the I/O thread in registration order. Registering
    /// the same callback twice delivers each notification to it twice.
    pub fn register_notification<F>(&self, callback: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.dispatcher.register(Arc::new(callback));
    }

    /// Registers a callback for notifications named `method`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCallback`] if `method` cannot name a
    /// notification.
    pub fn register_notification_for<F>(&self, method: &str, callback: F) -> Result<()>
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.dispatcher.register_for_method(method, Arc::new(callback))
    }

    /// Registers a typed callback for `jobStateChanged` notifications.
    ///
    /// Notifications whose params do not decode are logged and skipped.
    pub fn on_job_state_changed<F>(&self, callback: F)
    where
        F: Fn(JobStateChange) + Send + Sync + 'static,
    {
        let method = Method::JobStateChanged.as_str();
        self.dispatcher
            .register(Arc::new(move |notification: &Notification| {
                if notification.method != method {
                    return;
                }
                match notification.parse_params::<JobStateChange>() {
                    Ok(change) => callback(change),
                    Err(e) => warn!(error = %e, "Ignoring jobStateChanged notification"),
                }
            }));
    }
}

// ============================================================================
// Drop
// ============================================================================

impl Drop for Client {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

// ============================================================================
// Tests
// ============================================================================
