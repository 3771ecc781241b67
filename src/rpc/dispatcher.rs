//! Notification fan-out.
//!
//! Every notification is handed to every registered callback, in
//! registration order, synchronously on the I/O thread. A slow callback
//! therefore delays every frame behind it. Callbacks must not issue blocking
//! calls on the same client: the reply could only arrive through the thread
//! they are blocking.

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{error, trace};

use crate::error::{Error, Result};
use crate::protocol::Notification;

// ============================================================================
// Types
// ============================================================================

/// Notification callback type.
///
/// Registering the same callback twice delivers each notification to it
/// twice.
pub type NotificationCallback = Arc<dyn Fn(&Notification) + Send + Sync>;

// ============================================================================
// NotificationDispatcher
// ============================================================================

/// Ordered list of notification observers.
#[derive(Default)]
pub struct NotificationDispatcher {
    callbacks: RwLock<Vec<NotificationCallback>>,
}

impl NotificationDispatcher {
    /// Creates a dispatcher with no callbacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a callback that receives every notification.
    pub fn register(&self, callback: NotificationCallback) {
        self.callbacks.write().push(callback);
    }

    /// Appends a callback that only receives notifications named `method`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCallback`] if `method` is empty or contains
    /// whitespace, since no notification could ever match it.
    pub fn register_for_method(
        &self,
        method: impl Into<String>,
        callback: NotificationCallback,
    ) -> Result<()> {
        let method = method.into();
        if method.is_empty() {
            return Err(Error::invalid_callback("method filter is empty"));
        }
        if method.chars().any(char::is_whitespace) {
            return Err(Error::invalid_callback(format!(
                "method filter {method:?} contains whitespace"
            )));
        }

        self.register(Arc::new(move |notification: &Notification| {
            if notification.method == method {
                callback(notification);
            }
        }));
        Ok(())
    }

    /// Delivers `notification` to every callback in registration order.
    ///
    /// A panicking callback is logged and skipped; the remaining callbacks
    /// still run. Returns the number of callbacks that returned normally.
    pub fn dispatch(&self, notification: &Notification) -> usize {
        // Snapshot so a callback may register further callbacks.
        let callbacks = self.callbacks.read().clone();
        let mut delivered = 0;

        for (index, callback) in callbacks.iter().enumerate() {
            match catch_unwind(AssertUnwindSafe(|| callback(notification))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    error!(
                        index,
                        method = %notification.method,
                        panic = panic_message(panic.as_ref()),
                        "Notification callback panicked"
                    );
                }
            }
        }

        trace!(method = %notification.method, delivered, "Notification dispatched");
        delivered
    }

    /// Number of registered callbacks.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.callbacks.read().len()
    }

    /// Returns `true` if no callback is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("callbacks", &self.len())
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

// ============================================================================
// Tests
// ============================================================================
