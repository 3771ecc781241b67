//! Result of a completed wait.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result, duration_ms};
use crate::identifiers::PacketId;

// ============================================================================
// CallOutcome
// ============================================================================

/// How a call ended when it did not fail.
///
/// Running out of time is an expected outcome of a bounded wait, not an
/// error. Transport failures and error replies are reported through
/// [`Result`] instead.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum CallOutcome<T> {
    /// The server replied with a result.
    Completed(T),
    /// No reply arrived before the timeout, or the client disconnected
    /// while waiting.
    TimedOut,
}

impl<T> CallOutcome<T> {
    /// Returns `true` if the call timed out.
    #[inline]
    #[must_use]
    pub const fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut)
    }

    /// Returns `true` if the call completed.
    #[inline]
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    /// Returns the result, or `None` on timeout.
    #[inline]
    #[must_use]
    pub fn completed(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::TimedOut => None,
        }
    }

    /// Maps the completed value.
    #[inline]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CallOutcome<U> {
        match self {
            Self::Completed(value) => CallOutcome::Completed(f(value)),
            Self::TimedOut => CallOutcome::TimedOut,
        }
    }

    /// Maps the completed value with a fallible function.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`.
    #[inline]
    pub fn try_map<U>(self, f: impl FnOnce(T) -> Result<U>) -> Result<CallOutcome<U>> {
        match self {
            Self::Completed(value) => f(value).map(CallOutcome::Completed),
            Self::TimedOut => Ok(CallOutcome::TimedOut),
        }
    }

    /// Converts a timeout into [`Error::RequestTimeout`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestTimeout`] if the call timed out.
    pub fn into_result(self, request_id: PacketId, timeout: Duration) -> Result<T> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::TimedOut => Err(Error::request_timeout(
                request_id,
                duration_ms(timeout),
            )),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed() {
        let outcome = CallOutcome::Completed(42);
        assert!(outcome.is_completed());
        assert!(!outcome.is_timed_out());
        assert_eq!(outcome.map(|v| v + 1).completed(), Some(43));
    }

    #[test]
    fn test_timed_out() {
        let outcome: CallOutcome<i32> = CallOutcome::TimedOut;
        assert!(outcome.is_timed_out());
        assert_eq!(outcome.clone().completed(), None);
        assert_eq!(outcome.map(|v| v + 1), CallOutcome::TimedOut);
    }

    #[test]
    fn test_try_map() {
        let ok = CallOutcome::Completed("7").try_map(|s| {
            s.parse::<u32>()
                .map_err(|e| Error::protocol(e.to_string()))
        });
        assert_eq!(ok.expect("parse"), CallOutcome::Completed(7));

        let err = CallOutcome::Completed("x").try_map(|s| {
            s.parse::<u32>()
                .map_err(|e| Error::protocol(e.to_string()))
        });
        assert!(matches!(err, Err(Error::Protocol { .. })));

        let timed_out: CallOutcome<&str> = CallOutcome::TimedOut;
        let mapped = timed_out.try_map(|_| -> Result<u32> { Err(Error::protocol("unreachable")) });
        assert_eq!(mapped.expect("timed out"), CallOutcome::TimedOut);
    }

    #[test]
    fn test_into_result() {
        let id = PacketId::new(5).expect("valid packet id");
        let timeout = Duration::from_millis(1500);

        assert_eq!(CallOutcome::Completed(1).into_result(id, timeout).expect("ok"), 1);

        let err = CallOutcome::<i32>::TimedOut
            .into_result(id, timeout)
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Request 5 timed out after 1500ms");
    }

    #[test]
    fn test_into_result_saturates_huge_timeout() {
        let id = PacketId::new(9).expect("valid packet id");
        let err = CallOutcome::<()>::TimedOut
            .into_result(id, Duration::MAX)
            .unwrap_err();
        assert!(err.to_string().contains(&u64::MAX.to_string()));
    }
}
