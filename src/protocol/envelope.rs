//! JSON-RPC 2.0 envelopes.
//!
//! Defines the outbound [`Request`] and the two inbound shapes the receive
//! loop distinguishes: a [`Reply`] (carries an `id`) and a [`Notification`]
//! (no `id`, carries a `method`).
//!
//! # Format
//!
//! ```json
//! {"jsonrpc":"2.0","id":1,"method":"submitJob","params":{...}}
//! {"jsonrpc":"2.0","id":1,"result":{...}}
//! {"jsonrpc":"2.0","id":1,"error":{"code":7,"message":"bad queue"}}
//! {"jsonrpc":"2.0","method":"jobStateChanged","params":{...}}
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::PacketId;

// ============================================================================
// Constants
// ============================================================================

/// Value of the `jsonrpc` member on every envelope.
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC error codes.
pub mod error_code {
    /// Invalid JSON was received by the server.
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i64 = -32603;
}

// ============================================================================
// Request
// ============================================================================

/// A method call from the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Protocol marker, always `"2.0"`.
    pub jsonrpc: String,

    /// Correlation id echoed back in the reply.
    pub id: PacketId,

    /// Remote method name, e.g. `submitJob`.
    pub method: String,

    /// Method parameters (`null` when the method takes none).
    #[serde(default)]
    pub params: Value,
}

impl Request {
    /// Creates a new request envelope.
    #[inline]
    #[must_use]
    pub fn new(id: PacketId, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }

    /// Serializes the envelope into one frame payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if the params cannot be serialized.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

// ============================================================================
// RpcError
// ============================================================================

/// The `error` member of an error reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    /// Error code.
    pub code: i64,

    /// Short description of the error.
    #[serde(default)]
    pub message: String,

    /// Additional error information.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl From<RpcError> for Error {
    fn from(err: RpcError) -> Self {
        Error::remote(err.code, err.message, err.data)
    }
}

// ============================================================================
// Reply
// ============================================================================

/// A decoded reply to one of our requests.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Correlation id of the originating request.
    pub id: PacketId,

    /// Either the `result` or the `error` member.
    pub payload: ReplyPayload,
}

/// Body of a [`Reply`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPayload {
    /// Successful reply.
    Result(Value),
    /// Error reply.
    Error(RpcError),
}

impl Reply {
    /// Creates a success reply.
    #[inline]
    #[must_use]
    pub fn result(id: PacketId, result: Value) -> Self {
        Self {
            id,
            payload: ReplyPayload::Result(result),
        }
    }

    /// Creates an error reply.
    #[inline]
    #[must_use]
    pub fn error(id: PacketId, error: RpcError) -> Self {
        Self {
            id,
            payload: ReplyPayload::Error(error),
        }
    }

    /// Returns `true` if this is an error reply.
    #[inline]
    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self.payload, ReplyPayload::Error(_))
    }

    /// Extracts the result value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] carrying the server's code, message and data
    /// if this is an error reply.
    pub fn into_result(self) -> Result<Value> {
        match self.payload {
            ReplyPayload::Result(value) => Ok(value),
            ReplyPayload::Error(err) => Err(err.into()),
        }
    }
}

// ============================================================================
// Notification
// ============================================================================

/// An unsolicited, id-less message pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Event name, e.g. `jobStateChanged`.
    pub method: String,

    /// Event payload.
    #[serde(default)]
    pub params: Value,
}

impl Notification {
    /// Creates a notification.
    #[inline]
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Deserializes the params into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if the params do not match `T`.
    pub fn parse_params<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.params).map_err(|e| {
            Error::protocol(format!("Ill-formed {} notification: {e}", self.method))
        })
    }
}

// ============================================================================
// Inbound
// ============================================================================

/// Classification of one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Frame carries an `id`: a reply to an outstanding request.
    Reply(Reply),
    /// Frame carries no `id`: a server-pushed event.
    Notification(Notification),
}

impl Inbound {
    /// Decodes and classifies one frame payload.
    ///
    /// A frame with a non-null `id` is a reply and must carry exactly one of
    /// `result` or `error`. A frame without an `id` is a notification and
    /// must carry a string `method`. A missing `jsonrpc` member is tolerated.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedFrame`] for anything else.
    pub fn decode(frame: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(frame)
            .map_err(|e| Error::malformed_frame(format!("invalid JSON: {e}")))?;

        let Value::Object(mut object) = value else {
            return Err(Error::malformed_frame("envelope is not a JSON object"));
        };

        match object.get("jsonrpc") {
            None => {}
            Some(Value::String(version)) if version == JSONRPC_VERSION => {}
            Some(other) => {
                return Err(Error::malformed_frame(format!(
                    "unsupported jsonrpc version {other}"
                )));
            }
        }

        match object.remove("id") {
            None | Some(Value::Null) => Self::decode_notification(object),
            Some(id) => Self::decode_reply(&id, object),
        }
    }

    fn decode_reply(id: &Value, mut object: Map<String, Value>) -> Result<Self> {
        let id = id
            .as_u64()
            .and_then(PacketId::new)
            .ok_or_else(|| Error::malformed_frame(format!("invalid packet id {id}")))?;

        let payload = match (object.remove("result"), object.remove("error")) {
            (Some(result), None) => ReplyPayload::Result(result),
            (None, Some(error)) => {
                let error = RpcError::deserialize(&error).map_err(|e| {
                    Error::malformed_frame(format!("invalid error object for {id}: {e}"))
                })?;
                ReplyPayload::Error(error)
            }
            (Some(_), Some(_)) => {
                return Err(Error::malformed_frame(format!(
                    "reply {id} carries both result and error"
                )));
            }
            (None, None) if object.contains_key("method") => {
                return Err(Error::malformed_frame(format!(
                    "unexpected request {id} from server"
                )));
            }
            (None, None) => {
                return Err(Error::malformed_frame(format!(
                    "reply {id} carries neither result nor error"
                )));
            }
        };

        Ok(Self::Reply(Reply { id, payload }))
    }

    fn decode_notification(mut object: Map<String, Value>) -> Result<Self> {
        let method = match object.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => return Err(Error::malformed_frame("method is not a string")),
            None if object.contains_key("error") => {
                return Err(Error::malformed_frame("error reply without packet id"));
            }
            None => return Err(Error::malformed_frame("frame has neither id nor method")),
        };
        let params = object.remove("params").unwrap_or(Value::Null);

        Ok(Self::Notification(Notification { method, params }))
    }
}

// ============================================================================
// Tests
// ============================================================================
