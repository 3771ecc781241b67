//! Length-prefixed frame codec.
//!
//! Each frame on the byte stream is one serialized `QByteArray`, as the
//! MoleQueue server writes it through a `QDataStream`: a 4-byte length
//! followed by the payload.
//!
//! ```text
//! ┌──────────────┬───────────────────────┐
//! │ length: u32  │ payload (JSON, UTF-8) │
//! │ big-endian   │ `length` bytes        │
//! └──────────────┴───────────────────────┘
//! ```
//!
//! A length of [`NULL_LENGTH`] marks a null array and carries no payload.
//! The codec is public so that test servers can speak it.

// ============================================================================
// Imports
// ============================================================================

use std::io::{self, ErrorKind};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Header size in bytes.
pub const HEADER_SIZE: usize = 4;

/// Length value that encodes a null array.
pub const NULL_LENGTH: u32 = u32::MAX;

/// Default upper bound on a single frame payload (16 MiB).
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

// ============================================================================
// Encoding
// ============================================================================

/// Builds the header for a payload of `len` bytes.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if `len` does not fit below [`NULL_LENGTH`].
pub fn encode_header(len: usize) -> Result<[u8; HEADER_SIZE]> {
    match u32::try_from(len) {
        Ok(len) if len != NULL_LENGTH => Ok(len.to_be_bytes()),
        _ => Err(Error::protocol(format!(
            "Frame of {len} bytes exceeds u32 length"
        ))),
    }
}

/// Writes one frame and flushes the writer.
///
/// # Errors
///
/// Returns [`Error::Io`] if the write fails.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let header = encode_header(payload.len())?;
    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    trace!(len = payload.len(), "Frame written");
    Ok(())
}

// ============================================================================
// Decoding
// ============================================================================

/// Reads the next frame payload.
///
/// Returns `Ok(None)` when the stream ends at a frame boundary. A null
/// array is returned as an empty payload.
///
/// # Errors
///
/// - [`Error::Protocol`] if a frame exceeds `max_frame_size`
/// - [`Error::Io`] if the stream fails or ends mid-frame
pub async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let Some(len) = read_header(reader).await? else {
        return Ok(None);
    };

    if len == NULL_LENGTH {
        trace!("Null frame read");
        return Ok(Some(Vec::new()));
    }

    let len = len as usize;
    if len > max_frame_size {
        return Err(Error::protocol(format!(
            "Frame of {len} bytes exceeds limit of {max_frame_size} bytes"
        )));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    trace!(len, "Frame read");
    Ok(Some(payload))
}

/// Reads the length header, or `None` on a clean end of stream.
async fn read_header<R>(reader: &mut R) -> Result<Option<u32>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_SIZE];
    let mut filled = 0;

    while filled < HEADER_SIZE {
        match reader.read(&mut header[filled..]).await? {
            0 if filled == 0 => return Ok(None),
            0 => {
                return Err(Error::Io(io::Error::new(
                    ErrorKind::UnexpectedEof,
                    format!("stream ended after {filled} of {HEADER_SIZE} header bytes"),
                )));
            }
            n => filled += n,
        }
    }

    Ok(Some(u32::from_be_bytes(header)))
}

// ============================================================================
// Tests
// ============================================================================
