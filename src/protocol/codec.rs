//! Newline-delimited JSON framing
//!
//! One JSON object per line. Blank lines and a trailing `\r` are tolerated so
//! the protocol can be driven by hand with `nc`.

use bytes::{BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::constants::{DEFAULT_MAX_FRAME_SIZE, FRAME_DELIMITER, MAX_FRAME_SIZE};
use crate::error::ProtocolError;

/// Frame encoder/decoder
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a codec with the default frame limit
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a codec with a custom frame limit (capped at 1 MiB)
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(MAX_FRAME_SIZE),
        }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Decode the next complete frame from `buf`
    ///
    /// Returns `Ok(None)` when more data is needed. A malformed frame is
    /// consumed before its error is returned, so decoding can resume with
    /// the next line. An oversized frame leaves the buffer untouched and
    /// the connection should be dropped.
    pub fn decode<T: DeserializeOwned>(&self, buf: &mut BytesMut) -> Result<Option<T>, ProtocolError> {
        loop {
            let Some(newline) = buf.iter().position(|b| *b == FRAME_DELIMITER) else {
                if buf.len() > self.max_frame_size {
                    return Err(ProtocolError::FrameTooLarge {
                        size: buf.len(),
                        max: self.max_frame_size,
                    });
                }
                return Ok(None);
            };

            if newline > self.max_frame_size {
                return Err(ProtocolError::FrameTooLarge {
                    size: newline,
                    max: self.max_frame_size,
                });
            }

            let line = buf.split_to(newline + 1);
            let mut frame = &line[..newline];
            if frame.last() == Some(&b'\r') {
                frame = &frame[..frame.len() - 1];
            }
            if frame.iter().all(|b| b.is_ascii_whitespace()) {
                continue;
            }

            return serde_json::from_slice(frame)
                .map(Some)
                .map_err(ProtocolError::from);
        }
    }

    /// Append one encoded frame to `buf`
    pub fn encode<T: Serialize>(&self, message: &T, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        let json = serde_json::to_vec(message)?;
        buf.reserve(json.len() + 1);
        buf.put_slice(&json);
        buf.put_u8(FRAME_DELIMITER);
        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}
