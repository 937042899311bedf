//! Native-messaging framing: a 4-byte native-endian length followed by that
//! many bytes of UTF-8 JSON.

use std::io::{self, Read, Write};

use crate::error::{HostError, Result};
use crate::message::Message;

/// Largest frame a browser accepts from a native host (1 MiB).
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Owns the output stream and writes one complete frame per message.
pub struct MessageSink<W: Write> {
    out: W,
    frame_limit: usize,
}

impl<W: Write> MessageSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            frame_limit: MAX_FRAME_LEN,
        }
    }

    pub fn with_frame_limit(mut self, limit: usize) -> Self {
        self.frame_limit = limit;
        self
    }

    /// Serialize, frame, write and flush `message`.
    ///
    /// Prefix and payload go out in a single `write_all`, so a frame is either
    /// fully handed to the stream or the stream has failed. Oversized messages
    /// are refused before anything is written.
    pub fn send(&mut self, message: &Message) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        if payload.len() > self.frame_limit {
            return Err(HostError::MessageTooLarge {
                size: payload.len(),
                limit: self.frame_limit,
            });
        }
        let len = u32::try_from(payload.len()).map_err(|_| HostError::MessageTooLarge {
            size: payload.len(),
            limit: u32::MAX as usize,
        })?;

        let mut frame = Vec::with_capacity(4 + payload.len());
        frame.extend_from_slice(&len.to_ne_bytes());
        frame.extend_from_slice(&payload);
        self.out.write_all(&frame)?;
        self.out.flush()?;
        Ok(())
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Read one frame. Returns `Ok(None)` on a clean end of stream between frames;
/// a stream that ends inside a frame is an `UnexpectedEof` error.
pub fn read_frame<R: Read>(input: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut prefix = [0u8; 4];
    let mut filled = 0;
    while filled < prefix.len() {
        match input.read(&mut prefix[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    let len = u32::from_ne_bytes(prefix) as usize;
    let mut payload = vec![0u8; len];
    input.read_exact(&mut payload)?;
    Ok(Some(payload))
}
