use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Maximum width of the size line, including its trailing newline.
///
/// A 9-digit decimal length covers payloads far beyond the configured
/// maximum, so a header with no newline in the first 10 bytes is garbage.
pub const MAX_HEADER_BYTES: usize = 10;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A framed message with channel routing.
///
/// An empty channel id marks a control frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The channel this message belongs to.
    pub channel: String,
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(channel: impl Into<String>, payload: impl Into<Bytes>) -> Self {
        Self {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Whether this frame is addressed to the control channel.
    pub fn is_control(&self) -> bool {
        self.channel.is_empty()
    }
}

/// Outcome of one decode attempt against an accumulating buffer.
#[derive(Debug)]
pub enum FrameStatus {
    /// The buffer is empty; nothing to do.
    Empty,
    /// At least this many more bytes are needed before a frame can be decoded.
    NeedMore(usize),
    /// A complete frame was decoded. The caller must advance its buffer by
    /// `consumed` bytes and may try again immediately.
    Frame { frame: Frame, consumed: usize },
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// <decimal-length>\n<channel-id>\n<payload>
/// ```
/// The length counts the channel id, its trailing newline, and the payload.
pub fn encode_frame(channel: &str, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if channel.contains('\n') {
        return Err(FrameError::InvalidChannel);
    }
    let length = channel.len() + 1 + payload.len();
    let header = format!("{length}\n{channel}\n");
    dst.reserve(header.len() + payload.len());
    dst.put_slice(header.as_bytes());
    dst.put_slice(payload);
    Ok(())
}

/// Decode at most one frame from the front of `src`.
///
/// Purely a function of the buffer contents. Safe to call in a loop: after a
/// `Frame` result the caller advances by `consumed` and calls again, until
/// `Empty` or `NeedMore` is returned.
pub fn decode_frame(src: &[u8], max_payload: usize) -> Result<FrameStatus> {
    if src.is_empty() {
        return Ok(FrameStatus::Empty);
    }

    // The size line is never wider than MAX_HEADER_BYTES, so only that much
    // of the buffer needs to be examined to find the newline.
    let header = &src[..src.len().min(MAX_HEADER_BYTES)];
    let newline = match header.iter().position(|&b| b == b'\n') {
        Some(pos) => pos,
        None if header.len() < MAX_HEADER_BYTES => {
            return Ok(FrameStatus::NeedMore(MAX_HEADER_BYTES - header.len()));
        }
        None => return Err(FrameError::HeaderTooLong(MAX_HEADER_BYTES)),
    };

    let digits = &header[..newline];
    let length = std::str::from_utf8(digits)
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .ok_or_else(|| FrameError::InvalidLength(String::from_utf8_lossy(digits).into_owned()))?;

    if length > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: length,
            max: max_payload,
        });
    }

    let start = newline + 1;
    let end = start + length;
    if end > src.len() {
        return Ok(FrameStatus::NeedMore(end - src.len()));
    }

    // The frame body is channel-id, newline, payload. A body without any
    // newline is all channel id with an empty payload.
    let body = &src[start..end];
    let (channel, payload) = match body.iter().position(|&b| b == b'\n') {
        Some(pos) => (&body[..pos], &body[pos + 1..]),
        None => (body, &body[body.len()..]),
    };

    let channel = std::str::from_utf8(channel)
        .map_err(|_| FrameError::InvalidChannel)?
        .to_owned();

    Ok(FrameStatus::Frame {
        frame: Frame {
            channel,
            payload: Bytes::copy_from_slice(payload),
        },
        consumed: end,
    })
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}
