/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// No newline within the maximum header width.
    #[error("size line is too long (no newline in first {0} bytes)")]
    HeaderTooLong(usize),

    /// The size line contains something other than ASCII decimal digits.
    #[error("invalid frame length: {0:?}")]
    InvalidLength(String),

    /// The channel id is not valid UTF-8 or contains a newline.
    #[error("invalid channel id")]
    InvalidChannel,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
