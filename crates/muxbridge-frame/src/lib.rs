//! Length-prefixed text framing with channel multiplexing.
//!
//! Every frame on the wire looks like:
//!
//! ```text
//! <decimal-length>\n<channel-id>\n<payload>
//! ```
//!
//! where `decimal-length` counts everything from the first byte of the
//! channel id through the end of the payload (the size line itself is not
//! included). An empty channel id marks a control frame.
//!
//! No partial reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, FrameStatus, DEFAULT_MAX_PAYLOAD,
    MAX_HEADER_BYTES,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

/// The channel id carrying control messages.
pub const CONTROL: &str = "";
