//! Frame routing and channel lifecycle for the bridge.
//!
//! A single [`Router`] owns the transport, decodes frames, and drives every
//! logical channel through its open/ready/data/done/close lifecycle. Payload
//! behaviors are selected at open time from a static variant registry.

pub mod channel;
pub mod control;
pub mod error;
pub mod identity;
pub mod resources;
pub mod router;
pub mod system;
pub mod variants;
pub mod watch;

#[cfg(test)]
pub(crate) mod testutil;

pub use channel::{Channel, ChannelCtx};
pub use control::ControlMessage;
pub use error::{ChannelError, ChannelResult, Result, RouterError};
pub use resources::{DistLoader, ResourceLoader};
pub use router::{Router, RouterConfig};
pub use watch::{NullWatcher, PathWatcher};

/// Protocol version spoken on the wire.
pub const PROTOCOL_VERSION: u64 = 1;

/// Problem code for malformed or out-of-order protocol traffic.
pub const PROBLEM_PROTOCOL_ERROR: &str = "protocol-error";
/// Problem code for operations the bridge does not support.
pub const PROBLEM_NOT_SUPPORTED: &str = "not-supported";
/// Problem code for failures inside an otherwise valid channel.
pub const PROBLEM_INTERNAL_ERROR: &str = "internal-error";
