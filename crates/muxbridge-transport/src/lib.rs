//! Transport plumbing for the bridge.
//!
//! When the peer talks to us over our own standard input/output, raw blocking
//! stdio reads cannot live on the dispatch loop. The [`StdioBridge`] turns
//! stdio into an ordinary socket-like transport by pumping bytes across a
//! connected socketpair from two dedicated threads.

pub mod error;
pub mod stdio;

pub use error::{Result, TransportError};
pub use stdio::StdioBridge;
