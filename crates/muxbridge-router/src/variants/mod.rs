//! The closed set of payload behaviors selectable at channel-open time.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::channel::Channel;
use crate::resources::ResourceLoader;
use crate::watch::PathWatcher;

pub mod basic;
pub mod dbus;
pub mod exec;
pub mod fs;
pub mod http;
pub mod metrics;

/// Collaborator handles shared with channel variants at open time.
#[derive(Clone)]
pub struct Collaborators {
    pub resources: Arc<dyn ResourceLoader>,
    pub watcher: Arc<dyn PathWatcher>,
}

/// Every payload tag the bridge accepts.
pub const VARIANT_TAGS: [&str; 8] = [
    "null",
    "echo",
    "fsread1",
    "fswatch1",
    "stream",
    "metrics1",
    "dbus-json3",
    "http-stream1",
];

/// Construct the behavior for a payload tag.
///
/// This match is the entire registry: variants are fixed at compile time,
/// never discovered at runtime. Unknown tags return `None`.
pub fn construct(
    payload: &str,
    options: Map<String, Value>,
    collab: &Collaborators,
) -> Option<Box<dyn Channel>> {
    match payload {
        "null" => Some(Box::new(basic::NullChannel)),
        "echo" => Some(Box::new(basic::EchoChannel)),
        "fsread1" => Some(Box::new(fs::FsReadChannel::new(options))),
        "fswatch1" => Some(Box::new(fs::FsWatchChannel::new(
            options,
            Arc::clone(&collab.watcher),
        ))),
        "stream" => Some(Box::new(exec::StreamChannel::new(options))),
        "metrics1" => Some(Box::new(metrics::MetricsChannel::new(options))),
        "dbus-json3" => Some(Box::new(dbus::DbusChannel::new(options))),
        "http-stream1" => Some(Box::new(http::HttpChannel::new(
            options,
            Arc::clone(&collab.resources),
        ))),
        _ => None,
    }
}
