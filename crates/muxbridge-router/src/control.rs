use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Control command: handshake announcement.
pub const COMMAND_INIT: &str = "init";
/// Control command: open a new channel.
pub const COMMAND_OPEN: &str = "open";
/// Control command: peer is ready to receive.
pub const COMMAND_READY: &str = "ready";
/// Control command: no more data will arrive from the sender.
pub const COMMAND_DONE: &str = "done";
/// Control command: tear down a channel (or, without a channel, the
/// connection).
pub const COMMAND_CLOSE: &str = "close";

/// A structured message on the control (empty) channel.
///
/// Command-specific fields beyond the common ones are carried in `rest`.
/// Wire keys always use hyphens; [`hyphenate`] converts underscore keys
/// supplied by internal callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlMessage {
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl ControlMessage {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            channel: None,
            problem: None,
            exception: None,
            rest: Map::new(),
        }
    }

    /// The `init` frame advertised on connect.
    pub fn init(
        host: &str,
        packages: Map<String, Value>,
        os_release: Map<String, Value>,
        session_id: u64,
    ) -> Self {
        let mut msg = Self::new(COMMAND_INIT);
        msg.rest.insert("version".into(), crate::PROTOCOL_VERSION.into());
        msg.rest.insert("host".into(), host.into());
        msg.rest.insert("packages".into(), Value::Object(packages));
        msg.rest.insert("os-release".into(), Value::Object(os_release));
        msg.rest.insert("session-id".into(), session_id.into());
        msg
    }

    /// A `ready` lifecycle frame for a channel.
    pub fn ready(channel: &str) -> Self {
        Self::new(COMMAND_READY).with_channel(channel)
    }

    /// A `done` lifecycle frame for a channel.
    pub fn done(channel: &str) -> Self {
        Self::new(COMMAND_DONE).with_channel(channel)
    }

    /// A graceful `close` frame for a channel.
    pub fn close(channel: &str) -> Self {
        Self::new(COMMAND_CLOSE).with_channel(channel)
    }

    /// A connection-level `close` frame with no problem (clean EOF).
    pub fn close_connection() -> Self {
        Self::new(COMMAND_CLOSE)
    }

    /// A `close` frame carrying a problem code and descriptive message.
    pub fn close_problem(channel: Option<&str>, problem: &str, exception: &str) -> Self {
        let mut msg = Self::new(COMMAND_CLOSE);
        msg.channel = channel.map(str::to_string);
        msg.problem = Some(problem.to_string());
        msg.exception = Some(exception.to_string());
        msg
    }

    fn with_channel(mut self, channel: &str) -> Self {
        self.channel = Some(channel.to_string());
        self
    }

    /// Look up a required string field in the command-specific extras.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.rest.get(name).and_then(Value::as_str)
    }
}

/// Rewrite underscore key names to the hyphenated wire convention.
///
/// Only top-level keys are touched, matching how internal callers name
/// fields (`os_release` → `os-release`).
pub fn hyphenate(fields: Map<String, Value>) -> Map<String, Value> {
    fields
        .into_iter()
        .map(|(key, value)| (key.replace('_', "-"), value))
        .collect()
}
