use muxbridge_frame::{FrameWriter, CONTROL};
use serde_json::{Map, Value};
use tracing::debug;

use crate::control::{hyphenate, ControlMessage};
use crate::error::{ChannelError, ChannelResult};
use crate::PROBLEM_INTERNAL_ERROR;

/// Where channels emit their frames.
///
/// Erases the writer's stream type so channel implementations stay
/// object-safe.
pub trait FrameSink {
    fn send_frame(&mut self, channel: &str, payload: &[u8]) -> muxbridge_frame::Result<()>;
}

impl<T: std::io::Write> FrameSink for FrameWriter<T> {
    fn send_frame(&mut self, channel: &str, payload: &[u8]) -> muxbridge_frame::Result<()> {
        self.send(channel, payload)
    }
}

/// Per-dispatch handle a channel uses to talk to its router.
///
/// All observable side effects of a channel go through here; a channel never
/// touches the transport directly.
pub struct ChannelCtx<'a> {
    id: &'a str,
    sink: &'a mut dyn FrameSink,
    close_requested: &'a mut bool,
}

impl<'a> ChannelCtx<'a> {
    pub(crate) fn new(
        id: &'a str,
        sink: &'a mut dyn FrameSink,
        close_requested: &'a mut bool,
    ) -> Self {
        Self {
            id,
            sink,
            close_requested,
        }
    }

    /// The id this channel is registered under.
    pub fn id(&self) -> &str {
        self.id
    }

    /// Send an opaque data frame on this channel.
    pub fn send_data(&mut self, payload: &[u8]) -> ChannelResult<()> {
        self.sink.send_frame(self.id, payload)?;
        Ok(())
    }

    /// Send a structured message on this channel.
    ///
    /// Top-level underscore keys are rewritten to the hyphenated wire form.
    pub fn send_message(&mut self, fields: Map<String, Value>) -> ChannelResult<()> {
        let value = Value::Object(hyphenate(fields));
        let payload = to_wire(&value)?;
        self.sink.send_frame(self.id, &payload)?;
        Ok(())
    }

    /// Send a `ready` control frame for this channel.
    pub fn send_ready(&mut self) -> ChannelResult<()> {
        self.send_control(&ControlMessage::ready(self.id))
    }

    /// Send a `done` control frame for this channel.
    pub fn send_done(&mut self) -> ChannelResult<()> {
        self.send_control(&ControlMessage::done(self.id))
    }

    /// Send any control frame.
    pub fn send_control(&mut self, message: &ControlMessage) -> ChannelResult<()> {
        let value = serde_json::to_value(message)
            .map_err(|err| ChannelError::failed(PROBLEM_INTERNAL_ERROR, err.to_string()))?;
        let payload = to_wire(&value)?;
        self.sink.send_frame(CONTROL, &payload)?;
        Ok(())
    }

    /// Ask the router to close this channel once the current hook returns.
    ///
    /// Idempotent; the router emits the `close` frame and drops the table
    /// entry.
    pub fn request_close(&mut self) {
        *self.close_requested = true;
    }
}

/// Structured messages travel pretty-printed with a trailing newline.
pub(crate) fn to_wire(value: &Value) -> ChannelResult<Vec<u8>> {
    let mut payload = serde_json::to_vec_pretty(value)
        .map_err(|err| ChannelError::failed(PROBLEM_INTERNAL_ERROR, err.to_string()))?;
    payload.push(b'\n');
    Ok(payload)
}

/// A multiplexed logical stream with its own lifecycle.
///
/// Lifecycle: construction → `prepare` (at open) → `ready`/`receive`/`done`
/// as frames arrive → close. Defaults suit output-only variants.
pub trait Channel: Send {
    /// Variant-specific setup, run synchronously at open time.
    ///
    /// Must eventually either send `ready` (entering data exchange) or send
    /// `done` and request close for one-shot channels.
    fn prepare(&mut self, ctx: &mut ChannelCtx<'_>) -> ChannelResult<()> {
        ctx.send_ready()
    }

    /// The peer signalled it is ready to receive.
    fn ready(&mut self, _ctx: &mut ChannelCtx<'_>) -> ChannelResult<()> {
        Ok(())
    }

    /// One inbound data frame addressed to this channel.
    ///
    /// Most variants are output-only; the default logs and closes.
    fn receive(&mut self, ctx: &mut ChannelCtx<'_>, data: &[u8]) -> ChannelResult<()> {
        debug!(channel = ctx.id(), len = data.len(), "unhandled receive");
        ctx.request_close();
        Ok(())
    }

    /// The peer signalled no more data will arrive on this channel.
    fn done(&mut self, _ctx: &mut ChannelCtx<'_>) -> ChannelResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testutil::RecordingSink;

    struct Plain;
    impl Channel for Plain {}

    #[test]
    fn default_prepare_sends_ready() {
        let mut sink = RecordingSink::default();
        let mut closed = false;
        let mut ctx = ChannelCtx::new("9", &mut sink, &mut closed);

        Plain.prepare(&mut ctx).unwrap();

        let (channel, value) = sink.control_frames()[0].clone();
        assert_eq!(channel, "");
        assert_eq!(value["command"], "ready");
        assert_eq!(value["channel"], "9");
        assert!(!closed);
    }

    #[test]
    fn default_receive_requests_close() {
        let mut sink = RecordingSink::default();
        let mut closed = false;
        let mut ctx = ChannelCtx::new("9", &mut sink, &mut closed);

        Plain.receive(&mut ctx, b"unexpected").unwrap();

        assert!(closed);
        assert!(sink.frames.is_empty());
    }

    #[test]
    fn send_message_hyphenates_and_terminates_with_newline() {
        let mut sink = RecordingSink::default();
        let mut closed = false;
        let mut ctx = ChannelCtx::new("3", &mut sink, &mut closed);

        let mut fields = serde_json::Map::new();
        fields.insert("status_code".into(), json!(200));
        ctx.send_message(fields).unwrap();

        let (channel, payload) = sink.frames[0].clone();
        assert_eq!(channel, "3");
        assert!(payload.ends_with(b"\n"));
        let value: serde_json::Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(value["status-code"], 200);
    }
}
