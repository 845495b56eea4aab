//! The control-frame dispatcher and channel table.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;

use muxbridge_frame::{Frame, FrameError, FrameReader, FrameWriter};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::channel::{to_wire, Channel, ChannelCtx};
use crate::control::{
    ControlMessage, COMMAND_CLOSE, COMMAND_DONE, COMMAND_INIT, COMMAND_OPEN, COMMAND_READY,
};
use crate::error::{ChannelError, Result, RouterError};
use crate::resources::{DistLoader, NullLoader};
use crate::variants::{self, Collaborators};
use crate::watch::NullWatcher;
use crate::{system, PROBLEM_NOT_SUPPORTED, PROBLEM_PROTOCOL_ERROR, PROTOCOL_VERSION};

/// Everything a [`Router`] advertises and delegates.
pub struct RouterConfig {
    /// Host name announced in `init` and required on every `open`.
    pub host: String,
    pub session_id: u64,
    /// Available package names, sent as `{name: null}` in `init`.
    pub packages: Map<String, Value>,
    pub os_release: Map<String, Value>,
    pub collaborators: Collaborators,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            host: "me".to_string(),
            session_id: 1,
            packages: Map::new(),
            os_release: Map::new(),
            collaborators: Collaborators {
                resources: Arc::new(NullLoader),
                watcher: Arc::new(NullWatcher),
            },
        }
    }
}

impl RouterConfig {
    /// Probe the host: os-release metadata, installed packages, and web
    /// assets rooted at `resource_base`.
    pub fn detect(resource_base: impl Into<PathBuf>) -> Self {
        let packages = system::discover_packages()
            .keys()
            .map(|name| (name.clone(), Value::Null))
            .collect();

        Self {
            packages,
            os_release: system::os_release(),
            collaborators: Collaborators {
                resources: Arc::new(DistLoader::new(resource_base)),
                watcher: Arc::new(NullWatcher),
            },
            ..Self::default()
        }
    }
}

/// Owns the write side of the transport and the table of open channels.
///
/// All inbound traffic flows through [`Router::serve`]; a fatal protocol
/// violation is announced to the peer as a connection-level `close` frame
/// before the error propagates out.
pub struct Router<W: Write> {
    writer: FrameWriter<W>,
    config: RouterConfig,
    channels: BTreeMap<String, Box<dyn Channel>>,
    init_received: bool,
}

impl<W: Write> Router<W> {
    pub fn new(writer: W, config: RouterConfig) -> Self {
        Self {
            writer: FrameWriter::new(writer),
            config,
            channels: BTreeMap::new(),
            init_received: false,
        }
    }

    /// Announce ourselves. Must be the first frame on the wire.
    pub fn send_init(&mut self) -> Result<()> {
        let message = ControlMessage::init(
            &self.config.host,
            self.config.packages.clone(),
            self.config.os_release.clone(),
            self.config.session_id,
        );
        self.send_control(&message)
    }

    fn send_control(&mut self, message: &ControlMessage) -> Result<()> {
        let payload = to_wire(&serde_json::to_value(message)?).map_err(escalate)?;
        self.writer.send(muxbridge_frame::CONTROL, &payload)?;
        Ok(())
    }

    /// Close a channel and drop it from the table. A no-op for ids that are
    /// not (or no longer) open.
    pub fn close_channel(&mut self, id: &str) -> Result<()> {
        if self.channels.remove(id).is_some() {
            self.send_control(&ControlMessage::close(id))?;
        }
        Ok(())
    }

    /// Read frames until the peer hangs up.
    ///
    /// Clean EOF acknowledges with a bare `close` control frame and returns
    /// `Ok`; anything else tells the peer why before bailing out.
    pub fn serve<R: Read>(&mut self, mut reader: FrameReader<R>) -> Result<()> {
        loop {
            match reader.read_frame() {
                Ok(frame) => self.process(frame)?,
                Err(FrameError::ConnectionClosed) => {
                    debug!("transport closed");
                    self.send_control(&ControlMessage::close_connection())?;
                    return Ok(());
                }
                Err(err) => {
                    self.announce_fatal(None, PROBLEM_PROTOCOL_ERROR, &err.to_string());
                    return Err(err.into());
                }
            }
        }
    }

    /// Handle one frame, reporting fatal errors to the peer first.
    pub fn process(&mut self, frame: Frame) -> Result<()> {
        match self.handle_frame(frame) {
            Err(RouterError::Protocol {
                problem,
                message,
                channel,
            }) => {
                self.announce_fatal(channel.as_deref(), problem, &message);
                Err(RouterError::Protocol {
                    problem,
                    message,
                    channel,
                })
            }
            Err(RouterError::Json(err)) => {
                self.announce_fatal(None, PROBLEM_PROTOCOL_ERROR, &err.to_string());
                Err(RouterError::Json(err))
            }
            other => other,
        }
    }

    fn handle_frame(&mut self, frame: Frame) -> Result<()> {
        if frame.is_control() {
            let message: ControlMessage = serde_json::from_slice(&frame.payload)?;
            debug!(command = %message.command, channel = ?message.channel, "control");
            self.handle_control(message)
        } else {
            debug!(channel = %frame.channel, len = frame.payload.len(), "data");
            let channel = frame.channel.clone();
            self.with_channel(&channel, |ch, ctx| ch.receive(ctx, &frame.payload))
        }
    }

    fn handle_control(&mut self, message: ControlMessage) -> Result<()> {
        if message.command != COMMAND_INIT && !self.init_received {
            return Err(RouterError::protocol(
                PROBLEM_PROTOCOL_ERROR,
                format!("{} command before init", message.command),
            ));
        }

        match message.command.as_str() {
            COMMAND_INIT => self.handle_init(&message),
            COMMAND_OPEN => self.handle_open(message),
            COMMAND_READY => {
                let id = required_channel(&message)?;
                self.with_channel(&id, |ch, ctx| ch.ready(ctx))
            }
            COMMAND_DONE => {
                let id = required_channel(&message)?;
                self.with_channel(&id, |ch, ctx| ch.done(ctx))
            }
            COMMAND_CLOSE => match message.channel.as_deref() {
                Some(id) => self.close_channel(id),
                None => Err(RouterError::protocol(
                    PROBLEM_PROTOCOL_ERROR,
                    "close without channel",
                )),
            },
            other => Err(RouterError::protocol(
                PROBLEM_PROTOCOL_ERROR,
                format!("unknown control command {other}"),
            )),
        }
    }

    fn handle_init(&mut self, message: &ControlMessage) -> Result<()> {
        let version = message.rest.get("version").and_then(numeric_field);
        match version {
            Some(PROTOCOL_VERSION) => {}
            Some(other) => {
                return Err(RouterError::protocol(
                    PROBLEM_PROTOCOL_ERROR,
                    format!("incorrect version number {other}"),
                ));
            }
            None => {
                return Err(RouterError::protocol(
                    PROBLEM_PROTOCOL_ERROR,
                    "version field missing or not an integer",
                ));
            }
        }

        let host = message.field_str("host").ok_or_else(|| {
            RouterError::protocol(PROBLEM_PROTOCOL_ERROR, "missing host field")
        })?;

        info!(host, "peer initialized");
        self.init_received = true;
        Ok(())
    }

    fn handle_open(&mut self, message: ControlMessage) -> Result<()> {
        let (id, payload, host) = match (
            message.channel.as_deref(),
            message.field_str("payload"),
            message.field_str("host"),
        ) {
            (Some(id), Some(payload), Some(host)) => (id.to_string(), payload, host),
            _ => {
                return Err(RouterError::protocol(
                    PROBLEM_NOT_SUPPORTED,
                    "fields missing on open",
                ));
            }
        };

        if self.channels.contains_key(&id) {
            return Err(RouterError::protocol(
                PROBLEM_PROTOCOL_ERROR,
                format!("channel {id} is already open"),
            ));
        }

        // We only speak for ourselves. A foreign host gets a targeted
        // refusal and the connection carries on.
        if host != self.config.host {
            warn!(host, channel = %id, "open for a host we do not serve");
            self.send_control(&ControlMessage::close_problem(
                Some(&id),
                PROBLEM_NOT_SUPPORTED,
                &format!("no route to host {host}"),
            ))?;
            return Ok(());
        }

        let channel = variants::construct(payload, message.rest.clone(), &self.config.collaborators)
            .ok_or_else(|| {
                RouterError::protocol_on(
                    &id,
                    PROBLEM_NOT_SUPPORTED,
                    format!("unsupported payload type {payload}"),
                )
            })?;

        debug!(channel = %id, payload, "channel open");
        self.channels.insert(id.clone(), channel);
        self.with_channel(&id, |ch, ctx| ch.prepare(ctx))
    }

    /// Run one lifecycle hook against a channel in the table.
    ///
    /// The entry is taken out for the duration of the hook so the channel
    /// and the writer can be borrowed at once. A `Failed` outcome closes
    /// just this channel; a frame error tears the connection down.
    fn with_channel<F>(&mut self, id: &str, hook: F) -> Result<()>
    where
        F: FnOnce(&mut dyn Channel, &mut ChannelCtx<'_>) -> crate::error::ChannelResult<()>,
    {
        let mut channel = self.channels.remove(id).ok_or_else(|| {
            RouterError::protocol(PROBLEM_PROTOCOL_ERROR, format!("no open channel {id}"))
        })?;

        let mut close_requested = false;
        let result = {
            let mut ctx = ChannelCtx::new(id, &mut self.writer, &mut close_requested);
            hook(channel.as_mut(), &mut ctx)
        };

        match result {
            Ok(()) => {
                if close_requested {
                    self.send_control(&ControlMessage::close(id))?;
                } else {
                    self.channels.insert(id.to_string(), channel);
                }
                Ok(())
            }
            Err(ChannelError::Failed { problem, message }) => {
                warn!(channel = id, problem, "channel failed: {message}");
                self.send_control(&ControlMessage::close_problem(Some(id), problem, &message))?;
                Ok(())
            }
            Err(ChannelError::Frame(err)) => Err(err.into()),
        }
    }

    /// Best-effort close announcement before teardown.
    fn announce_fatal(&mut self, channel: Option<&str>, problem: &str, message: &str) {
        warn!(problem, "fatal: {message}");
        let _ = self.send_control(&ControlMessage::close_problem(channel, problem, message));
    }
}

/// The version field may arrive as a JSON number or as a numeric string.
fn numeric_field(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn required_channel(message: &ControlMessage) -> Result<String> {
    message.channel.clone().ok_or_else(|| {
        RouterError::protocol(
            PROBLEM_PROTOCOL_ERROR,
            format!("{} without channel", message.command),
        )
    })
}

fn escalate(err: ChannelError) -> RouterError {
    match err {
        ChannelError::Frame(err) => err.into(),
        ChannelError::Failed { problem, message } => RouterError::Protocol {
            problem: crate::PROBLEM_INTERNAL_ERROR,
            message: format!("{problem}: {message}"),
            channel: None,
        },
    }
}
