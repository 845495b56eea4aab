use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::channel::{Channel, ChannelCtx};
use crate::error::{ChannelError, ChannelResult};
use crate::watch::PathWatcher;
use crate::{PROBLEM_INTERNAL_ERROR, PROBLEM_PROTOCOL_ERROR};

fn required_path(options: &Map<String, Value>) -> ChannelResult<&str> {
    options
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| ChannelError::failed(PROBLEM_PROTOCOL_ERROR, "missing path option"))
}

/// `fsread1`: one-shot full file read.
///
/// Sends the whole file as a single data frame, then `done`. A missing file
/// is a benign empty read: `ready` then `done` with no data in between.
/// Optional config files rely on that, so it must stay soft.
pub struct FsReadChannel {
    options: Map<String, Value>,
}

impl FsReadChannel {
    pub fn new(options: Map<String, Value>) -> Self {
        Self { options }
    }
}

impl Channel for FsReadChannel {
    fn prepare(&mut self, ctx: &mut ChannelCtx<'_>) -> ChannelResult<()> {
        ctx.send_ready()?;
        let path = required_path(&self.options)?;
        match std::fs::read(path) {
            Ok(data) => ctx.send_data(&data)?,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path, "file not found, sending empty read");
            }
            Err(err) => {
                return Err(ChannelError::failed(
                    PROBLEM_INTERNAL_ERROR,
                    format!("reading {path}: {err}"),
                ));
            }
        }
        ctx.send_done()
    }
}

/// `fswatch1`: registers change-notification interest for a path.
///
/// Notification delivery belongs to the watcher collaborator; this channel
/// only goes ready once interest is registered.
pub struct FsWatchChannel {
    options: Map<String, Value>,
    watcher: Arc<dyn PathWatcher>,
}

impl FsWatchChannel {
    pub fn new(options: Map<String, Value>, watcher: Arc<dyn PathWatcher>) -> Self {
        Self { options, watcher }
    }
}

impl Channel for FsWatchChannel {
    fn prepare(&mut self, ctx: &mut ChannelCtx<'_>) -> ChannelResult<()> {
        if let Some(path) = self.options.get("path").and_then(Value::as_str) {
            self.watcher.watch(Path::new(path)).map_err(|err| {
                ChannelError::failed(PROBLEM_INTERNAL_ERROR, format!("watching {path}: {err}"))
            })?;
        }
        ctx.send_ready()
    }
}
