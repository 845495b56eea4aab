use std::process::Command;

use serde_json::{Map, Value};
use tracing::debug;

use crate::channel::{Channel, ChannelCtx};
use crate::error::{ChannelError, ChannelResult};
use crate::{PROBLEM_INTERNAL_ERROR, PROBLEM_PROTOCOL_ERROR};

/// `stream`: runs the `spawn` argv to completion and relays its stdout.
///
/// The subprocess runs synchronously, so long-running commands hold the
/// bridge loop. A nonzero exit status is not an error here; whatever stdout
/// the process produced still goes out, followed by `done`.
pub struct StreamChannel {
    options: Map<String, Value>,
}

impl StreamChannel {
    pub fn new(options: Map<String, Value>) -> Self {
        Self { options }
    }

    fn spawn_argv(&self) -> ChannelResult<Vec<String>> {
        let spawn = self
            .options
            .get("spawn")
            .and_then(Value::as_array)
            .ok_or_else(|| ChannelError::failed(PROBLEM_PROTOCOL_ERROR, "missing spawn option"))?;

        let mut argv = Vec::with_capacity(spawn.len());
        for arg in spawn {
            let arg = arg.as_str().ok_or_else(|| {
                ChannelError::failed(PROBLEM_PROTOCOL_ERROR, "spawn arguments must be strings")
            })?;
            argv.push(arg.to_string());
        }
        if argv.is_empty() {
            return Err(ChannelError::failed(
                PROBLEM_PROTOCOL_ERROR,
                "spawn argv is empty",
            ));
        }
        Ok(argv)
    }
}

impl Channel for StreamChannel {
    fn prepare(&mut self, ctx: &mut ChannelCtx<'_>) -> ChannelResult<()> {
        ctx.send_ready()?;
        let argv = self.spawn_argv()?;

        let program = argv[0].as_str();
        let output = Command::new(program).args(&argv[1..]).output().map_err(|err| {
            ChannelError::failed(PROBLEM_INTERNAL_ERROR, format!("spawning {program}: {err}"))
        })?;
        if !output.status.success() {
            debug!(program, status = ?output.status, "subprocess exited nonzero");
        }

        ctx.send_data(&output.stdout)?;
        ctx.send_done()
    }
}
