use std::io::ErrorKind;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use crate::channel::{Channel, ChannelCtx};
use crate::error::{ChannelError, ChannelResult};
use crate::resources::ResourceLoader;
use crate::{PROBLEM_INTERNAL_ERROR, PROBLEM_PROTOCOL_ERROR};

/// `http-stream1`: serves one GET request from the resource loader.
///
/// Request body bytes accumulate until the peer's `done`, then the whole
/// exchange happens at once: status message, body data, `done`. Only
/// bodyless GET is supported.
pub struct HttpChannel {
    options: Map<String, Value>,
    body: Vec<u8>,
    resources: Arc<dyn ResourceLoader>,
}

impl HttpChannel {
    pub fn new(options: Map<String, Value>, resources: Arc<dyn ResourceLoader>) -> Self {
        Self {
            options,
            body: Vec::new(),
            resources,
        }
    }

    fn respond(&self, ctx: &mut ChannelCtx<'_>) -> ChannelResult<()> {
        if !self.body.is_empty() {
            return Err(ChannelError::failed(
                PROBLEM_PROTOCOL_ERROR,
                "request bodies are not supported",
            ));
        }
        if self.options.get("method").and_then(Value::as_str) != Some("GET") {
            return Err(ChannelError::failed(
                PROBLEM_PROTOCOL_ERROR,
                "only GET is supported",
            ));
        }
        let path = self
            .options
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| ChannelError::failed(PROBLEM_PROTOCOL_ERROR, "missing path option"))?;

        match content_type(path).map(|ctype| (ctype, self.resources.load(path))) {
            Some((ctype, Ok(data))) => {
                let mut fields = Map::new();
                fields.insert("status".into(), json!(200));
                fields.insert("reason".into(), json!("OK"));
                fields.insert("headers".into(), json!({"Content-Type": ctype}));
                ctx.send_message(fields)?;
                ctx.send_data(&data)?;
            }
            Some((_, Err(err))) if err.kind() == ErrorKind::NotFound => self.not_found(ctx, path)?,
            Some((_, Err(err))) => {
                return Err(ChannelError::failed(
                    PROBLEM_INTERNAL_ERROR,
                    format!("loading {path}: {err}"),
                ));
            }
            None => self.not_found(ctx, path)?,
        }

        ctx.send_done()
    }

    fn not_found(&self, ctx: &mut ChannelCtx<'_>, path: &str) -> ChannelResult<()> {
        debug!(path, "404");
        let mut fields = Map::new();
        fields.insert("status".into(), json!(404));
        fields.insert("reason".into(), json!("Not Found"));
        ctx.send_message(fields)?;
        ctx.send_data(b"Not found")
    }
}

/// Content type by file extension. `None` means we do not serve it at all.
fn content_type(path: &str) -> Option<&'static str> {
    match path.rsplit_once('.').map(|(_, ext)| ext)? {
        "css" => Some("text/css"),
        "map" => Some("application/json"),
        "js" => Some("text/javascript"),
        "html" => Some("text/html"),
        "woff2" => Some("application/font-woff2"),
        _ => None,
    }
}

impl Channel for HttpChannel {
    fn receive(&mut self, _ctx: &mut ChannelCtx<'_>, data: &[u8]) -> ChannelResult<()> {
        self.body.extend_from_slice(data);
        Ok(())
    }

    fn done(&mut self, ctx: &mut ChannelCtx<'_>) -> ChannelResult<()> {
        self.respond(ctx)
    }
}
