use serde_json::{json, Map, Value};
use tracing::debug;

use crate::channel::{Channel, ChannelCtx};
use crate::error::{ChannelError, ChannelResult};
use crate::identity;
use crate::{PROBLEM_INTERNAL_ERROR, PROBLEM_PROTOCOL_ERROR};

/// `dbus-json3`: a shim over the internal bus only.
///
/// There is no real message bus behind this. Watches on the two well-known
/// paths answer with canned introspection data, and calls are served from a
/// small fixed table. Requests for any other bus are silently ignored, which
/// lets clients probe without tearing the channel down.
pub struct DbusChannel {
    internal_bus: bool,
}

impl DbusChannel {
    pub fn new(options: Map<String, Value>) -> Self {
        Self {
            internal_bus: options.get("bus").and_then(Value::as_str) == Some("internal"),
        }
    }

    fn handle_watch(&self, ctx: &mut ChannelCtx<'_>, watch: &Value) -> ChannelResult<()> {
        match watch.get("path").and_then(Value::as_str) {
            Some("/superuser") => {
                send_fields(ctx, "meta", superuser_meta())?;
                send_fields(
                    ctx,
                    "notify",
                    json!({
                        "/superuser": {
                            "cockpit.Superuser": {
                                "Bridges": ["sudo", "pkexec"],
                                "Current": "root"
                            }
                        }
                    }),
                )?;
            }
            Some("/machines") => {
                send_fields(ctx, "meta", machines_meta())?;
                send_fields(
                    ctx,
                    "notify",
                    json!({"/machines": {"cockpit.Machines": {"Machines": {}}}}),
                )?;
            }
            other => debug!(path = ?other, "watch on unrecognized path"),
        }
        Ok(())
    }

    fn handle_call(&self, ctx: &mut ChannelCtx<'_>, message: &Value) -> ChannelResult<()> {
        let call = message
            .get("call")
            .and_then(Value::as_array)
            .ok_or_else(|| ChannelError::failed(PROBLEM_PROTOCOL_ERROR, "malformed call"))?;
        let path = call.first().and_then(Value::as_str).unwrap_or_default();
        let method = call.get(2).and_then(Value::as_str).unwrap_or_default();
        let args = call.get(3).and_then(Value::as_array);

        let reply = internal_call(path, method, args)?;

        let mut fields = Map::new();
        fields.insert("reply".into(), json!([reply]));
        fields.insert("id".into(), message.get("id").cloned().unwrap_or(Value::Null));
        ctx.send_message(fields)
    }
}

impl Channel for DbusChannel {
    fn receive(&mut self, ctx: &mut ChannelCtx<'_>, data: &[u8]) -> ChannelResult<()> {
        if !self.internal_bus {
            return Ok(());
        }

        let message: Value = serde_json::from_slice(data)
            .map_err(|err| ChannelError::failed(PROBLEM_PROTOCOL_ERROR, err.to_string()))?;
        debug!(%message, "bus request");

        if message.get("add-match").is_some() {
            // Match rules are accepted and forgotten; nothing emits signals.
            Ok(())
        } else if let Some(watch) = message.get("watch") {
            self.handle_watch(ctx, watch)?;
            let mut fields = Map::new();
            fields.insert("reply".into(), json!([]));
            fields.insert("id".into(), message.get("id").cloned().unwrap_or(Value::Null));
            ctx.send_message(fields)
        } else if message.get("call").is_some() {
            self.handle_call(ctx, &message)
        } else {
            Err(ChannelError::failed(
                PROBLEM_PROTOCOL_ERROR,
                "unrecognized bus request",
            ))
        }
    }
}

fn send_fields(ctx: &mut ChannelCtx<'_>, key: &str, value: Value) -> ChannelResult<()> {
    let mut fields = Map::new();
    fields.insert(key.to_string(), value);
    ctx.send_message(fields)
}

/// The fixed call table.
fn internal_call(path: &str, method: &str, args: Option<&Vec<Value>>) -> ChannelResult<Value> {
    match (path, method) {
        ("/user", "GetAll") => {
            let user = identity::current_user()
                .map_err(|err| ChannelError::failed(PROBLEM_INTERNAL_ERROR, err.to_string()))?;
            Ok(json!([{
                "Name": {"v": user.name},
                "Full": {"v": user.full_name},
                "Id": {"v": user.id},
                "Home": {"v": user.home},
                "Shell": {"v": user.shell},
                "Groups": {"v": user.groups},
            }]))
        }
        // Configuration is never persisted; hand the caller its own default.
        ("/config", "GetUInt") => args
            .and_then(|args| args.get(2))
            .cloned()
            .map(|default| json!([default]))
            .ok_or_else(|| {
                ChannelError::failed(PROBLEM_PROTOCOL_ERROR, "GetUInt needs a default argument")
            }),
        ("/superuser", _) | ("/packages", _) => Ok(json!([])),
        ("/LoginMessages", _) => Ok(json!(["{}"])),
        _ => Err(ChannelError::failed(
            PROBLEM_PROTOCOL_ERROR,
            format!("unknown call {method} on {path}"),
        )),
    }
}

fn superuser_meta() -> Value {
    json!({
        "cockpit.Superuser": {
            "methods": {
                "Start": {"in": ["s"], "out": []},
                "Stop": {"in": [], "out": []},
                "Answer": {"in": ["s"], "out": []}
            },
            "properties": {
                "Bridges": {"flags": "r", "type": "as"},
                "Current": {"flags": "r", "type": "s"}
            },
            "signals": {}
        }
    })
}

fn machines_meta() -> Value {
    json!({
        "cockpit.Machines": {
            "methods": {
                "Update": {"in": ["s", "s", "a{sv}"], "out": []}
            },
            "properties": {
                "Machines": {"flags": "r", "type": "a{sa{sv}}"}
            },
            "signals": {}
        }
    })
}
