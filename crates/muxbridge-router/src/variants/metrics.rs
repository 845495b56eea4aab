use serde_json::{json, Map, Value};

use crate::channel::{Channel, ChannelCtx};
use crate::error::{ChannelError, ChannelResult};
use crate::PROBLEM_NOT_SUPPORTED;

/// `metrics1`: accepts exactly one fixed sampling contract.
///
/// Only the internal source at a 3000ms interval with the basic cpu/memory
/// metric list is recognized. Anything else closes the channel instead of
/// pretending samples will arrive. No samples are produced yet either way.
pub struct MetricsChannel {
    options: Map<String, Value>,
}

impl MetricsChannel {
    pub fn new(options: Map<String, Value>) -> Self {
        Self { options }
    }

    fn validate(&self) -> ChannelResult<()> {
        let check = |ok: bool, what: &str| {
            if ok {
                Ok(())
            } else {
                Err(ChannelError::failed(
                    PROBLEM_NOT_SUPPORTED,
                    format!("unsupported metrics request: {what}"),
                ))
            }
        };

        check(
            self.options.get("source").and_then(Value::as_str) == Some("internal"),
            "source must be internal",
        )?;
        check(
            self.options.get("interval") == Some(&json!(3000)),
            "interval must be 3000",
        )?;
        check(
            !self.options.contains_key("omit-instances"),
            "omit-instances is not accepted",
        )?;
        check(
            self.options.get("metrics") == Some(&expected_metrics()),
            "unrecognized metric list",
        )
    }
}

fn expected_metrics() -> Value {
    json!([
        {"name": "cpu.basic.user", "derive": "rate"},
        {"name": "cpu.basic.system", "derive": "rate"},
        {"name": "cpu.basic.nice", "derive": "rate"},
        {"name": "memory.used"},
    ])
}

impl Channel for MetricsChannel {
    fn prepare(&mut self, ctx: &mut ChannelCtx<'_>) -> ChannelResult<()> {
        self.validate()?;
        ctx.send_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RecordingSink;

    fn conforming_options() -> Map<String, Value> {
        let mut options = Map::new();
        options.insert("source".into(), json!("internal"));
        options.insert("interval".into(), json!(3000));
        options.insert("metrics".into(), expected_metrics());
        options
    }

    #[test]
    fn conforming_request_goes_ready() {
        let mut sink = RecordingSink::default();
        let mut closed = false;
        let mut ctx = ChannelCtx::new("9", &mut sink, &mut closed);
        let mut channel = MetricsChannel::new(conforming_options());
        channel.prepare(&mut ctx).unwrap();

        assert_eq!(sink.control_frames()[0].1["command"], "ready");
    }

    #[test]
    fn wrong_interval_is_rejected() {
        let mut options = conforming_options();
        options.insert("interval".into(), json!(1000));

        let mut sink = RecordingSink::default();
        let mut closed = false;
        let mut ctx = ChannelCtx::new("9", &mut sink, &mut closed);
        let err = MetricsChannel::new(options).prepare(&mut ctx).unwrap_err();

        assert!(matches!(
            err,
            ChannelError::Failed { problem, .. } if problem == PROBLEM_NOT_SUPPORTED
        ));
        assert!(sink.control_frames().is_empty());
    }

    #[test]
    fn omit_instances_is_rejected() {
        let mut options = conforming_options();
        options.insert("omit-instances".into(), json!([]));

        let mut sink = RecordingSink::default();
        let mut closed = false;
        let mut ctx = ChannelCtx::new("9", &mut sink, &mut closed);
        assert!(MetricsChannel::new(options).prepare(&mut ctx).is_err());
    }

    #[test]
    fn reordered_metric_list_is_rejected() {
        let mut options = conforming_options();
        options.insert(
            "metrics".into(),
            json!([
                {"name": "memory.used"},
                {"name": "cpu.basic.user", "derive": "rate"},
                {"name": "cpu.basic.system", "derive": "rate"},
                {"name": "cpu.basic.nice", "derive": "rate"},
            ]),
        );

        let mut sink = RecordingSink::default();
        let mut closed = false;
        let mut ctx = ChannelCtx::new("9", &mut sink, &mut closed);
        assert!(MetricsChannel::new(options).prepare(&mut ctx).is_err());
    }
}
