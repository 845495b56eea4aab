use serde_json::Value;

use crate::channel::FrameSink;

/// Frame sink that records everything for assertions.
#[derive(Default)]
pub struct RecordingSink {
    pub frames: Vec<(String, Vec<u8>)>,
}

impl FrameSink for RecordingSink {
    fn send_frame(&mut self, channel: &str, payload: &[u8]) -> muxbridge_frame::Result<()> {
        self.frames.push((channel.to_string(), payload.to_vec()));
        Ok(())
    }
}

impl RecordingSink {
    /// Control frames, parsed as JSON, in emission order.
    pub fn control_frames(&self) -> Vec<(String, Value)> {
        self.frames
            .iter()
            .filter(|(channel, _)| channel.is_empty())
            .map(|(channel, payload)| {
                let value = serde_json::from_slice(payload).expect("control frame should be JSON");
                (channel.clone(), value)
            })
            .collect()
    }

    /// Structured messages on a given channel, parsed as JSON.
    pub fn messages_on(&self, id: &str) -> Vec<Value> {
        self.frames
            .iter()
            .filter(|(channel, _)| channel == id)
            .map(|(_, payload)| serde_json::from_slice(payload).expect("message should be JSON"))
            .collect()
    }

    /// Raw data frames on a given channel.
    pub fn data_on(&self, id: &str) -> Vec<Vec<u8>> {
        self.frames
            .iter()
            .filter(|(channel, _)| channel == id)
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}
