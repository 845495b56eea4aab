use crate::channel::{Channel, ChannelCtx};
use crate::error::ChannelResult;

/// `null`: goes ready, never sends, ignores every inbound frame.
pub struct NullChannel;

impl Channel for NullChannel {
    fn receive(&mut self, _ctx: &mut ChannelCtx<'_>, _data: &[u8]) -> ChannelResult<()> {
        Ok(())
    }
}

/// `echo`: reflects every inbound data frame back verbatim.
pub struct EchoChannel;

impl Channel for EchoChannel {
    fn receive(&mut self, ctx: &mut ChannelCtx<'_>, data: &[u8]) -> ChannelResult<()> {
        ctx.send_data(data)
    }
}
