use muxbridge_frame::FrameError;

/// Errors that tear down the whole connection.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Frame-level error on the transport.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Fatal protocol violation. Reported to the peer as a `close` control
    /// frame carrying `problem` (and the offending channel id, when there is
    /// one) before the transport is torn down.
    #[error("{message}")]
    Protocol {
        problem: &'static str,
        message: String,
        channel: Option<String>,
    },

    /// JSON serialization error on an outbound message.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RouterError {
    /// Create a fatal protocol error with a peer-visible problem code.
    pub fn protocol(problem: &'static str, message: impl Into<String>) -> Self {
        Self::Protocol {
            problem,
            message: message.into(),
            channel: None,
        }
    }

    /// Like [`RouterError::protocol`], but attributed to a channel id.
    pub fn protocol_on(
        channel: impl Into<String>,
        problem: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::Protocol {
            problem,
            message: message.into(),
            channel: Some(channel.into()),
        }
    }
}

pub type Result<T> = std::result::Result<T, RouterError>;

/// Errors raised by a channel lifecycle hook.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Transport write failure; escalates to connection teardown.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Channel-scoped failure; closes only this channel, the connection
    /// continues.
    #[error("{message}")]
    Failed {
        problem: &'static str,
        message: String,
    },
}

impl ChannelError {
    /// Create a channel-scoped failure with a peer-visible problem code.
    pub fn failed(problem: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            problem,
            message: message.into(),
        }
    }
}

pub type ChannelResult<T> = std::result::Result<T, ChannelError>;
