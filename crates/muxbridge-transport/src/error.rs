/// Errors that can occur while setting up or running a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying descriptors.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bridge completion signal was lost (a pump thread panicked).
    #[error("bridge pump disappeared without signaling completion")]
    PumpLost,
}

pub type Result<T> = std::result::Result<T, TransportError>;
