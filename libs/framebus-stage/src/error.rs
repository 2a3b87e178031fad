use framebus_channel::error::ChannelError;
use framebus_proto::error::CodecError;

/// Errors surfaced by a stage and its typed reader/writer.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// A received frame that could not be decoded. Per-frame: the stage
    /// loop logs it and keeps pulling.
    #[error("malformed frame: {0}")]
    Malformed(#[from] CodecError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// Raised by user handler code; terminates the loop.
    #[error("handler error: {0}")]
    Handler(String),
}

impl StageError {
    pub fn handler(message: impl Into<String>) -> Self {
        StageError::Handler(message.into())
    }
}
