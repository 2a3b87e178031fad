/// Errors of the bounded multipart channel.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Invalid address or an inconsistent option set. Fails `start`.
    #[error("config error: {0}")]
    Config(String),

    /// Underlying socket failure. Usually fatal to the stage.
    #[error("transport error: {0}")]
    Socket(#[from] std::io::Error),

    /// A non-blocking or immediate send/receive could not proceed.
    /// Soft failure: the caller may ignore or log it.
    #[error("operation would block")]
    WouldBlock,

    /// The channel was stopped and its queue drained.
    #[error("channel closed")]
    Closed,

    /// I/O before start or after stop, or a double start.
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
}
