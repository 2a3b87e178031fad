use framebus_stage::error::StageError;

/// Errors of a media bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Stage(#[from] StageError),

    /// Raised by the media framework side of the bridge.
    #[error("media element error: {0}")]
    Element(String),
}

impl BridgeError {
    pub fn element(message: impl Into<String>) -> Self {
        BridgeError::Element(message.into())
    }
}
