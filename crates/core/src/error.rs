/// Result alias that carries the custom [`AudioVizError`] type.
pub type Result<T> = std::result::Result<T, AudioVizError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum AudioVizError {
    /// Rejected analysis configuration. Raised by `initialize` before any
    /// buffer is allocated, so the pipeline stays uninitialised.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Input that cannot be analysed, e.g. a block of the wrong length.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// An operation other than `initialize` was attempted before it.
    #[error("analysis pipeline is not initialised")]
    NotInitialized,
    /// Failure reported by the FFT backend.
    #[error(transparent)]
    Fft(#[from] realfft::FftError),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed JSON configuration.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Free-form message for errors that have no dedicated variant.
    #[error("{0}")]
    Message(String),
}

impl AudioVizError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn config<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<&str> for AudioVizError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for AudioVizError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
