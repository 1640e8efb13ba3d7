/// Result alias that carries the custom [`ScorpionError`] type.
pub type Result<T> = std::result::Result<T, ScorpionError>;

/// Common error type for the core crate.
///
/// `Configuration` is fatal to session setup. `InvalidSample` and
/// `MissingBuffer` are recoverable: the engine drops the sample or stays
/// silent for one tick and keeps running.
#[derive(Debug, thiserror::Error)]
pub enum ScorpionError {
    /// Degenerate scaler bounds, an invalid gate window or a bad config value.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// A motion sample with a missing or non-finite component.
    #[error("invalid motion sample: {0}")]
    InvalidSample(String),
    /// The selected buffer index does not exist in the store.
    #[error("no sound buffer at index {index} ({available} available)")]
    MissingBuffer { index: usize, available: usize },
    /// A shared lock was poisoned by a panicking holder.
    #[error("{0} has been poisoned")]
    Poisoned(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),
}

impl ScorpionError {
    /// Creates a configuration error from the provided message.
    pub fn config<T: Into<String>>(msg: T) -> Self {
        Self::Configuration(msg.into())
    }

    /// Returns `true` for errors the real-time loop degrades to silence on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidSample(_) | Self::MissingBuffer { .. })
    }
}
