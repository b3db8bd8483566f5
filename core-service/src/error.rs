use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),
}

impl CoreError {
    /// Whether the error is a missing entity rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::Library(core_library::LibraryError::NotFound { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
