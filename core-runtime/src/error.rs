use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors raised while assembling the runtime.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error("Default bridge failed to initialize: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, Error>;
