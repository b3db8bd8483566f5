use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    /// The catalog API answered with a non-success status.
    #[error("Catalog API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed stored record: {0}")]
    Corrupt(String),
}

impl LibraryError {
    pub fn not_found(entity_type: &str, id: impl Into<String>) -> Self {
        LibraryError::NotFound {
            entity_type: entity_type.to_string(),
            id: id.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
