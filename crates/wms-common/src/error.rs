//! Error types for the map service client.

use thiserror::Error;

/// Result type alias using ServiceError.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Everything that can go wrong talking to a map service.
///
/// All of these are recovered where they are detected: logged, and the one
/// operation that hit them is abandoned.
#[derive(Debug, Error)]
pub enum ServiceError {
    // === Transport ===
    #[error("Transport failure: {0}")]
    Transport(String),

    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Response body was empty")]
    EmptyBody,

    // === Payload ===
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("Product '{product}' lacks capability: {expected}")]
    TypeMismatch { product: String, expected: String },

    // === Reprojection ===
    #[error("Source row {row} outside tile height {height}")]
    RangeViolation { row: i64, height: u32 },

    #[error("Image decode failed: {0}")]
    Image(String),
}

impl ServiceError {
    /// Short label used for failure metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Transport(_) => "transport",
            ServiceError::Status(_) => "status",
            ServiceError::EmptyBody => "empty_body",
            ServiceError::Parse(_) => "parse",
            ServiceError::UnknownIdentifier(_) => "unknown_identifier",
            ServiceError::TypeMismatch { .. } => "type_mismatch",
            ServiceError::RangeViolation { .. } => "range_violation",
            ServiceError::Image(_) => "image",
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Parse(format!("JSON error: {}", err))
    }
}
