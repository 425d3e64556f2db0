use thiserror::Error;

/// Unified error type for promptforge operations
#[derive(Debug, Error)]
pub enum PromptforgeError {
    // Local storage errors
    #[error("Local storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Record encoding error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("No index '{index}' on collection '{collection}'")]
    UnknownIndex {
        collection: &'static str,
        index: String,
    },

    // Version errors
    #[error("Version content must not be empty")]
    EmptyContent,

    #[error("Version limit reached ({limit}) - delete an old version first")]
    QuotaExceeded { limit: usize },

    // Remote service errors
    #[error("Version service error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl PromptforgeError {
    /// HTTP status carried by a remote service error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            PromptforgeError::Remote { status, .. } => Some(*status),
            PromptforgeError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// True when the error represents an absent remote record.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Result type alias for promptforge operations
pub type Result<T> = std::result::Result<T, PromptforgeError>;
