use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncroomError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Not found: {entity} {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Transient store failure: {0}")]
    Transient(String),

    #[error("Protocol violation: {0}")]
    Protocol(String),

    #[error("Peer overloaded: {0}")]
    Overloaded(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncroomError {
    /// Short error code string carried in outbound `error` frames.
    pub fn code(&self) -> &'static str {
        match self {
            SyncroomError::Config(_) => "CONFIG_ERROR",
            SyncroomError::Unauthenticated(_) => "UNAUTHENTICATED",
            SyncroomError::Forbidden { .. } => "FORBIDDEN",
            SyncroomError::NotFound { .. } => "NOT_FOUND",
            SyncroomError::Transient(_) => "TRANSIENT",
            SyncroomError::Protocol(_) => "PROTOCOL_ERROR",
            SyncroomError::Overloaded(_) => "OVERLOADED",
            SyncroomError::Serialization(_) => "PROTOCOL_ERROR",
            SyncroomError::Io(_) => "INTERNAL_ERROR",
            SyncroomError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for failures the caller should retry with backoff.
    pub fn is_transient(&self) -> bool {
        matches!(self, SyncroomError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncroomError>;
