use thiserror::Error;

/// Errors produced by the presence protocol layer.
#[derive(Debug, Error)]
pub enum PresenceError {
    #[error("codec error: {0}")]
    Codec(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for PresenceError {
    fn from(e: serde_json::Error) -> Self {
        PresenceError::Codec(e.to_string())
    }
}

pub type PresenceResult<T> = Result<T, PresenceError>;
