use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("socket transport error: {0}")]
    Transport(String),

    #[error("socket is not connected")]
    NotConnected,

    #[error("request failed with status {status}: {detail}")]
    Request { status: u16, detail: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Validation(String),

    #[error("token storage error while {operation} at {path}: {source}")]
    Storage {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Text shown inline to the user, e.g. under a login form.
    pub fn user_message(&self) -> String {
        match self {
            Self::Request { detail, .. } => detail.clone(),
            Self::Validation(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
