//! Typed errors for the client crate.

use thiserror::Error;

/// Errors raised while building a client handle or dispatching a request.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A connection configuration field is missing or malformed.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Handle initialization (login, transport setup) failed.
    #[error("connection failed: {0}")]
    Connection(String),
    /// The API answered with a non-success status.
    #[error("api error ({status}): {body}")]
    Api { status: u16, body: String },
    /// The API reported that the addressed object does not exist.
    #[error("object not found: {0}")]
    NotFound(String),
    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The response body was not the JSON we expected.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }

    /// HTTP status of an API error, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            ClientError::NotFound(_) => Some(404),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
