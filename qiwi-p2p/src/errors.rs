use thiserror::Error as ThisError;

use crate::models::RequestError;

#[derive(ThisError, Debug)]
pub enum Error {
    /// Network or IO failure talking to the API (connect, timeout, body read)
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body was neither an error record nor a bill
    #[error("Failed to parse API response: {source}")]
    Parse {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    /// Error reported by the API, or synthesized from the HTTP status code
    #[error("API error {0}")]
    Vendor(RequestError),

    /// Outbound payload could not be encoded
    #[error("Failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),

    /// No secret key was configured
    #[error("No secret key configured")]
    MissingSecretKey,

    /// Base URL cannot have path segments appended to it
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    /// Webhook routes must be absolute paths
    #[error("Invalid webhook path {0:?}: must be an absolute path without route parameters")]
    InvalidWebhookPath(String),

    /// The webhook listener could not bind its socket
    #[error("Failed to bind webhook listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Error code of a vendor error, `None` for every other kind.
    pub fn code(&self) -> Option<&str> {
        match self {
            Error::Vendor(error) => Some(error.error_code.as_str()),
            _ => None,
        }
    }

    /// Whether the request failed before any response was received.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

impl From<RequestError> for Error {
    fn from(error: RequestError) -> Self {
        Error::Vendor(error)
    }
}

/// Type alias for client operation results
pub type Result<T> = std::result::Result<T, Error>;
