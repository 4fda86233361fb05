//! Error types for talking to the chat backend.

use reqwest::StatusCode;

/// Every way a backend call can fail. Both variants count as a network
/// error; callers do not distinguish timeouts, refused connections and 5xx.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{endpoint} returned {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
}

pub type Result<T> = std::result::Result<T, ChatError>;
