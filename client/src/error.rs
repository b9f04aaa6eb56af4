//! Client error types

use thiserror::Error;

/// Failures talking to the quill service
///
/// Every variant ends the session with a visible error message; none of
/// them is retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    /// The request never reached the service
    #[error("Failed to reach the content service: {0}")]
    Connect(String),

    /// The service refused the request before opening a stream
    #[error("{message}")]
    Rejected {
        /// HTTP status
        status: u16,
        /// Server-provided explanation
        message: String,
    },

    /// The stream broke after it was opened
    #[error("Connection lost while streaming: {0}")]
    Read(String),
}

impl ClientError {
    /// Fallback text when a rejection carries no usable body
    pub const GENERIC_REJECTION: &'static str = "Failed to generate content";
}
