//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering wire-level failure modes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    // Challenge errors
    /// The server sent an empty `WWW-Authenticate` value.
    #[error("empty authentication challenge")]
    EmptyChallenge,

    /// The challenge names a scheme this client cannot answer.
    #[error("unsupported authentication scheme: {0}")]
    UnsupportedScheme(String),

    /// The challenge lacks a directive required to compute a token.
    #[error("malformed challenge: missing {directive}")]
    MalformedChallenge {
        /// Name of the missing directive.
        directive: &'static str,
    },

    /// The challenge asks for a digest algorithm this client does not implement.
    #[error("unsupported digest algorithm: {0}")]
    UnsupportedAlgorithm(String),

    // Payload errors
    /// A directory listing could not be decoded.
    #[error("malformed listing: {0}")]
    MalformedListing(String),

    /// A header value could not be represented.
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::MalformedListing(err.to_string())
    }
}
