//! Single-shot request primitives against the file service.
//!
//! A primitive performs exactly one HTTP exchange and reports exactly one
//! outcome through its return value. Primitives never retry and never touch
//! authentication state; they only carry the `Authorization` value they are
//! handed and report challenges back up.

pub mod http;
#[cfg(test)]
pub mod memory;

use protocol::{Payload, Session};
use thiserror::Error;

pub use http::HttpPrimitive;
#[cfg(test)]
pub use memory::{MemoryPrimitive, RecordedCall};

/// Header carrying the authenticated principal on probe responses.
pub const HEADER_REMOTE_USER: &str = "x-remote-user";
/// Header carrying the principal's group on probe responses.
pub const HEADER_REMOTE_GROUP: &str = "x-remote-group";
/// Header carrying the principal's home directory on probe responses.
pub const HEADER_REMOTE_HOME: &str = "x-remote-home";
/// Marker header sent with every request.
pub const HEADER_REQUESTED_WITH: &str = "x-requested-with";
pub const REQUESTED_WITH_VALUE: &str = "XMLHttpRequest";

/// Failure outcomes of a single primitive call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrimitiveError {
    /// The service answered 401/403; the challenge header may be absent.
    #[error("authentication required")]
    AuthenticationRequired { challenge: Option<String> },

    /// The service answered 404.
    #[error("not found: {url}")]
    NotFound { url: String },

    /// Any other status, or no response at all (status 0).
    #[error("transport error (status {status}): {message}")]
    Transport { status: u16, message: String },
}

impl PrimitiveError {
    pub fn transport(status: u16, message: impl Into<String>) -> Self {
        PrimitiveError::Transport {
            status,
            message: message.into(),
        }
    }
}

/// File-system verbs exposed by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Read,
    Write,
    Update,
    Delete,
}

impl Verb {
    /// HTTP method used for this verb.
    pub fn method(&self) -> &'static str {
        match self {
            Verb::Read => "GET",
            Verb::Write => "PUT",
            Verb::Update => "POST",
            Verb::Delete => "DELETE",
        }
    }
}

/// One-request-per-call access to the remote file service.
///
/// Targets are absolute paths below the service root (`/docs/a.txt`); a
/// trailing `/` addresses a directory. Implementations must build an
/// independent request for every call so that concurrent calls never share
/// completion state.
#[allow(async_fn_in_trait)]
pub trait RemoteFilePrimitive: Send + Sync {
    /// The request URI the service will see for `target`.
    ///
    /// Digest responses are keyed by this value.
    fn request_uri(&self, target: &str) -> String;

    /// Absolute URL of `target`, for handing to an external opener.
    fn locate(&self, target: &str) -> String;

    /// Fetch a file or a directory listing.
    async fn read(
        &self,
        target: &str,
        authorization: Option<&str>,
    ) -> Result<Payload, PrimitiveError>;

    /// Store content at `target`; `None` with a `/`-terminated target creates
    /// a directory.
    async fn write(
        &self,
        target: &str,
        payload: Option<&Payload>,
        authorization: Option<&str>,
    ) -> Result<Payload, PrimitiveError>;

    /// Post updated content to an existing target.
    async fn update(
        &self,
        target: &str,
        payload: &Payload,
        authorization: Option<&str>,
    ) -> Result<Payload, PrimitiveError>;

    /// Remove `target`.
    async fn delete(&self, target: &str, authorization: Option<&str>)
        -> Result<(), PrimitiveError>;

    /// Side-effect-free identity check against the service root.
    ///
    /// Returns the identity headers when the service sent them.
    async fn probe(&self, authorization: Option<&str>) -> Result<Option<Session>, PrimitiveError>;
}
