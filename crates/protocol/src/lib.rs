//! # FileShell Protocol Library
//!
//! This crate provides the wire contracts FileShell shares with a remote
//! file-management HTTP service.
//!
//! ## Overview
//!
//! Everything here is pure computation with no I/O:
//!
//! - **Challenges**: Parsing of `WWW-Authenticate` values (Basic and Digest)
//! - **Tokens**: Basic and Digest `Authorization` header computation
//! - **Messages**: Directory listings, payloads, session identity and file descriptors
//! - **Errors**: The wire-level error taxonomy
//!
//! ## Example Usage
//!
//! ```rust
//! use protocol::{authorization, Challenge, Credential, QopParams};
//!
//! let challenge = Challenge::parse("Digest realm=\"files\", qop=\"auth\", nonce=\"abc\"").unwrap();
//! let credential = Credential::new("alice", "secret");
//! let qop = QopParams::new(1, protocol::generate_cnonce());
//!
//! let header = authorization(&challenge, &credential, "GET", "/docs/", &qop).unwrap();
//! assert!(header.starts_with("Digest username=\"alice\""));
//! ```
//!
//! ## Modules
//!
//! - [`challenge`]: Challenge parsing
//! - [`crypto`]: Credential and token computation
//! - [`messages`]: Listing and payload definitions
//! - [`error`]: Error types

pub mod challenge;
pub mod crypto;
pub mod error;
pub mod messages;

pub use challenge::{AuthScheme, Challenge};
pub use crypto::{
    authorization, basic_authorization, digest_authorization, digest_response, generate_cnonce,
    Credential, DigestAlgorithm, QopParams,
};
pub use error::{ProtocolError, Result};
pub use messages::{
    DirEntry, FileDescriptor, Listing, Payload, Session, CONTENT_TYPE_JSON, ENTRY_TYPE_DIRECTORY,
    ENTRY_TYPE_FILE,
};
