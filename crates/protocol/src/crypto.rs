//! Authorization token computation for Basic and Digest authentication.
//!
//! This module turns a [`Credential`] and a server [`Challenge`] into the
//! value of an `Authorization` request header. Digest responses follow
//! RFC 2617 / RFC 7616 with MD5 as the default hash and SHA-256 when the
//! challenge asks for it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::challenge::{AuthScheme, Challenge};
use crate::error::{ProtocolError, Result};

/// Length of a generated client nonce in bytes (hex-encoded on the wire).
pub const CNONCE_LENGTH: usize = 16;

/// A username and password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Hash function used for digest computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Md5,
    Sha256,
}

impl DigestAlgorithm {
    /// Resolve the `algorithm` directive of a challenge.
    ///
    /// An absent directive means MD5.
    pub fn from_directive(directive: Option<&str>) -> Result<Self> {
        match directive {
            None => Ok(DigestAlgorithm::Md5),
            Some(name) if name.eq_ignore_ascii_case("MD5") => Ok(DigestAlgorithm::Md5),
            Some(name) if name.eq_ignore_ascii_case("SHA-256") => Ok(DigestAlgorithm::Sha256),
            Some(other) => Err(ProtocolError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    /// The directive value naming this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "MD5",
            DigestAlgorithm::Sha256 => "SHA-256",
        }
    }

    /// Hash UTF-8 input to a lowercase hex string.
    pub fn hash(&self, input: &str) -> String {
        match self {
            DigestAlgorithm::Md5 => hex::encode(Md5::digest(input.as_bytes())),
            DigestAlgorithm::Sha256 => hex::encode(Sha256::digest(input.as_bytes())),
        }
    }
}

/// Client-side values that vary per request when `qop=auth` is in effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QopParams {
    /// Request counter as 8 lowercase hex digits.
    pub nc: String,
    pub cnonce: String,
}

impl QopParams {
    pub fn new(nonce_count: u32, cnonce: impl Into<String>) -> Self {
        Self {
            nc: format!("{nonce_count:08x}"),
            cnonce: cnonce.into(),
        }
    }
}

/// Generate a random client nonce.
pub fn generate_cnonce() -> String {
    hex::encode(rand::random::<[u8; CNONCE_LENGTH]>())
}

/// Compute a Basic `Authorization` header value.
pub fn basic_authorization(credential: &Credential) -> String {
    let pair = format!("{}:{}", credential.username, credential.password);
    format!("Basic {}", STANDARD.encode(pair.as_bytes()))
}

/// Compute the digest `response` value.
///
/// Without qop: `H(H(user:realm:pass):nonce:H(method:uri))`.
/// With `qop=auth`: `H(H(user:realm:pass):nonce:nc:cnonce:auth:H(method:uri))`.
#[allow(clippy::too_many_arguments)]
pub fn digest_response(
    algorithm: DigestAlgorithm,
    credential: &Credential,
    realm: &str,
    nonce: &str,
    method: &str,
    uri: &str,
    qop: Option<&QopParams>,
) -> String {
    let ha1 = algorithm.hash(&format!(
        "{}:{}:{}",
        credential.username, realm, credential.password
    ));
    let ha2 = algorithm.hash(&format!("{method}:{uri}"));

    let material = match qop {
        Some(params) => format!(
            "{ha1}:{nonce}:{}:{}:auth:{ha2}",
            params.nc, params.cnonce
        ),
        None => format!("{ha1}:{nonce}:{ha2}"),
    };
    algorithm.hash(&material)
}

/// Compute a full Digest `Authorization` header value for one request.
///
/// `qop` is only used when the challenge offers `qop=auth`.
pub fn digest_authorization(
    challenge: &Challenge,
    credential: &Credential,
    method: &str,
    uri: &str,
    qop: &QopParams,
) -> Result<String> {
    let nonce = challenge
        .nonce()
        .ok_or(ProtocolError::MalformedChallenge { directive: "nonce" })?;
    let realm = challenge.realm().unwrap_or_default();
    let algorithm = DigestAlgorithm::from_directive(challenge.algorithm())?;
    let qop = challenge.qop().map(|_| qop);

    let response = digest_response(algorithm, credential, realm, nonce, method, uri, qop);

    let mut header = format!(
        "Digest username=\"{}\", realm=\"{}\", nonce=\"{}\", uri=\"{}\", response=\"{}\"",
        quote_escape(&credential.username),
        quote_escape(realm),
        nonce,
        uri,
        response
    );
    if challenge.algorithm().is_some() {
        header.push_str(&format!(", algorithm={}", algorithm.name()));
    }
    if let Some(params) = qop {
        header.push_str(&format!(
            ", qop=auth, nc={}, cnonce=\"{}\"",
            params.nc, params.cnonce
        ));
    }
    if let Some(opaque) = challenge.opaque() {
        header.push_str(&format!(", opaque=\"{opaque}\""));
    }
    Ok(header)
}

/// Compute the `Authorization` header value answering `challenge`.
pub fn authorization(
    challenge: &Challenge,
    credential: &Credential,
    method: &str,
    uri: &str,
    qop: &QopParams,
) -> Result<String> {
    match challenge.scheme() {
        AuthScheme::Basic => Ok(basic_authorization(credential)),
        AuthScheme::Digest => digest_authorization(challenge, credential, method, uri, qop),
        AuthScheme::Other(name) => Err(ProtocolError::UnsupportedScheme(name.clone())),
    }
}

fn quote_escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
