//! Parsing of `WWW-Authenticate` challenges.
//!
//! Servers in the wild are sloppy about challenge syntax: directives come in
//! any order, separated by commas, whitespace, or both, with quoted or bare
//! values. Some servers even emit stray quote characters between directives.
//! The parser here accepts all of that and only fails on an empty header.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{ProtocolError, Result};

/// Authentication scheme named by a challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// RFC 7617 Basic.
    Basic,
    /// RFC 7616 Digest.
    Digest,
    /// Any other scheme, kept verbatim.
    Other(String),
}

impl AuthScheme {
    fn from_token(token: &str) -> Self {
        if token.eq_ignore_ascii_case("basic") {
            AuthScheme::Basic
        } else if token.eq_ignore_ascii_case("digest") {
            AuthScheme::Digest
        } else {
            AuthScheme::Other(token.to_string())
        }
    }
}

impl fmt::Display for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthScheme::Basic => f.write_str("Basic"),
            AuthScheme::Digest => f.write_str("Digest"),
            AuthScheme::Other(name) => f.write_str(name),
        }
    }
}

/// A parsed authentication challenge.
///
/// The raw header value is kept alongside the parsed form so it can be
/// reported back to callers unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    raw: String,
    scheme: AuthScheme,
    directives: HashMap<String, String>,
}

impl Challenge {
    /// Parse a `WWW-Authenticate` header value.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ProtocolError::EmptyChallenge);
        }

        let scheme_end = trimmed
            .find(|c: char| c.is_whitespace() || c == ',')
            .unwrap_or(trimmed.len());
        let scheme = AuthScheme::from_token(&trimmed[..scheme_end]);
        let directives = parse_directives(&trimmed[scheme_end..]);

        Ok(Self {
            raw: trimmed.to_string(),
            scheme,
            directives,
        })
    }

    /// The challenge assumed before the server has sent one.
    pub fn basic() -> Self {
        Self {
            raw: "Basic".to_string(),
            scheme: AuthScheme::Basic,
            directives: HashMap::new(),
        }
    }

    /// The header value as received.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The scheme this challenge asks for.
    pub fn scheme(&self) -> &AuthScheme {
        &self.scheme
    }

    /// Look up a directive by name (case-insensitive).
    pub fn directive(&self, name: &str) -> Option<&str> {
        self.directives
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn realm(&self) -> Option<&str> {
        self.directive("realm")
    }

    pub fn nonce(&self) -> Option<&str> {
        self.directive("nonce")
    }

    pub fn opaque(&self) -> Option<&str> {
        self.directive("opaque")
    }

    pub fn algorithm(&self) -> Option<&str> {
        self.directive("algorithm")
    }

    /// The quality of protection to answer with.
    ///
    /// Only `auth` is supported; a server offering `auth,auth-int` gets `auth`.
    pub fn qop(&self) -> Option<&'static str> {
        self.directive("qop").and_then(|value| {
            value
                .split(|c: char| c == ',' || c.is_whitespace())
                .any(|option| option.eq_ignore_ascii_case("auth"))
                .then_some("auth")
        })
    }
}

impl Default for Challenge {
    fn default() -> Self {
        Self::basic()
    }
}

impl FromStr for Challenge {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn is_separator(c: char) -> bool {
    c == ',' || c.is_whitespace()
}

/// Split `key=value` directives out of the text following the scheme.
fn parse_directives(input: &str) -> HashMap<String, String> {
    let mut directives = HashMap::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|&c| is_separator(c)).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|&c| c != '=' && !is_separator(c)) {
            key.push(c);
        }

        // Bare tokens (and stray quotes) carry no value
        if chars.next_if_eq(&'=').is_none() {
            continue;
        }

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            while let Some(c) = chars.next() {
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            value.push(escaped);
                        }
                    }
                    '"' => break,
                    other => value.push(other),
                }
            }
            // Skip junk glued to the closing quote
            while chars.next_if(|&c| !is_separator(c)).is_some() {}
        } else {
            while let Some(c) = chars.next_if(|&c| !is_separator(c)) {
                value.push(c);
            }
        }

        let key = key.trim_matches('"').to_ascii_lowercase();
        if !key.is_empty() {
            directives.insert(key, value);
        }
    }

    directives
}
