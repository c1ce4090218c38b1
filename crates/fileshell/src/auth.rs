//! Authentication state shared by every operation.
//!
//! The manager owns the credential, the last challenge the service sent, the
//! session identity, and the digest nonce counter. Tokens are computed per
//! request from that state, so a challenge stored by one operation is honored
//! by the very next request of any other operation.

use std::sync::Arc;

use protocol::{authorization, generate_cnonce, Challenge, Credential, QopParams, Session};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::primitive::{PrimitiveError, RemoteFilePrimitive, Verb};

/// Service path probed for the caller's identity.
const PROBE_TARGET: &str = "/";

/// Outcome of an authorization probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The service accepted the request; identity headers when present.
    Authorized(Option<Session>),
    /// The service asked for credentials with this challenge.
    Challenged(String),
    /// The service root does not exist.
    NotFound(String),
    /// Any other failure; authentication state is left untouched.
    TransportError(u16),
}

impl ProbeOutcome {
    pub fn is_authorized(&self) -> bool {
        matches!(self, ProbeOutcome::Authorized(_))
    }
}

#[derive(Debug)]
struct AuthState {
    credential: Option<Credential>,
    challenge: Challenge,
    /// Token sent with the last probe, kept while the session is valid.
    token: Option<String>,
    session: Option<Session>,
    /// Digest `nc` for the current nonce.
    nonce_count: u32,
}

impl AuthState {
    fn new() -> Self {
        Self {
            credential: None,
            challenge: Challenge::basic(),
            token: None,
            session: None,
            nonce_count: 0,
        }
    }

    /// Compute a fresh token for one request.
    ///
    /// `None` without a credential, or when the challenge cannot be answered.
    fn compute(&mut self, method: &str, uri: &str) -> Option<String> {
        let credential = self.credential.as_ref()?;
        self.nonce_count = self.nonce_count.wrapping_add(1);
        let qop = QopParams::new(self.nonce_count, generate_cnonce());

        match authorization(&self.challenge, credential, method, uri, &qop) {
            Ok(token) => Some(token),
            Err(err) => {
                warn!(error = %err, challenge = %self.challenge, "Cannot answer challenge");
                None
            }
        }
    }
}

/// Owner of the credential, challenge and session identity.
pub struct AuthenticationManager<P: RemoteFilePrimitive> {
    primitive: Arc<P>,
    state: RwLock<AuthState>,
}

impl<P: RemoteFilePrimitive> AuthenticationManager<P> {
    pub fn new(primitive: Arc<P>) -> Self {
        Self {
            primitive,
            state: RwLock::new(AuthState::new()),
        }
    }

    /// Check the current authorization against the service root.
    ///
    /// On success the identity headers become the session. On a challenge
    /// the challenge is stored and the cached token and session are dropped.
    /// Any other outcome leaves the state as it was.
    pub async fn probe(&self) -> ProbeOutcome {
        let uri = self.primitive.request_uri(PROBE_TARGET);
        let token = self
            .state
            .write()
            .await
            .compute(Verb::Read.method(), &uri);

        match self.primitive.probe(token.as_deref()).await {
            Ok(session) => {
                let mut state = self.state.write().await;
                info!(
                    principal = session.as_ref().map(|s| s.principal.as_str()),
                    "Authorization accepted"
                );
                state.token = token;
                state.session = session.clone();
                ProbeOutcome::Authorized(session)
            }
            Err(PrimitiveError::AuthenticationRequired { challenge }) => {
                let raw = self.set_challenge(challenge.as_deref()).await;
                let mut state = self.state.write().await;
                state.token = None;
                state.session = None;
                ProbeOutcome::Challenged(raw)
            }
            Err(PrimitiveError::NotFound { url }) => {
                warn!(%url, "Service root not found");
                ProbeOutcome::NotFound(url)
            }
            Err(PrimitiveError::Transport { status, message }) => {
                warn!(status, %message, "Authorization probe failed");
                ProbeOutcome::TransportError(status)
            }
        }
    }

    /// Store a credential and probe with a token computed from the current challenge.
    pub async fn login(&self, username: &str, password: &str) -> ProbeOutcome {
        {
            let mut state = self.state.write().await;
            info!(username, scheme = %state.challenge.scheme(), "Logging in");
            state.credential = Some(Credential::new(username, password));
        }
        self.probe().await
    }

    /// Forget the credential, token and session, then probe anonymously.
    pub async fn logout(&self) -> ProbeOutcome {
        {
            let mut state = self.state.write().await;
            info!(
                principal = state.session.as_ref().map(|s| s.principal.as_str()),
                "Logging out"
            );
            state.credential = None;
            state.token = None;
            state.session = None;
        }
        self.probe().await
    }

    /// Token sent with the last probe, if the session still holds one.
    pub async fn current_token(&self) -> Option<String> {
        self.state.read().await.token.clone()
    }

    /// Fresh `Authorization` value for one request.
    pub async fn authorization_for(&self, method: &str, uri: &str) -> Option<String> {
        self.state.write().await.compute(method, uri)
    }

    /// Replace the stored challenge with one reported by any request.
    ///
    /// An absent or empty header keeps the previous challenge. Returns the
    /// challenge now in effect.
    pub async fn set_challenge(&self, raw: Option<&str>) -> String {
        let mut state = self.state.write().await;
        match raw.map(Challenge::parse) {
            Some(Ok(challenge)) => {
                if challenge != state.challenge {
                    debug!(challenge = %challenge, "Stored new challenge");
                    state.nonce_count = 0;
                }
                state.challenge = challenge;
            }
            Some(Err(err)) => warn!(error = %err, "Ignoring unusable challenge"),
            None => debug!("Challenge header absent, keeping previous challenge"),
        }
        state.challenge.raw().to_string()
    }

    /// The challenge currently in effect.
    pub async fn challenge(&self) -> Challenge {
        self.state.read().await.challenge.clone()
    }

    pub async fn session(&self) -> Option<Session> {
        self.state.read().await.session.clone()
    }

    pub async fn has_credential(&self) -> bool {
        self.state.read().await.credential.is_some()
    }
}
