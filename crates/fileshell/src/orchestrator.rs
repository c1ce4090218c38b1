//! Operation orchestrator.
//!
//! This module provides the `FileOrchestrator`, which turns caller-visible
//! operations (list, copy, cut/paste, move, mkdir, upload...) into ordered
//! sequences of primitive calls.
//!
//! Every step of an operation computes its `Authorization` value at issue
//! time from the shared [`AuthenticationManager`], awaits its outcome, and
//! only then issues the next step. The first failure ends the operation:
//! a challenge is stored for later requests, nothing is retried and nothing
//! already done is rolled back.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use protocol::{DirEntry, FileDescriptor, Listing, Payload, ProtocolError, Session};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::auth::{AuthenticationManager, ProbeOutcome};
use crate::clipboard::{Clipboard, ClipboardEntry};
use crate::primitive::{PrimitiveError, RemoteFilePrimitive, Verb};
use crate::workdir;

/// Capacity of the lifecycle event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Identifier of one issued operation.
pub type OperationId = u64;

/// Kinds of caller-visible operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    List,
    ChangeDirectory,
    Remove,
    Copy,
    Cut,
    Paste,
    Move,
    Mkdir,
    Upload,
    Download,
    Update,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationKind::List => "list",
            OperationKind::ChangeDirectory => "changeDirectory",
            OperationKind::Remove => "remove",
            OperationKind::Copy => "copy",
            OperationKind::Cut => "cut",
            OperationKind::Paste => "paste",
            OperationKind::Move => "move",
            OperationKind::Mkdir => "mkdir",
            OperationKind::Upload => "upload",
            OperationKind::Download => "download",
            OperationKind::Update => "update",
        };
        f.write_str(name)
    }
}

/// Events emitted by the orchestrator.
///
/// Each operation emits `Begin` followed by exactly one of `Completed`,
/// `AuthenticationRequired`, `NotFound` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationEvent {
    /// The operation was issued.
    Begin { id: OperationId, kind: OperationKind },
    /// Every step succeeded.
    Completed { id: OperationId, kind: OperationKind },
    /// A step was challenged; the challenge is now stored.
    AuthenticationRequired {
        id: OperationId,
        kind: OperationKind,
        challenge: String,
    },
    /// A step targeted a missing path.
    NotFound {
        id: OperationId,
        kind: OperationKind,
        url: String,
    },
    /// Transport, protocol or local file failure.
    Failed {
        id: OperationId,
        kind: OperationKind,
        error: String,
    },
    /// A probe was accepted.
    Authorized { session: Option<Session> },
    /// A probe was challenged.
    Challenged { challenge: String },
}

/// Errors that end an operation.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("authentication required")]
    AuthenticationRequired { challenge: String },

    #[error("not found: {url}")]
    NotFound { url: String },

    #[error("transport error (status {status}): {message}")]
    Transport { status: u16, message: String },

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("local file error: {0}")]
    LocalFile(#[from] std::io::Error),
}

impl From<PrimitiveError> for OperationError {
    fn from(err: PrimitiveError) -> Self {
        match err {
            PrimitiveError::AuthenticationRequired { challenge } => {
                OperationError::AuthenticationRequired {
                    challenge: challenge.unwrap_or_default(),
                }
            }
            PrimitiveError::NotFound { url } => OperationError::NotFound { url },
            PrimitiveError::Transport { status, message } => {
                OperationError::Transport { status, message }
            }
        }
    }
}

/// Sequences primitive calls into file operations.
pub struct FileOrchestrator<P: RemoteFilePrimitive> {
    primitive: Arc<P>,
    auth: Arc<AuthenticationManager<P>>,
    /// Current working directory, always `/`-terminated.
    cwd: RwLock<String>,
    clipboard: Mutex<Clipboard>,
    next_id: AtomicU64,
    event_tx: broadcast::Sender<OperationEvent>,
}

impl<P: RemoteFilePrimitive> FileOrchestrator<P> {
    /// Creates an orchestrator with its own authentication manager.
    pub fn new(primitive: Arc<P>) -> Self {
        let auth = Arc::new(AuthenticationManager::new(Arc::clone(&primitive)));
        Self::with_auth(primitive, auth)
    }

    /// Creates an orchestrator sharing an existing authentication manager.
    pub fn with_auth(primitive: Arc<P>, auth: Arc<AuthenticationManager<P>>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            primitive,
            auth,
            cwd: RwLock::new("/".to_string()),
            clipboard: Mutex::new(Clipboard::new()),
            next_id: AtomicU64::new(1),
            event_tx,
        }
    }

    /// Starts in `dir` instead of the service root.
    pub fn starting_in(self, dir: &str) -> Self {
        Self {
            cwd: RwLock::new(workdir::normalize_dir(dir)),
            ..self
        }
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<OperationEvent> {
        self.event_tx.subscribe()
    }

    pub fn auth(&self) -> &Arc<AuthenticationManager<P>> {
        &self.auth
    }

    pub async fn cwd(&self) -> String {
        self.cwd.read().await.clone()
    }

    pub async fn clipboard_len(&self) -> usize {
        self.clipboard.lock().await.len()
    }

    /// Names waiting in the clipboard, oldest first.
    pub async fn clipboard_names(&self) -> Vec<String> {
        self.clipboard.lock().await.names()
    }

    /// Drops every pending clipboard entry, returning how many were dropped.
    pub async fn clear_clipboard(&self) -> usize {
        let mut clipboard = self.clipboard.lock().await;
        let dropped = clipboard.len();
        clipboard.clear();
        dropped
    }

    pub async fn session(&self) -> Option<Session> {
        self.auth.session().await
    }

    // ------------------------------------------------------------------
    // Authentication
    // ------------------------------------------------------------------

    pub async fn probe(&self) -> ProbeOutcome {
        let outcome = self.auth.probe().await;
        self.emit_probe(&outcome);
        outcome
    }

    pub async fn login(&self, username: &str, password: &str) -> ProbeOutcome {
        let outcome = self.auth.login(username, password).await;
        self.emit_probe(&outcome);
        outcome
    }

    pub async fn logout(&self) -> ProbeOutcome {
        let outcome = self.auth.logout().await;
        self.emit_probe(&outcome);
        outcome
    }

    fn emit_probe(&self, outcome: &ProbeOutcome) {
        match outcome {
            ProbeOutcome::Authorized(session) => self.emit(OperationEvent::Authorized {
                session: session.clone(),
            }),
            ProbeOutcome::Challenged(challenge) => self.emit(OperationEvent::Challenged {
                challenge: challenge.clone(),
            }),
            ProbeOutcome::NotFound(_) | ProbeOutcome::TransportError(_) => {}
        }
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Lists `path` (or the cwd); the cwd itself is not changed.
    pub async fn list(&self, path: Option<&str>) -> Result<Vec<DirEntry>, OperationError> {
        let id = self.begin(OperationKind::List);
        let cwd = self.cwd().await;
        let dir = match path {
            Some(path) => workdir::resolve_dir(&cwd, path),
            None => cwd,
        };

        let result = async {
            let payload = self.read(&dir).await?;
            let listing = Listing::from_json(&payload.data)?;
            Ok::<_, OperationError>(listing.entries)
        }
        .await;
        self.settle(id, OperationKind::List, result)
    }

    /// Changes the cwd locally and returns the new value.
    pub async fn change_directory(&self, path: &str) -> Result<String, OperationError> {
        let id = self.begin(OperationKind::ChangeDirectory);
        let mut cwd = self.cwd.write().await;
        let next = workdir::resolve_dir(&cwd, path);
        *cwd = next;
        debug!(cwd = %*cwd, "Changed directory");
        let result = Ok(cwd.clone());
        drop(cwd);
        self.settle(id, OperationKind::ChangeDirectory, result)
    }

    /// Deletes `name` under the cwd.
    pub async fn remove(&self, name: &str) -> Result<(), OperationError> {
        let id = self.begin(OperationKind::Remove);
        let target = workdir::join(&self.cwd().await, name);
        let result = self.delete(&target).await;
        self.settle(id, OperationKind::Remove, result)
    }

    /// Reads `name` and either writes it to `new_name` or queues it for paste.
    ///
    /// With `new_name` and `cut`, the original is deleted once the write has
    /// succeeded.
    pub async fn copy(
        &self,
        name: &str,
        new_name: Option<&str>,
        cut: bool,
    ) -> Result<(), OperationError> {
        let kind = if cut {
            OperationKind::Cut
        } else {
            OperationKind::Copy
        };
        let id = self.begin(kind);
        let cwd = self.cwd().await;

        let result = async {
            let source = workdir::join(&cwd, name);
            let payload = self.read(&source).await?;

            match new_name {
                Some(new_name) => {
                    let destination = workdir::join(&cwd, new_name);
                    self.write(&destination, Some(&payload)).await?;
                    if cut && destination != source {
                        self.delete(&source).await?;
                    }
                }
                None => {
                    let descriptor = FileDescriptor {
                        name: file_name(name).to_string(),
                        old_name: Some(source),
                        source_dir: Some(cwd.clone()),
                        cut,
                        payload: Some(payload),
                        ..FileDescriptor::default()
                    };
                    let mut clipboard = self.clipboard.lock().await;
                    clipboard.enqueue(ClipboardEntry {
                        descriptor,
                        is_cut: cut,
                    });
                    debug!(name, cut, queued = clipboard.len(), "Queued clipboard entry");
                }
            }
            Ok::<_, OperationError>(())
        }
        .await;
        self.settle(id, kind, result)
    }

    pub async fn cut(&self, name: &str) -> Result<(), OperationError> {
        self.copy(name, None, true).await
    }

    /// Materializes the oldest clipboard entry under the cwd.
    ///
    /// Returns the pasted name, or `None` when the clipboard was empty. A
    /// failed write puts the entry back at the head of the clipboard.
    pub async fn paste(&self) -> Result<Option<String>, OperationError> {
        let id = self.begin(OperationKind::Paste);
        let cwd = self.cwd().await;

        let entry = self.clipboard.lock().await.dequeue_oldest();
        let Some(entry) = entry else {
            debug!("Clipboard empty, nothing to paste");
            return self.settle(id, OperationKind::Paste, Ok(None));
        };

        let result = async {
            let descriptor = &entry.descriptor;
            let destination = workdir::join(&cwd, &descriptor.name);
            let empty = Payload::default();
            let payload = descriptor.payload.as_ref().unwrap_or(&empty);

            if let Err(err) = self.write(&destination, Some(payload)).await {
                self.clipboard.lock().await.restore(entry.clone());
                return Err(err);
            }

            if entry.is_cut {
                match &descriptor.old_name {
                    Some(source) if *source != destination => self.delete(source).await?,
                    Some(_) => debug!(%destination, "Pasted onto its own source, keeping it"),
                    None => warn!(name = %descriptor.name, "Cut entry has no source path"),
                }
            }
            Ok::<_, OperationError>(Some(descriptor.name.clone()))
        }
        .await;
        self.settle(id, OperationKind::Paste, result)
    }

    /// Renames `old_name` to `new_name`: read, then write, then delete.
    pub async fn move_file(&self, old_name: &str, new_name: &str) -> Result<(), OperationError> {
        let id = self.begin(OperationKind::Move);
        let cwd = self.cwd().await;
        let source = workdir::join(&cwd, old_name);
        let destination = workdir::join(&cwd, new_name);

        let result = async {
            if source == destination {
                debug!(%source, "Move onto itself, nothing to do");
                return Ok(());
            }
            let payload = self.read(&source).await?;
            self.write(&destination, Some(&payload)).await?;
            self.delete(&source).await
        }
        .await;
        self.settle(id, OperationKind::Move, result)
    }

    /// Creates `cwd/name/`, or the cwd itself when `name` is `None`.
    pub async fn mkdir(&self, name: Option<&str>) -> Result<(), OperationError> {
        let id = self.begin(OperationKind::Mkdir);
        let target = workdir::join_dir(&self.cwd().await, name.unwrap_or(""));
        let result = self.write(&target, None).await.map(|_| ());
        self.settle(id, OperationKind::Mkdir, result)
    }

    /// Uploads a local file under the cwd using its own file name.
    pub async fn upload(&self, path: &Path) -> Result<String, OperationError> {
        let id = self.begin(OperationKind::Upload);
        let cwd = self.cwd().await;

        let result = async {
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("no file name in {}", path.display()),
                    )
                })?
                .to_string();
            let data = tokio::fs::read(path).await?;
            debug!(path = %path.display(), bytes = data.len(), "Read local file");

            self.write(&workdir::join(&cwd, &name), Some(&Payload::bytes(data)))
                .await?;
            Ok::<_, OperationError>(name)
        }
        .await;
        self.settle(id, OperationKind::Upload, result)
    }

    /// Uploads caller-supplied content as `name` under the cwd.
    pub async fn upload_bytes(
        &self,
        name: &str,
        data: impl Into<Bytes>,
    ) -> Result<(), OperationError> {
        let id = self.begin(OperationKind::Upload);
        let target = workdir::join(&self.cwd().await, name);
        let payload = Payload::bytes(data);
        let result = self.write(&target, Some(&payload)).await.map(|_| ());
        self.settle(id, OperationKind::Upload, result)
    }

    /// Fetches the content of `name` under the cwd.
    pub async fn download(&self, name: &str) -> Result<Bytes, OperationError> {
        let id = self.begin(OperationKind::Download);
        let target = workdir::join(&self.cwd().await, name);
        let result = self.read(&target).await.map(|payload| payload.data);
        self.settle(id, OperationKind::Download, result)
    }

    /// Posts new content to the existing file `name` under the cwd.
    pub async fn update(&self, name: &str, payload: Payload) -> Result<Payload, OperationError> {
        let id = self.begin(OperationKind::Update);
        let target = workdir::join(&self.cwd().await, name);

        let auth = self.authorize(Verb::Update, &target).await;
        let result = self
            .primitive
            .update(&target, &payload, auth.as_deref())
            .await;
        let result = self.outcome(result).await;
        self.settle(id, OperationKind::Update, result)
    }

    /// Absolute URL of `name` under the cwd.
    pub async fn url_for(&self, name: &str) -> String {
        self.primitive
            .locate(&workdir::join(&self.cwd().await, name))
    }

    // ------------------------------------------------------------------
    // Steps
    // ------------------------------------------------------------------

    async fn authorize(&self, verb: Verb, target: &str) -> Option<String> {
        let uri = self.primitive.request_uri(target);
        self.auth.authorization_for(verb.method(), &uri).await
    }

    /// Converts a step result, storing any challenge it carried.
    async fn outcome<T>(&self, result: Result<T, PrimitiveError>) -> Result<T, OperationError> {
        match result {
            Ok(value) => Ok(value),
            Err(PrimitiveError::AuthenticationRequired { challenge }) => {
                let challenge = self.auth.set_challenge(challenge.as_deref()).await;
                Err(OperationError::AuthenticationRequired { challenge })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn read(&self, target: &str) -> Result<Payload, OperationError> {
        let auth = self.authorize(Verb::Read, target).await;
        let result = self.primitive.read(target, auth.as_deref()).await;
        self.outcome(result).await
    }

    async fn write(
        &self,
        target: &str,
        payload: Option<&Payload>,
    ) -> Result<Payload, OperationError> {
        let auth = self.authorize(Verb::Write, target).await;
        let result = self.primitive.write(target, payload, auth.as_deref()).await;
        self.outcome(result).await
    }

    async fn delete(&self, target: &str) -> Result<(), OperationError> {
        let auth = self.authorize(Verb::Delete, target).await;
        let result = self.primitive.delete(target, auth.as_deref()).await;
        self.outcome(result).await
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    fn begin(&self, kind: OperationKind) -> OperationId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(id, %kind, "Operation issued");
        self.emit(OperationEvent::Begin { id, kind });
        id
    }

    fn settle<T>(
        &self,
        id: OperationId,
        kind: OperationKind,
        result: Result<T, OperationError>,
    ) -> Result<T, OperationError> {
        let event = match &result {
            Ok(_) => {
                info!(id, %kind, "Operation completed");
                OperationEvent::Completed { id, kind }
            }
            Err(OperationError::AuthenticationRequired { challenge }) => {
                warn!(id, %kind, %challenge, "Operation requires authentication");
                OperationEvent::AuthenticationRequired {
                    id,
                    kind,
                    challenge: challenge.clone(),
                }
            }
            Err(OperationError::NotFound { url }) => {
                warn!(id, %kind, %url, "Operation target not found");
                OperationEvent::NotFound {
                    id,
                    kind,
                    url: url.clone(),
                }
            }
            Err(err) => {
                warn!(id, %kind, error = %err, "Operation failed");
                OperationEvent::Failed {
                    id,
                    kind,
                    error: err.to_string(),
                }
            }
        };
        self.emit(event);
        result
    }

    fn emit(&self, event: OperationEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

/// Last path segment of `name`.
fn file_name(name: &str) -> &str {
    name.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(name)
}
