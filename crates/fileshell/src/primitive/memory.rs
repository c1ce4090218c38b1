//! In-memory file service.
//!
//! `MemoryPrimitive` behaves like the HTTP service from the client's point of
//! view: directories answer reads with a JSON listing (sentinel included),
//! writes to `/`-terminated targets create directories, and missing targets
//! answer not-found. Every call is recorded so callers can assert on the exact
//! request sequence, and failures can be scripted per verb and target.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use bytes::Bytes;
use protocol::{DirEntry, Listing, Payload, Session, CONTENT_TYPE_JSON, ENTRY_TYPE_DIRECTORY, ENTRY_TYPE_FILE};

use super::{PrimitiveError, RemoteFilePrimitive, Verb};

/// One call observed by the in-memory service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub verb: Verb,
    pub target: String,
    pub authorization: Option<String>,
}

/// Access rule enforced on every call.
#[derive(Debug, Clone)]
struct AccessRule {
    challenge: String,
    accepted: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, Bytes>,
    dirs: BTreeSet<String>,
    calls: Vec<RecordedCall>,
    scripted: HashMap<(Verb, String), VecDeque<PrimitiveError>>,
    probe_failures: VecDeque<PrimitiveError>,
    access: Option<AccessRule>,
    identity: Option<Session>,
}

/// In-memory implementation of [`RemoteFilePrimitive`].
#[derive(Debug)]
pub struct MemoryPrimitive {
    state: Mutex<MemoryState>,
}

impl Default for MemoryPrimitive {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryPrimitive {
    /// Create an empty service containing only the root directory.
    pub fn new() -> Self {
        let mut state = MemoryState::default();
        state.dirs.insert("/".to_string());
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // Only a panicking test can poison this lock
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a file, creating its parent directories.
    pub fn insert_file(&self, path: &str, data: impl Into<Bytes>) {
        let mut state = self.lock();
        add_parents(&mut state.dirs, path);
        state.files.insert(path.to_string(), data.into());
    }

    /// Builder-style [`insert_file`](Self::insert_file).
    pub fn with_file(self, path: &str, data: impl Into<Bytes>) -> Self {
        self.insert_file(path, data);
        self
    }

    /// Identity returned by successful probes.
    pub fn with_identity(self, session: Session) -> Self {
        self.lock().identity = Some(session);
        self
    }

    /// Require every call to carry `accepted` as its `Authorization` value.
    ///
    /// Calls without it fail with `challenge`. `None` rejects everything.
    pub fn require_authorization(&self, challenge: &str, accepted: Option<&str>) {
        self.lock().access = Some(AccessRule {
            challenge: challenge.to_string(),
            accepted: accepted.map(str::to_string),
        });
    }

    /// Drop any access rule.
    pub fn allow_all(&self) {
        self.lock().access = None;
    }

    /// Make the next `verb` call on `target` fail with `error`.
    pub fn fail_next(&self, verb: Verb, target: &str, error: PrimitiveError) {
        self.lock()
            .scripted
            .entry((verb, target.to_string()))
            .or_default()
            .push_back(error);
    }

    /// Make the next probe fail with `error`.
    pub fn fail_next_probe(&self, error: PrimitiveError) {
        self.lock().probe_failures.push_back(error);
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.lock().files.contains_key(path)
    }

    pub fn contains_dir(&self, path: &str) -> bool {
        self.lock().dirs.contains(&dir_key(path))
    }

    pub fn file(&self, path: &str) -> Option<Bytes> {
        self.lock().files.get(path).cloned()
    }

    /// All calls observed so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Observed calls reduced to `(verb, target)` pairs.
    pub fn call_log(&self) -> Vec<(Verb, String)> {
        self.lock()
            .calls
            .iter()
            .map(|call| (call.verb, call.target.clone()))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Record the call and apply scripted failures and access rules.
    fn admit(
        state: &mut MemoryState,
        verb: Verb,
        target: &str,
        authorization: Option<&str>,
    ) -> Result<(), PrimitiveError> {
        state.calls.push(RecordedCall {
            verb,
            target: target.to_string(),
            authorization: authorization.map(str::to_string),
        });

        if let Some(queue) = state.scripted.get_mut(&(verb, target.to_string())) {
            if let Some(error) = queue.pop_front() {
                return Err(error);
            }
        }

        check_access(state, authorization)
    }

    fn listing(state: &MemoryState, dir: &str) -> Listing {
        let children = |path: &str| {
            path.strip_prefix(dir)
                .filter(|rest| !rest.is_empty())
                .map(|rest| rest.trim_end_matches('/'))
                .filter(|rest| !rest.contains('/'))
                .map(str::to_string)
        };

        let mut entries: Vec<DirEntry> = state
            .dirs
            .iter()
            .filter_map(|path| children(path))
            .map(|name| DirEntry {
                name,
                size: None,
                kind: Some(ENTRY_TYPE_DIRECTORY),
                mime: Some("inode/directory".to_string()),
            })
            .collect();
        entries.extend(state.files.iter().filter_map(|(path, data)| {
            children(path).map(|name| DirEntry {
                name,
                size: Some(format!("{} B", data.len())),
                kind: Some(ENTRY_TYPE_FILE),
                mime: None,
            })
        }));

        Listing {
            directory: Some(dir.to_string()),
            entries,
        }
    }
}

impl RemoteFilePrimitive for MemoryPrimitive {
    fn request_uri(&self, target: &str) -> String {
        target.to_string()
    }

    fn locate(&self, target: &str) -> String {
        format!("memory://{target}")
    }

    async fn read(
        &self,
        target: &str,
        authorization: Option<&str>,
    ) -> Result<Payload, PrimitiveError> {
        let mut state = self.lock();
        Self::admit(&mut state, Verb::Read, target, authorization)?;

        if let Some(data) = state.files.get(target) {
            return Ok(Payload::new(
                data.clone(),
                Some("application/octet-stream".to_string()),
            ));
        }

        let dir = dir_key(target);
        if state.dirs.contains(&dir) {
            let body = Self::listing(&state, &dir)
                .to_json()
                .map_err(|e| PrimitiveError::transport(500, e.to_string()))?;
            return Ok(Payload::new(body, Some(CONTENT_TYPE_JSON.to_string())));
        }

        Err(not_found(target))
    }

    async fn write(
        &self,
        target: &str,
        payload: Option<&Payload>,
        authorization: Option<&str>,
    ) -> Result<Payload, PrimitiveError> {
        let mut state = self.lock();
        Self::admit(&mut state, Verb::Write, target, authorization)?;

        let parent = parent_dir(target);
        if !state.dirs.contains(&parent) {
            return Err(not_found(&parent));
        }

        match payload {
            None if target.ends_with('/') => {
                state.dirs.insert(dir_key(target));
            }
            _ => {
                let data = payload.map(|p| p.data.clone()).unwrap_or_default();
                state.files.insert(target.to_string(), data);
            }
        }

        Payload::json(&serde_json::json!({"method": "PUT", "result": "OK", "name": target}))
            .map_err(|e| PrimitiveError::transport(500, e.to_string()))
    }

    async fn update(
        &self,
        target: &str,
        payload: &Payload,
        authorization: Option<&str>,
    ) -> Result<Payload, PrimitiveError> {
        let mut state = self.lock();
        Self::admit(&mut state, Verb::Update, target, authorization)?;

        match state.files.get_mut(target) {
            Some(data) => {
                *data = payload.data.clone();
                Ok(payload.clone())
            }
            None => Err(not_found(target)),
        }
    }

    async fn delete(
        &self,
        target: &str,
        authorization: Option<&str>,
    ) -> Result<(), PrimitiveError> {
        let mut state = self.lock();
        Self::admit(&mut state, Verb::Delete, target, authorization)?;

        if state.files.remove(target).is_some() {
            return Ok(());
        }

        let dir = dir_key(target);
        if dir != "/" && state.dirs.remove(&dir) {
            state.dirs.retain(|path| !path.starts_with(&dir));
            state.files.retain(|path, _| !path.starts_with(&dir));
            return Ok(());
        }

        Err(not_found(target))
    }

    async fn probe(&self, authorization: Option<&str>) -> Result<Option<Session>, PrimitiveError> {
        let mut state = self.lock();
        Self::admit(&mut state, Verb::Read, "/", authorization)?;
        if let Some(error) = state.probe_failures.pop_front() {
            return Err(error);
        }
        Ok(state.identity.clone())
    }
}

fn check_access(state: &MemoryState, authorization: Option<&str>) -> Result<(), PrimitiveError> {
    match &state.access {
        Some(rule) if rule.accepted.is_none() || rule.accepted.as_deref() != authorization => {
            Err(PrimitiveError::AuthenticationRequired {
                challenge: Some(rule.challenge.clone()),
            })
        }
        _ => Ok(()),
    }
}

fn not_found(target: &str) -> PrimitiveError {
    PrimitiveError::NotFound {
        url: format!("memory://{target}"),
    }
}

/// `/a/b` and `/a/b/` both name the directory key `/a/b/`.
fn dir_key(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

/// Parent directory key of a file or directory target.
fn parent_dir(target: &str) -> String {
    let trimmed = target.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(index) => trimmed[..=index].to_string(),
        None => "/".to_string(),
    }
}

fn add_parents(dirs: &mut BTreeSet<String>, path: &str) {
    let mut parent = parent_dir(path);
    while parent != "/" {
        let next = parent_dir(&parent);
        dirs.insert(parent);
        parent = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_file_and_listing() {
        let memory = MemoryPrimitive::new()
            .with_file("/docs/a.txt", "alpha")
            .with_file("/docs/sub/b.txt", "beta");

        let payload = memory.read("/docs/a.txt", None).await.unwrap();
        assert_eq!(payload.data, Bytes::from("alpha"));

        let listing = memory.read("/docs/", None).await.unwrap();
        assert!(listing.is_json());
        let listing = Listing::from_json(&listing.data).unwrap();
        let names: Vec<_> = listing.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["sub", "a.txt"]);
    }

    #[tokio::test]
    async fn test_listing_body_carries_sentinel() {
        let memory = MemoryPrimitive::new().with_file("/a.txt", "x");
        let payload = memory.read("/", None).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&payload.data).unwrap();
        let content = value["content"].as_array().unwrap();
        assert_eq!(content.last().unwrap(), &serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_write_requires_parent() {
        let memory = MemoryPrimitive::new();
        let result = memory
            .write("/missing/a.txt", Some(&Payload::bytes("x")), None)
            .await;
        assert!(matches!(result, Err(PrimitiveError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_write_without_payload_creates_directory() {
        let memory = MemoryPrimitive::new();
        memory.write("/new/", None, None).await.unwrap();
        assert!(memory.contains_dir("/new"));
    }

    #[tokio::test]
    async fn test_delete_directory_removes_children() {
        let memory = MemoryPrimitive::new().with_file("/d/x.txt", "x");
        memory.delete("/d/", None).await.unwrap();
        assert!(!memory.contains_dir("/d/"));
        assert!(!memory.contains_file("/d/x.txt"));
    }

    #[tokio::test]
    async fn test_scripted_failure_applies_once() {
        let memory = MemoryPrimitive::new().with_file("/a", "x");
        memory.fail_next(Verb::Read, "/a", PrimitiveError::transport(500, "boom"));

        assert!(memory.read("/a", None).await.is_err());
        assert!(memory.read("/a", None).await.is_ok());
        assert_eq!(memory.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_access_rule() {
        let memory = MemoryPrimitive::new().with_file("/a", "x");
        memory.require_authorization("Basic realm=\"m\"", Some("Basic abc"));

        let denied = memory.read("/a", Some("Basic wrong")).await;
        assert_eq!(
            denied,
            Err(PrimitiveError::AuthenticationRequired {
                challenge: Some("Basic realm=\"m\"".to_string())
            })
        );
        assert!(memory.read("/a", Some("Basic abc")).await.is_ok());
        assert_eq!(
            memory.calls()[1].authorization.as_deref(),
            Some("Basic abc")
        );
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir("/a/b.txt"), "/a/");
        assert_eq!(parent_dir("/a/b/"), "/a/");
        assert_eq!(parent_dir("/a"), "/");
    }
}
