//! In-memory session registry.
//!
//! Upload and stream sessions live in two independent tables so an in-flight
//! upload never collides with viewers of the same identifier. Each table only
//! guards presence; every session carries its own lock for its payload.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use reel_core::MediaId;
use reel_storage::AppendHandle;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::time::Instant;

/// Concurrent map from identifier to a shared session.
pub struct SessionTable<S> {
    sessions: DashMap<String, Arc<S>>,
}

impl<S> SessionTable<S> {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Return the session for `id`, installing one built by `factory` if absent.
    ///
    /// Concurrent first callers converge on one instance. The flag is true for
    /// the single caller whose factory ran.
    pub fn get_or_create(&self, id: &str, factory: impl FnOnce() -> S) -> (Arc<S>, bool) {
        match self.sessions.entry(id.to_string()) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let session = Arc::new(factory());
                entry.insert(Arc::clone(&session));
                (session, true)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<S>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Remove `id` only if it still maps to `session`.
    ///
    /// A stale holder can never remove a newer session under the same id.
    pub fn remove_if_same(&self, id: &str, session: &Arc<S>) -> bool {
        self.sessions
            .remove_if(id, |_, current| Arc::ptr_eq(current, session))
            .is_some()
    }

    /// Clone out every entry so callers can visit them without holding shard locks.
    ///
    /// Entries inserted or removed while the snapshot is taken may or may not
    /// be included.
    pub fn snapshot(&self) -> Vec<(String, Arc<S>)> {
        self.sessions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl<S> Default for SessionTable<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Both session namespaces.
#[derive(Default)]
pub struct SessionRegistry {
    pub uploads: SessionTable<UploadSession>,
    pub streams: SessionTable<StreamSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

/// An in-flight upload.
pub struct UploadSession {
    id: MediaId,
    key: String,
    declared_size: u64,
    started_at: OffsetDateTime,
    /// Written size and last activity, readable without waiting on `io`.
    progress: parking_lot::Mutex<UploadProgress>,
    /// Exclusive append state. Held for the whole of one request body.
    pub(crate) io: tokio::sync::Mutex<UploadIo>,
}

/// Snapshot of an upload's progress.
#[derive(Clone, Copy, Debug)]
pub struct UploadProgress {
    pub written: u64,
    pub last_activity: Instant,
}

pub(crate) struct UploadIo {
    /// Open only while the upload is in the registry.
    pub(crate) handle: Option<Box<dyn AppendHandle>>,
    /// Set once the session has left the registry (completed or evicted).
    pub(crate) retired: bool,
}

impl UploadSession {
    pub fn new(id: MediaId, key: String, declared_size: u64, now: Instant) -> Self {
        Self {
            id,
            key,
            declared_size,
            started_at: OffsetDateTime::now_utc(),
            progress: parking_lot::Mutex::new(UploadProgress {
                written: 0,
                last_activity: now,
            }),
            io: tokio::sync::Mutex::new(UploadIo {
                handle: None,
                retired: false,
            }),
        }
    }

    pub fn id(&self) -> &MediaId {
        &self.id
    }

    /// Storage key of the destination file.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn declared_size(&self) -> u64 {
        self.declared_size
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    pub fn progress(&self) -> UploadProgress {
        *self.progress.lock()
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.progress.lock().last_activity)
    }

    pub fn is_complete(&self) -> bool {
        self.progress().written >= self.declared_size
    }

    /// Record `bytes` durably appended. Returns the new written size.
    pub(crate) fn record_write(&self, bytes: u64, now: Instant) -> u64 {
        let mut progress = self.progress.lock();
        progress.written += bytes;
        progress.last_activity = now;
        progress.written
    }

    pub(crate) fn touch(&self, now: Instant) {
        self.progress.lock().last_activity = now;
    }
}

/// Viewer presence for one identifier.
pub struct StreamSession {
    id: String,
    pub(crate) state: parking_lot::Mutex<StreamState>,
}

pub(crate) struct StreamState {
    pub(crate) viewers: u64,
    pub(crate) last_accessed: Instant,
    pub(crate) retired: bool,
}

impl StreamSession {
    pub fn new(id: impl Into<String>, now: Instant) -> Self {
        Self {
            id: id.into(),
            state: parking_lot::Mutex::new(StreamState {
                viewers: 0,
                last_accessed: now,
                retired: false,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn viewers(&self) -> u64 {
        self.state.lock().viewers
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.state.lock().last_accessed)
    }

    /// Register a viewer. Fails if the session was already evicted.
    pub(crate) fn join(&self, now: Instant) -> bool {
        let mut state = self.state.lock();
        if state.retired {
            return false;
        }
        state.viewers += 1;
        state.last_accessed = now;
        true
    }

    pub(crate) fn leave(&self, now: Instant) {
        let mut state = self.state.lock();
        state.viewers = state.viewers.saturating_sub(1);
        state.last_accessed = now;
    }

    pub(crate) fn touch(&self, now: Instant) {
        self.state.lock().last_accessed = now;
    }
}
