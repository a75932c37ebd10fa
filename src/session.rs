//! Per-client selection state
//!
//! Each client session holds its last selected coordinate (last write wins)
//! and a generation counter. Each selection gets a fresh generation; a lookup
//! started for an older generation of the same session is stale and its
//! result is dropped. Sessions of different clients never affect each other.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;
use tracing::debug;

use crate::models::Coordinate;

/// Ticket returned by [`SelectionSession::select`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Selection {
    pub generation: u64,
    pub coordinate: Coordinate,
}

#[derive(Debug, Default)]
pub struct SelectionSession {
    generation: AtomicU64,
    last: RwLock<Option<Coordinate>>,
}

impl SelectionSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `coordinate` as the current selection
    pub fn select(&self, coordinate: Coordinate) -> Selection {
        let mut last = self.last.write().unwrap_or_else(PoisonError::into_inner);
        *last = Some(coordinate);
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(
            "Selected {} (generation {})",
            coordinate.format_coordinates(),
            generation
        );
        Selection {
            generation,
            coordinate,
        }
    }

    /// Whether no newer selection has been made since `selection`
    #[must_use]
    pub fn is_current(&self, selection: &Selection) -> bool {
        self.generation.load(Ordering::SeqCst) == selection.generation
    }

    #[must_use]
    pub fn last(&self) -> Option<Coordinate> {
        *self.last.read().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Request header carrying the client's session id
pub const SESSION_HEADER: &str = "x-session-id";

/// Sessions kept before the least recently used one is dropped
pub const MAX_SESSIONS: usize = 10_000;

/// Session ids are short opaque tokens chosen by the client
#[must_use]
pub fn is_valid_session_id(id: &str) -> bool {
    (1..=64).contains(&id.len())
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Selection sessions keyed by client session id
#[derive(Debug)]
pub struct SessionRegistry {
    capacity: usize,
    sessions: Mutex<HashMap<String, (Arc<SelectionSession>, Instant)>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_capacity(MAX_SESSIONS)
    }
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Session for `id`, created on first use
    pub fn session(&self, id: &str) -> Arc<SelectionSession> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();

        if let Some((session, seen)) = sessions.get_mut(id) {
            *seen = now;
            return Arc::clone(session);
        }

        if sessions.len() >= self.capacity {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, (_, seen))| *seen)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                debug!("Dropping idle session {}", oldest);
                sessions.remove(&oldest);
            }
        }

        let session = Arc::new(SelectionSession::new());
        sessions.insert(id.to_string(), (Arc::clone(&session), now));
        session
    }

    /// Existing session for `id`, without creating one
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<SelectionSession>> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        sessions.get(id).map(|(session, _)| Arc::clone(session))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
