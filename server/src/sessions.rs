//! Live editor sessions.
//!
//! Each session is one editor plus its compositor behind a mutex, so the
//! events of a single session are applied one at a time while different
//! sessions proceed in parallel.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use pitch_core::{Compositor, EditorSession, PitchError, RenderCommand};
use tracing::info;
use uuid::Uuid;

use crate::error::ApiError;
use crate::FrameResponse;

pub struct SessionEntry {
    pub editor: EditorSession,
    pub compositor: Compositor,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl SessionEntry {
    fn new(canvas_height: u32) -> Self {
        let now = Utc::now();
        Self {
            editor: EditorSession::new(canvas_height),
            compositor: Compositor::new(),
            created_at: now,
            last_used: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_used = Utc::now();
    }

    /// Run `commands` through the compositor and encode the resulting frames.
    pub fn render(&mut self, commands: &[RenderCommand]) -> Result<Vec<FrameResponse>, PitchError> {
        self.compositor
            .execute(&self.editor, commands)
            .iter()
            .map(FrameResponse::from_frame)
            .collect()
    }
}

pub type SharedSession = Arc<Mutex<SessionEntry>>;

/// Lock a session, turning a poisoned mutex into an API error.
pub fn lock_session(session: &SharedSession) -> Result<MutexGuard<'_, SessionEntry>, ApiError> {
    session
        .lock()
        .map_err(|_| ApiError::InternalError("session state poisoned".to_string()))
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<DashMap<Uuid, SharedSession>>,
    max_sessions: usize,
    canvas_height: u32,
}

impl SessionStore {
    pub fn new(max_sessions: usize, canvas_height: u32) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            max_sessions: max_sessions.max(1),
            canvas_height,
        }
    }

    /// Create a session, evicting the least recently used one when full.
    pub fn create(&self) -> (Uuid, DateTime<Utc>) {
        while self.sessions.len() >= self.max_sessions {
            match self.least_recently_used() {
                Some(victim) => {
                    info!("Session limit reached, evicting {}", victim);
                    self.sessions.remove(&victim);
                }
                None => break,
            }
        }

        let id = Uuid::new_v4();
        let entry = SessionEntry::new(self.canvas_height);
        let created_at = entry.created_at;
        self.sessions.insert(id, Arc::new(Mutex::new(entry)));
        info!("Created session {} ({} live)", id, self.sessions.len());
        (id, created_at)
    }

    pub fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    pub fn remove(&self, id: &Uuid) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Oldest idle session. Sessions busy on another thread count as in use.
    fn least_recently_used(&self) -> Option<Uuid> {
        self.sessions
            .iter()
            .filter_map(|item| {
                let last_used = item.value().try_lock().ok()?.last_used;
                Some((*item.key(), last_used))
            })
            .min_by_key(|(_, last_used)| *last_used)
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_get_remove() {
        let store = SessionStore::new(4, 256);
        let (id, _) = store.create();
        assert!(store.get(&id).is_some());
        assert_eq!(store.len(), 1);
        assert!(store.remove(&id));
        assert!(!store.remove(&id));
        assert!(store.is_empty());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let store = SessionStore::new(2, 256);
        let (first, _) = store.create();
        let (second, _) = store.create();

        // Make `second` the older of the two.
        {
            let session = store.get(&second).unwrap();
            let mut entry = lock_session(&session).unwrap();
            entry.last_used = Utc::now() - chrono::Duration::seconds(60);
        }

        let (third, _) = store.create();
        assert_eq!(store.len(), 2);
        assert!(store.get(&first).is_some());
        assert!(store.get(&second).is_none());
        assert!(store.get(&third).is_some());
    }

    #[test]
    fn test_new_session_uses_configured_height() {
        let store = SessionStore::new(1, 128);
        let (id, _) = store.create();
        let session = store.get(&id).unwrap();
        assert_eq!(lock_session(&session).unwrap().editor.canvas_height(), 128);
    }
}
