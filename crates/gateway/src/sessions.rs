//! Per-session conversation histories.
//!
//! Each session owns one [`ConversationHistory`] behind its own mutex. A turn
//! holds that mutex from history read to history write, so one session's
//! questions are answered strictly in order while other sessions proceed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gamewizard_core::history::ConversationHistory;
use gamewizard_core::session::SessionId;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

pub type SharedHistory = Arc<Mutex<ConversationHistory>>;

struct SessionSlot {
    history: SharedHistory,
    created_at: DateTime<Utc>,
    last_used: DateTime<Utc>,
}

/// Bounded map of live sessions, evicting the least recently used.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionSlot>>,
    max_sessions: usize,
    history_capacity: usize,
}

impl SessionStore {
    pub fn new(max_sessions: usize, history_capacity: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            history_capacity,
        }
    }

    /// The session's history, creating an empty one on first use.
    ///
    /// The flag is `true` when this call created the session.
    pub async fn checkout(&self, id: &SessionId) -> (SharedHistory, bool) {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;

        if let Some(slot) = sessions.get_mut(id) {
            slot.last_used = now;
            return (slot.history.clone(), false);
        }

        if sessions.len() >= self.max_sessions {
            if let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, s)| s.last_used)
                .map(|(k, _)| k.clone())
            {
                debug!(session = %oldest, "Evicting least recently used session");
                sessions.remove(&oldest);
            }
        }

        let history = Arc::new(Mutex::new(ConversationHistory::new(self.history_capacity)));
        sessions.insert(
            id.clone(),
            SessionSlot {
                history: history.clone(),
                created_at: now,
                last_used: now,
            },
        );
        (history, true)
    }

    /// Forget a session that has not recorded a single turn.
    ///
    /// A session whose history is locked by an in-flight turn is kept.
    pub async fn discard_if_empty(&self, id: &SessionId) {
        let mut sessions = self.sessions.write().await;
        let empty = sessions
            .get(id)
            .and_then(|slot| slot.history.try_lock().ok().map(|h| h.is_empty()))
            .unwrap_or(false);
        if empty {
            debug!(session = %id, "Discarding unused session");
            sessions.remove(id);
        }
    }

    /// An existing session's history, without creating one.
    pub async fn get(&self, id: &SessionId) -> Option<SharedHistory> {
        self.sessions.read().await.get(id).map(|s| s.history.clone())
    }

    pub async fn created_at(&self, id: &SessionId) -> Option<DateTime<Utc>> {
        self.sessions.read().await.get(id).map(|s| s.created_at)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
