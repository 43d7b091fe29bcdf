//! services/api/src/web/state.rs
//!
//! Defines the application's shared state and the per-user session registry.

use crate::config::Config;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tarot_journal_core::catalog::Catalog;
use tarot_journal_core::history::HistoryPager;
use tarot_journal_core::lifecycle::ReadingSession;
use tarot_journal_core::ports::{
    BlobStorage, InterpretationService, ReadingRepository, ReportRenderer,
};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

/// How long an untouched session survives in the registry. Eviction happens
/// on the next registry access; an unsaved in-memory reading is lost with
/// its session, while handlers holding a clone keep theirs alive.
const SESSION_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

//=========================================================================================
// AppState (Shared Across All Connections)
//=========================================================================================

/// The shared application state, created once at startup and passed to all
/// handlers. Port handles are process-wide and injected here explicitly;
/// nothing reaches for an ambient singleton.
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Arc<Catalog>,
    pub repository: Arc<dyn ReadingRepository>,
    pub interpreter: Arc<dyn InterpretationService>,
    pub renderer: Arc<dyn ReportRenderer>,
    pub blobs: Arc<dyn BlobStorage>,
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
}

//=========================================================================================
// UserSession (Specific to One User)
//=========================================================================================

/// The per-user session: one reading lifecycle and one history view.
///
/// The lifecycle sits behind an async mutex; handlers use `try_lock` so a
/// request arriving while an interpretation, save, or export is in flight is
/// rejected instead of queued. The pager carries its own in-flight guard.
#[derive(Clone)]
pub struct UserSession {
    pub lifecycle: Arc<Mutex<ReadingSession>>,
    pub history: Arc<HistoryPager>,
}

struct SessionEntry {
    session: UserSession,
    last_seen: Instant,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        catalog: Arc<Catalog>,
        repository: Arc<dyn ReadingRepository>,
        interpreter: Arc<dyn InterpretationService>,
        renderer: Arc<dyn ReportRenderer>,
        blobs: Arc<dyn BlobStorage>,
    ) -> Self {
        Self {
            config,
            catalog,
            repository,
            interpreter,
            renderer,
            blobs,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Finds or creates the session owned by one user. Each session owns its
    /// reading and history list exclusively; nothing is shared across users.
    /// Sessions idle past [`SESSION_IDLE_TTL`] are evicted here, keeping the
    /// registry bounded by the set of recently active users.
    pub async fn user_session(&self, user_id: Uuid) -> UserSession {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();
        sessions.retain(|id, entry| {
            *id == user_id || now.duration_since(entry.last_seen) < SESSION_IDLE_TTL
        });

        let entry = sessions.entry(user_id).or_insert_with(|| SessionEntry {
            session: UserSession {
                lifecycle: Arc::new(Mutex::new(ReadingSession::new(
                    user_id,
                    self.catalog.clone(),
                    self.repository.clone(),
                    self.interpreter.clone(),
                    self.renderer.clone(),
                    self.blobs.clone(),
                ))),
                history: Arc::new(HistoryPager::new(self.repository.clone(), user_id)),
            },
            last_seen: now,
        });
        entry.last_seen = now;
        entry.session.clone()
    }

    #[cfg(test)]
    async fn session_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
