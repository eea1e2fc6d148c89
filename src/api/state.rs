use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::ai::chat::Session;
use crate::ai::model::ModelClient;
use crate::core::AppConfig;

/// A session behind its own lock. Whoever holds the lock owns the
/// session for the length of one turn.
pub type SharedSession = Arc<Mutex<Session>>;

pub type SharedState = Arc<RwLock<AppState>>;

struct SessionEntry {
    session: SharedSession,
    last_used: Instant,
}

pub struct AppState {
    pub config: AppConfig,
    pub model: Arc<dyn ModelClient>,
    // Live sessions keyed by session ID
    sessions: HashMap<String, SessionEntry>,
}

impl AppState {
    pub fn new(config: AppConfig, model: Arc<dyn ModelClient>) -> Self {
        Self {
            config,
            model,
            sessions: HashMap::new(),
        }
    }

    pub fn create_session(&mut self) -> (String, SharedSession) {
        let session = Session::start(self.model.as_ref());
        let id = session.id.clone();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(
            id.clone(),
            SessionEntry {
                session: Arc::clone(&shared),
                last_used: Instant::now(),
            },
        );
        tracing::info!("Created session {} ({} live)", id, self.session_count());
        (id, shared)
    }

    /// Looks up a session and marks it as used.
    pub fn find_session(&mut self, id: &str) -> Option<SharedSession> {
        self.sessions.get_mut(id).map(|entry| {
            entry.last_used = Instant::now();
            Arc::clone(&entry.session)
        })
    }

    /// Forgets the session. A turn that is still streaming keeps it
    /// alive until it finishes.
    pub fn end_session(&mut self, id: &str) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            tracing::info!("Ended session {} ({} live)", id, self.session_count());
        }
        removed
    }

    /// Ends every session that hasn't been used for `max_idle`. Sessions
    /// with a turn in flight are kept. Returns how many were ended.
    pub fn expire_idle(&mut self, max_idle: Duration) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| {
            entry.last_used.elapsed() < max_idle || entry.session.try_lock().is_err()
        });
        let expired = before - self.sessions.len();
        if expired > 0 {
            tracing::info!(
                "Expired {} idle sessions ({} live)",
                expired,
                self.session_count()
            );
        }
        expired
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Periodically ends sessions idle for longer than `max_idle`. Runs
/// until the shared state is poisoned.
pub async fn expire_idle_sessions(state: SharedState, max_idle: Duration) {
    let period = max_idle.clamp(Duration::from_secs(1), Duration::from_secs(60));
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;
        let expired = match state.write() {
            Ok(mut state) => state.expire_idle(max_idle),
            Err(e) => {
                tracing::error!("Unable to write shared state: {}", e);
                return;
            }
        };
        tracing::debug!("Idle session sweep ended {} sessions", expired);
    }
}
