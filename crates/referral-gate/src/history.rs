use referral_types::{Session, SessionId, SessionStatus, UserId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Capability provided by the external usage-tracking collaborator.
///
/// The gate only ever asks one question: how many of this user's sessions
/// have completed, including the one whose event just fired.
pub trait SessionHistory {
    fn completed_session_count(&self, user: &UserId) -> u64;
}

/// In-memory session log standing in for the collaborator.
///
/// Records session lifecycles with terminal finality: once a session is
/// `Completed` or `Failed`, later transitions are ignored.
#[derive(Debug, Default)]
pub struct MemorySessionLog {
    sessions: Mutex<HashMap<SessionId, Session>>,
}

impl MemorySessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open an in-progress session for `user`.
    pub fn start(&self, user: &UserId) -> SessionId {
        let session = Session::start(user.clone());
        let id = session.id;
        self.lock().insert(id, session);
        id
    }

    /// Transition a session, honoring terminal finality. Returns the status
    /// the session ends up with, or `None` for an unknown session.
    pub fn transition(&self, id: SessionId, status: SessionStatus) -> Option<SessionStatus> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(&id)?;
        if !session.status.is_terminal() {
            session.status = status;
        }
        Some(session.status)
    }
}

impl SessionHistory for MemorySessionLog {
    fn completed_session_count(&self, user: &UserId) -> u64 {
        self.lock()
            .values()
            .filter(|s| s.user_id == *user && s.status == SessionStatus::Completed)
            .count() as u64
    }
}
