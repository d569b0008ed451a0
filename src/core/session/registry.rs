use crate::core::session::session::{Session, SessionId, SessionStatus};
use crate::domain::error::{CubeError, CubeResult};
use std::collections::HashMap;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Tracked sessions, reachable only through the registry lock
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: HashMap<SessionId, Session>,
    /// container id -> session id
    containers: HashMap<String, SessionId>,
}

impl SessionTable {
    /// Insert a fully provisioned session.
    ///
    /// Fails if the id or the container is already tracked.
    pub fn insert(&mut self, session: Session) -> CubeResult<()> {
        if self.sessions.contains_key(&session.id) {
            return Err(CubeError::internal(format!("session '{}' is already registered", session.id)));
        }
        if let Some(owner) = self.containers.get(&session.container_id) {
            return Err(CubeError::internal(format!(
                "container '{}' already belongs to session '{}'",
                session.container_id, owner
            )));
        }

        debug!("Registering session {} (container {})", session.id, session.container_id);
        self.containers.insert(session.container_id.clone(), session.id.clone());
        self.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.contains_key(id)
    }

    /// Remove a session, returning it if it was tracked
    pub fn remove(&mut self, id: &str) -> Option<Session> {
        let session = self.sessions.remove(id)?;
        self.containers.remove(&session.container_id);
        debug!("Unregistered session {}", id);
        Some(session)
    }

    /// Set a session's status; false if the session is unknown
    pub fn set_status(&mut self, id: &str, status: SessionStatus) -> bool {
        match self.sessions.get_mut(id) {
            Some(session) => {
                session.status = status;
                true
            }
            None => false,
        }
    }

    /// Session owning a container, if any
    pub fn find_by_container(&self, container_id: &str) -> Option<&Session> {
        self.containers.get(container_id).and_then(|id| self.sessions.get(id))
    }

    /// Ids of all tracked sessions, oldest first
    pub fn ids(&self) -> Vec<SessionId> {
        self.snapshot().into_iter().map(|s| s.id).collect()
    }

    /// Clones of all tracked sessions, oldest first
    pub fn snapshot(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.sessions.values().cloned().collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Single source of truth for live sessions.
///
/// Every access goes through one async lock. Flows that mutate the table
/// hold the guard for their whole duration, engine calls included.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    table: Mutex<SessionTable>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire exclusive access to the table
    pub async fn lock(&self) -> MutexGuard<'_, SessionTable> {
        self.table.lock().await
    }

    /// Snapshot of one session
    pub async fn get(&self, id: &str) -> Option<Session> {
        self.table.lock().await.get(id).cloned()
    }

    /// Snapshot of all sessions, oldest first
    pub async fn snapshot(&self) -> Vec<Session> {
        self.table.lock().await.snapshot()
    }

    pub async fn len(&self) -> usize {
        self.table.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.lock().await.is_empty()
    }
}
