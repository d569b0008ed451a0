use crate::core::session::SessionManager;
use std::time::Instant;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionManager,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            sessions,
            started_at: Instant::now(),
        }
    }
}
