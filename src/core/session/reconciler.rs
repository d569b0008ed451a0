use crate::core::engine::ContainerEngine;
use crate::core::ports::PortAllocator;
use crate::core::session::registry::SessionTable;
use crate::core::session::session::{SessionId, SessionStatus};
use tracing::{info, warn};

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Sessions whose container still exists
    pub kept: Vec<SessionId>,
    /// Sessions removed because their container is gone
    pub purged: Vec<SessionId>,
    /// Sessions kept but marked unknown because the engine could not answer
    pub ambiguous: Vec<SessionId>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.purged.is_empty() && self.ambiguous.is_empty()
    }
}

/// Compare tracked sessions with the engine and purge the ones whose
/// container vanished. The caller holds the registry lock.
pub async fn reconcile(
    table: &mut SessionTable,
    engine: &dyn ContainerEngine,
    allocator: &PortAllocator,
) -> ReconcileReport {
    let mut report = ReconcileReport::default();

    for session in table.snapshot() {
        match engine.exists(&session.container_id).await {
            Ok(true) => report.kept.push(session.id),
            Ok(false) => {
                info!(
                    "Container {} for session {} no longer exists",
                    session.container_id, session.id
                );
                report.purged.push(session.id);
            }
            Err(e) => {
                warn!(
                    "Could not check container {} for session {}: {}",
                    session.container_id, session.id, e
                );
                table.set_status(&session.id, SessionStatus::Unknown);
                report.ambiguous.push(session.id);
            }
        }
    }

    for id in &report.purged {
        if let Some(session) = table.remove(id) {
            allocator.release_all(&session.host_ports());
            info!("Purged stale session {}", id);
        }
    }

    report
}
