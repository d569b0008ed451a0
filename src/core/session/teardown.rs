use crate::core::engine::ContainerEngine;
use crate::core::ports::PortAllocator;
use crate::core::session::registry::SessionTable;
use crate::domain::error::{CubeError, CubeResult, ErrorKind};
use tracing::{error, info, warn};

/// Result of a bulk teardown
#[derive(Debug, Default)]
pub struct BulkDeleteReport {
    /// Sessions tracked when the teardown started
    pub requested: usize,
    /// Sessions whose record and ports were reclaimed
    pub processed: usize,
    /// Removal failures, in the order they happened
    pub errors: Vec<(String, CubeError)>,
}

impl BulkDeleteReport {
    /// Count to report, or the first error if nothing could be processed
    pub fn into_result(self) -> CubeResult<usize> {
        if self.requested > 0 && self.processed == 0 {
            if let Some((_, err)) = self.errors.into_iter().next() {
                return Err(err);
            }
        }
        Ok(self.processed)
    }
}

/// A removal failure other than "already gone" is always reported as Upstream
fn as_removal_failure(err: CubeError, container_id: &str) -> CubeError {
    let what = format!("failed to remove container {}", container_id);
    match err.kind() {
        ErrorKind::Upstream => err.context(what),
        _ => CubeError::upstream(what, err),
    }
}

/// Tear down one session. The caller holds the registry lock.
///
/// A container that is already gone counts as removed. Any other failed
/// removal leaves the session tracked with its ports leased.
pub async fn delete_one(
    table: &mut SessionTable,
    engine: &dyn ContainerEngine,
    allocator: &PortAllocator,
    id: &str,
) -> CubeResult<()> {
    let container_id = match table.get(id) {
        Some(session) => session.container_id.clone(),
        None => return Err(CubeError::not_found(format!("session '{}'", id))),
    };

    info!("Deleting session {} (container {})", id, container_id);

    if let Err(e) = engine.stop(&container_id).await {
        warn!("Failed to stop container {}: {}", container_id, e);
    }

    match engine.remove(&container_id).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            warn!("Container {} for session {} was already gone", container_id, id);
        }
        Err(e) => {
            error!("Failed to remove container {}: {}", container_id, e);
            return Err(as_removal_failure(e, &container_id));
        }
    }

    if let Some(session) = table.remove(id) {
        allocator.release_all(&session.host_ports());
    }
    info!("Deleted session {}", id);
    Ok(())
}

/// Tear down every tracked session. The caller holds the registry lock.
///
/// Removal failures are recorded and the batch continues; records and
/// ports are reclaimed for every session regardless.
pub async fn delete_all(
    table: &mut SessionTable,
    engine: &dyn ContainerEngine,
    allocator: &PortAllocator,
) -> BulkDeleteReport {
    let ids = table.ids();
    let mut report = BulkDeleteReport {
        requested: ids.len(),
        ..Default::default()
    };

    info!("Deleting all {} session(s)", report.requested);

    for id in ids {
        let container_id = match table.get(&id) {
            Some(session) => session.container_id.clone(),
            None => continue,
        };

        if let Err(e) = engine.stop(&container_id).await {
            warn!("Failed to stop container {} for session {}: {}", container_id, id, e);
        }

        match engine.remove(&container_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                warn!("Container {} for session {} was already gone", container_id, id);
            }
            Err(e) => {
                error!("Failed to remove container {} for session {}: {}", container_id, id, e);
                report.errors.push((id.clone(), as_removal_failure(e, &container_id)));
            }
        }

        if let Some(session) = table.remove(&id) {
            allocator.release_all(&session.host_ports());
            report.processed += 1;
        }
    }

    if report.errors.is_empty() {
        info!("Deleted {} session(s)", report.processed);
    } else {
        warn!(
            "Deleted {} session(s) with {} removal error(s)",
            report.processed,
            report.errors.len()
        );
    }

    report
}
