use crate::core::{
    engine::{ContainerEngine, ContainerInspect, PortMapping},
    ports::{EphemeralProbe, PortAllocator, RangeProbe},
    session::{
        provisioning::ProvisioningWorkflow,
        reconciler::reconcile,
        registry::SessionRegistry,
        session::{CreateSessionRequest, Session, SessionStatus},
        teardown,
    },
};
use crate::domain::config::CubeConfig;
use crate::domain::error::{CubeError, CubeResult};
use crate::infrastructure::network;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Provisioning knobs taken from configuration
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Host placed in access URLs
    pub access_host: String,
    /// Upper bound on bindings per session
    pub max_ports_per_session: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            access_host: "localhost".to_string(),
            max_ports_per_session: 32,
        }
    }
}

/// Image summary returned to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageInfo {
    pub id: String,
    pub name: String,
    pub tag: String,
    /// Human size, e.g. "187.35 MB"
    pub size: String,
    /// RFC 3339 creation time
    pub created: String,
    pub exposed_ports: Vec<u16>,
}

/// Engine container annotated with the session that owns it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub status: String,
    pub created: DateTime<Utc>,
    pub ports: Vec<PortMapping>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub is_managed: bool,
}

/// Registry and allocator counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStatistics {
    pub total_sessions: usize,
    pub running_sessions: usize,
    pub unknown_sessions: usize,
    pub leased_ports: usize,
}

/// Format a byte count the way image listings show it
pub fn format_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Map an inspect result onto a session status
pub fn status_from_inspect(result: &CubeResult<ContainerInspect>) -> SessionStatus {
    match result {
        Ok(inspect) if inspect.running => SessionStatus::Running,
        Ok(inspect) => match inspect.status.as_str() {
            "running" => SessionStatus::Running,
            "exited" | "created" | "paused" => SessionStatus::Stopped,
            "dead" | "removing" => SessionStatus::Error,
            _ => SessionStatus::Unknown,
        },
        Err(e) if e.is_not_found() => SessionStatus::Stopped,
        Err(_) => SessionStatus::Unknown,
    }
}

/// Session orchestration entry point.
///
/// Cloning is cheap; every clone shares the same registry, allocator and
/// engine. Create, delete, delete-all and list run on a detached task so a
/// caller that goes away does not cut a workflow short.
#[derive(Clone)]
pub struct SessionManager {
    registry: Arc<SessionRegistry>,
    allocator: Arc<PortAllocator>,
    engine: Arc<dyn ContainerEngine>,
    settings: Arc<SessionSettings>,
}

impl SessionManager {
    /// Create a session manager from its parts
    pub fn new(
        registry: Arc<SessionRegistry>,
        allocator: Arc<PortAllocator>,
        engine: Arc<dyn ContainerEngine>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            registry,
            allocator,
            engine,
            settings: Arc::new(settings),
        }
    }

    /// Build a manager with an allocator and settings derived from configuration
    pub fn from_config(engine: Arc<dyn ContainerEngine>, config: &CubeConfig) -> CubeResult<Self> {
        config.validate().map_err(CubeError::config)?;

        let bind: IpAddr = config.ports.bind_address.parse().map_err(|_| {
            CubeError::config(format!("invalid ports.bind_address '{}'", config.ports.bind_address))
        })?;

        let allocator = match config.ports.range() {
            Some((start, end)) => {
                info!("Leasing host ports from {}-{}", start, end);
                PortAllocator::with_probe(Box::new(RangeProbe::new(bind, start, end)), config.ports.max_lease_attempts)
            }
            None => PortAllocator::with_probe(Box::new(EphemeralProbe::new(bind)), config.ports.max_lease_attempts),
        };

        let settings = SessionSettings {
            access_host: network::access_host(config.sessions.public_host.as_deref()),
            max_ports_per_session: config.sessions.max_ports_per_session,
        };
        info!("Access URLs will use host {}", settings.access_host);

        Ok(Self::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(allocator),
            engine,
            settings,
        ))
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn allocator(&self) -> &Arc<PortAllocator> {
        &self.allocator
    }

    pub fn engine(&self) -> &Arc<dyn ContainerEngine> {
        &self.engine
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Run `work` to completion on its own task, even if the caller is dropped
    async fn detached<F, T>(what: &'static str, work: F) -> CubeResult<T>
    where
        F: Future<Output = CubeResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        tokio::spawn(work)
            .await
            .map_err(|e| CubeError::internal(format!("{} task failed: {}", what, e)))?
    }

    /// Provision a container session
    pub async fn create_session(&self, request: CreateSessionRequest) -> CubeResult<Session> {
        let this = self.clone();
        Self::detached("create_session", async move {
            let mut table = this.registry.lock().await;

            let workflow = ProvisioningWorkflow::new(
                this.engine.as_ref(),
                &this.allocator,
                &this.settings.access_host,
                this.settings.max_ports_per_session,
            );
            let provisioned = workflow.run(&request).await?;

            if let Err(e) = table.insert(provisioned.session.clone()) {
                warn!("Failed to register session: {}", e);
                provisioned.abandon(this.engine.as_ref()).await;
                return Err(e);
            }

            let session = provisioned.commit();
            info!(
                "Created session {} for image {} (container {}, ports {:?})",
                session.id,
                session.image_name,
                session.container_id,
                session.host_ports()
            );
            Ok(session)
        })
        .await
    }

    /// List sessions after purging those whose container vanished
    pub async fn list_sessions(&self) -> CubeResult<Vec<Session>> {
        let this = self.clone();
        Self::detached("list_sessions", async move {
            let mut table = this.registry.lock().await;
            let report = reconcile(&mut table, this.engine.as_ref(), &this.allocator).await;
            if !report.is_clean() {
                info!(
                    "Reconciled sessions: {} kept, {} purged, {} unknown",
                    report.kept.len(),
                    report.purged.len(),
                    report.ambiguous.len()
                );
            }
            Ok(table.snapshot())
        })
        .await
    }

    /// Get one session with its status refreshed from the engine
    pub async fn get_session(&self, id: &str) -> CubeResult<Session> {
        let mut table = self.registry.lock().await;
        let container_id = match table.get(id) {
            Some(session) => session.container_id.clone(),
            None => return Err(CubeError::not_found(format!("session '{}'", id))),
        };

        let inspect = self.engine.inspect(&container_id).await;
        if let Err(e) = &inspect {
            debug!("Inspect of container {} failed: {}", container_id, e);
        }
        table.set_status(id, status_from_inspect(&inspect));

        table
            .get(id)
            .cloned()
            .ok_or_else(|| CubeError::not_found(format!("session '{}'", id)))
    }

    /// Tear down one session
    pub async fn delete_session(&self, id: &str) -> CubeResult<()> {
        let this = self.clone();
        let id = id.to_string();
        Self::detached("delete_session", async move {
            let mut table = this.registry.lock().await;
            teardown::delete_one(&mut table, this.engine.as_ref(), &this.allocator, &id).await
        })
        .await
    }

    /// Tear down every session; returns how many were processed
    pub async fn delete_all_sessions(&self) -> CubeResult<usize> {
        let this = self.clone();
        Self::detached("delete_all_sessions", async move {
            let mut table = this.registry.lock().await;
            teardown::delete_all(&mut table, this.engine.as_ref(), &this.allocator)
                .await
                .into_result()
        })
        .await
    }

    /// Images available to the engine
    pub async fn list_images(&self) -> CubeResult<Vec<ImageInfo>> {
        let images = self
            .engine
            .list_images()
            .await
            .map_err(|e| e.context("failed to list images"))?;

        Ok(images
            .into_iter()
            .map(|img| ImageInfo {
                id: img.id,
                name: img.repository,
                tag: img.tag,
                size: format_size(img.size_bytes),
                created: img.created.to_rfc3339(),
                exposed_ports: img.exposed_ports,
            })
            .collect())
    }

    /// Every engine container, marking the ones owned by a session
    pub async fn list_containers(&self) -> CubeResult<Vec<ContainerInfo>> {
        let containers = self
            .engine
            .list_containers()
            .await
            .map_err(|e| e.context("failed to list containers"))?;

        let table = self.registry.lock().await;
        Ok(containers
            .into_iter()
            .map(|c| {
                let session_id = table.find_by_container(&c.id).map(|s| s.id.clone());
                ContainerInfo {
                    is_managed: session_id.is_some(),
                    session_id,
                    id: c.id,
                    name: c.name,
                    image: c.image,
                    state: c.state,
                    status: c.status,
                    created: c.created,
                    ports: c.ports,
                }
            })
            .collect())
    }

    /// Remove a container; session-owned containers go through session teardown
    pub async fn delete_container(&self, container_id: &str) -> CubeResult<()> {
        let this = self.clone();
        let container_id = container_id.to_string();
        Self::detached("delete_container", async move {
            let mut table = this.registry.lock().await;

            if let Some(session_id) = table.find_by_container(&container_id).map(|s| s.id.clone()) {
                info!("Container {} belongs to session {}", container_id, session_id);
                return teardown::delete_one(&mut table, this.engine.as_ref(), &this.allocator, &session_id).await;
            }

            let exists = this.engine.exists(&container_id).await.map_err(|e| {
                CubeError::unknown(format!(
                    "could not determine whether container '{}' exists: {}",
                    container_id, e
                ))
            })?;
            if !exists {
                return Err(CubeError::not_found(format!("container '{}'", container_id)));
            }

            if let Err(e) = this.engine.stop(&container_id).await {
                warn!("Failed to stop container {}: {}", container_id, e);
            }
            this.engine
                .remove(&container_id)
                .await
                .map_err(|e| e.context(format!("failed to remove container {}", container_id)))?;

            info!("Removed unmanaged container {}", container_id);
            Ok(())
        })
        .await
    }

    /// Current counters
    pub async fn statistics(&self) -> SessionStatistics {
        let sessions = self.registry.snapshot().await;
        SessionStatistics {
            total_sessions: sessions.len(),
            running_sessions: sessions.iter().filter(|s| s.status == SessionStatus::Running).count(),
            unknown_sessions: sessions.iter().filter(|s| s.status == SessionStatus::Unknown).count(),
            leased_ports: self.allocator.leased_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::session::Protocol;
    use crate::infrastructure::simulated::SimulatedEngine;

    fn create_test_manager() -> (SessionManager, Arc<SimulatedEngine>) {
        let engine = Arc::new(SimulatedEngine::new());
        let manager = SessionManager::new(
            Arc::new(SessionRegistry::new()),
            Arc::new(PortAllocator::new()),
            engine.clone(),
            SessionSettings::default(),
        );
        (manager, engine)
    }

    #[tokio::test]
    async fn test_session_creation() {
        let (manager, _engine) = create_test_manager();

        let session = manager
            .create_session(CreateSessionRequest::new("nginx").with_num_ports(2))
            .await
            .unwrap();

        assert_eq!(session.status, SessionStatus::Running);
        assert_eq!(session.ports.len(), 2);
        assert_eq!(session.ports[0].url.as_deref(), Some(format!("http://localhost:{}", session.ports[0].host_port).as_str()));
        assert_eq!(manager.registry().len().await, 1);
        assert_eq!(manager.allocator().leased_count(), 2);
    }

    #[tokio::test]
    async fn test_blank_image_rejected() {
        let (manager, _engine) = create_test_manager();

        let err = manager.create_session(CreateSessionRequest::new("   ")).await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::error::ErrorKind::InvalidRequest);
        assert_eq!(manager.allocator().leased_count(), 0);
    }

    #[tokio::test]
    async fn test_too_many_ports_rejected() {
        let (manager, _engine) = create_test_manager();

        let err = manager
            .create_session(CreateSessionRequest::new("nginx").with_num_ports(33))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::domain::error::ErrorKind::InvalidRequest);
    }

    #[tokio::test]
    async fn test_creation_failure_rolls_back_ports() {
        let (manager, engine) = create_test_manager();
        engine.fail_create(true);

        let err = manager
            .create_session(CreateSessionRequest::new("nginx").with_num_ports(3))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), crate::domain::error::ErrorKind::Upstream);
        assert_eq!(manager.allocator().leased_count(), 0);
        assert!(manager.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_udp_mapping_has_no_url() {
        let (manager, _engine) = create_test_manager();

        let session = manager
            .create_session(CreateSessionRequest::new("busybox").with_mapping(53, Protocol::Udp, "DNS"))
            .await
            .unwrap();

        assert_eq!(session.ports[0].protocol, Protocol::Udp);
        assert_eq!(session.ports[0].description, "DNS");
        assert!(session.ports[0].url.is_none());
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let (manager, engine) = create_test_manager();

        let session = manager.create_session(CreateSessionRequest::new("nginx")).await.unwrap();
        let fetched = manager.get_session(&session.id).await.unwrap();
        assert_eq!(fetched.status, SessionStatus::Running);

        engine.stop(&session.container_id).await.unwrap();
        let fetched = manager.get_session(&session.id).await.unwrap();
        assert_eq!(fetched.status, SessionStatus::Stopped);

        manager.delete_session(&session.id).await.unwrap();
        assert!(manager.get_session(&session.id).await.unwrap_err().is_not_found());
        assert_eq!(manager.allocator().leased_count(), 0);
        assert!(!engine.exists(&session.container_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_operations_on_nonexistent() {
        let (manager, _engine) = create_test_manager();

        assert!(manager.get_session("nonexistent").await.unwrap_err().is_not_found());
        assert!(manager.delete_session("nonexistent").await.unwrap_err().is_not_found());
        assert!(manager.delete_container("nonexistent").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_failed_removal_keeps_session() {
        let (manager, engine) = create_test_manager();
        let session = manager.create_session(CreateSessionRequest::new("nginx")).await.unwrap();
        engine.fail_remove(&session.container_id);

        let err = manager.delete_session(&session.id).await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::error::ErrorKind::Upstream);
        assert!(manager.registry().get(&session.id).await.is_some());
        assert!(manager.allocator().is_leased(session.ports[0].host_port));
    }

    #[tokio::test]
    async fn test_container_listing_marks_managed() {
        let (manager, engine) = create_test_manager();
        let session = manager.create_session(CreateSessionRequest::new("nginx")).await.unwrap();
        let stray = engine.create_and_start("redis:7", &[]).await.unwrap();

        let containers = manager.list_containers().await.unwrap();
        assert_eq!(containers.len(), 2);

        let managed = containers.iter().find(|c| c.id == session.container_id).unwrap();
        assert!(managed.is_managed);
        assert_eq!(managed.session_id.as_deref(), Some(session.id.as_str()));

        let unmanaged = containers.iter().find(|c| c.id == stray).unwrap();
        assert!(!unmanaged.is_managed);
        assert!(unmanaged.session_id.is_none());
    }

    #[tokio::test]
    async fn test_delete_container_delegates_to_session() {
        let (manager, _engine) = create_test_manager();
        let session = manager.create_session(CreateSessionRequest::new("nginx")).await.unwrap();

        manager.delete_container(&session.container_id).await.unwrap();
        assert!(manager.registry().is_empty().await);
        assert_eq!(manager.allocator().leased_count(), 0);
    }

    #[tokio::test]
    async fn test_unmanaged_delete_with_unreachable_engine_is_unknown() {
        let (manager, engine) = create_test_manager();
        let stray = engine.create_and_start("nginx", &[]).await.unwrap();
        engine.fail_exists(true);

        let err = manager.delete_container(&stray).await.unwrap_err();
        assert_eq!(err.kind(), crate::domain::error::ErrorKind::Unknown);
        assert_eq!(engine.container_count(), 1);
    }

    #[test]
    fn test_from_config_rejects_inverted_range() {
        let mut config = CubeConfig::default();
        config.ports.min_port = 9000;
        config.ports.max_port = 8000;

        let engine = Arc::new(SimulatedEngine::new());
        let err = SessionManager::from_config(engine, &config).err().unwrap();
        assert!(matches!(err, CubeError::Config { .. }));
    }

    #[tokio::test]
    async fn test_statistics() {
        let (manager, engine) = create_test_manager();
        manager.create_session(CreateSessionRequest::new("nginx")).await.unwrap();
        manager.create_session(CreateSessionRequest::new("nginx").with_num_ports(2)).await.unwrap();

        let stats = manager.statistics().await;
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.running_sessions, 2);
        assert_eq!(stats.leased_ports, 3);

        engine.fail_exists(true);
        manager.list_sessions().await.unwrap();
        let stats = manager.statistics().await;
        assert_eq!(stats.unknown_sessions, 2);
    }

    #[test]
    fn test_status_mapping() {
        let inspect = |running: bool, status: &str| -> CubeResult<ContainerInspect> {
            Ok(ContainerInspect {
                running,
                started_at: None,
                restart_count: 0,
                status: status.to_string(),
            })
        };

        assert_eq!(status_from_inspect(&inspect(true, "running")), SessionStatus::Running);
        assert_eq!(status_from_inspect(&inspect(false, "exited")), SessionStatus::Stopped);
        assert_eq!(status_from_inspect(&inspect(false, "paused")), SessionStatus::Stopped);
        assert_eq!(status_from_inspect(&inspect(false, "created")), SessionStatus::Stopped);
        assert_eq!(status_from_inspect(&inspect(false, "dead")), SessionStatus::Error);
        assert_eq!(status_from_inspect(&inspect(false, "removing")), SessionStatus::Error);
        assert_eq!(status_from_inspect(&inspect(false, "restarting")), SessionStatus::Unknown);
        assert_eq!(status_from_inspect(&Err(CubeError::not_found("gone"))), SessionStatus::Stopped);
        assert_eq!(status_from_inspect(&Err(CubeError::upstream_msg("down"))), SessionStatus::Unknown);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0.00 MB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(196_446_208), "187.35 MB");
    }
}
