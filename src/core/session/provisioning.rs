//! Provisioning workflow: request → port plan → leased ports → running
//! container → session record.
//!
//! Every step after the first lease either hands its resources on to the
//! next step or gives them back. Ports are held in a [`PortLease`] that
//! releases them when dropped, so any early exit leaves the allocator as it
//! was. The container is only created
//! once every port is leased, and the caller inserts the returned session
//! into the registry as the final step.

use crate::core::engine::{ContainerEngine, EngineImage, PortMapping};
use crate::core::ports::{PortAllocator, PortLease};
use crate::core::session::session::{CreateSessionRequest, PortBinding, Protocol, Session, SessionStatus};
use crate::domain::error::{CubeError, CubeResult};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// First container port used when only a port count is requested
pub const GENERIC_PORT_BASE: u16 = 8080;

/// One planned binding, before a host port is leased for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedPort {
    pub container_port: u16,
    pub protocol: Protocol,
    pub description: String,
}

impl PlannedPort {
    fn tcp(container_port: u16, description: String) -> Self {
        Self {
            container_port,
            protocol: Protocol::Tcp,
            description,
        }
    }
}

/// Where a port plan came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanSource {
    Explicit,
    Count,
    Image,
    Fallback,
}

/// Human description for a well-known container port
pub fn describe_port(port: u16) -> String {
    match port {
        80 | 8080 => "HTTP".to_string(),
        443 | 8443 => "HTTPS".to_string(),
        22 => "SSH".to_string(),
        3306 => "MySQL".to_string(),
        5432 => "PostgreSQL".to_string(),
        27017 => "MongoDB".to_string(),
        6379 => "Redis".to_string(),
        other => format!("Port {}", other),
    }
}

/// Plan derived from the request alone (explicit mappings, then port count)
pub fn plan_from_request(request: &CreateSessionRequest) -> Option<(PlanSource, Vec<PlannedPort>)> {
    if !request.port_mappings.is_empty() {
        let plan = request
            .port_mappings
            .iter()
            .map(|m| PlannedPort {
                container_port: m.container_port,
                protocol: m.protocol.unwrap_or_default(),
                description: m
                    .description
                    .clone()
                    .filter(|d| !d.trim().is_empty())
                    .unwrap_or_else(|| format!("Port {}", m.container_port)),
            })
            .collect();
        return Some((PlanSource::Explicit, plan));
    }

    match request.num_ports {
        Some(count) if count > 0 => {
            let plan = (0..count)
                .map(|i| PlannedPort::tcp(GENERIC_PORT_BASE + i as u16, format!("Port {}", i + 1)))
                .collect();
            Some((PlanSource::Count, plan))
        }
        _ => None,
    }
}

/// Plan derived from the image's exposed ports, or the single HTTP fallback
pub fn plan_from_image(image_name: &str, images: &[EngineImage]) -> (PlanSource, Vec<PlannedPort>) {
    let exposed = images
        .iter()
        .find(|img| img.matches(image_name))
        .map(|img| img.exposed_ports.as_slice())
        .unwrap_or_default();

    if exposed.is_empty() {
        return (PlanSource::Fallback, vec![PlannedPort::tcp(80, "HTTP".to_string())]);
    }

    let plan = exposed
        .iter()
        .map(|port| PlannedPort::tcp(*port, describe_port(*port)))
        .collect();
    (PlanSource::Image, plan)
}

/// Access URL for a binding; only tcp bindings get one
pub fn access_url(host: &str, host_port: u16, container_port: u16, protocol: Protocol) -> Option<String> {
    if protocol != Protocol::Tcp {
        return None;
    }
    let scheme = match container_port {
        443 | 8443 => "https",
        _ => "http",
    };
    Some(format!("{}://{}:{}", scheme, host, host_port))
}

/// A container that is running with leased ports but not yet registered
pub struct Provisioned {
    pub session: Session,
    lease: PortLease,
}

impl Provisioned {
    /// Ports stay leased from here on; the registry owns them through the session
    pub fn commit(self) -> Session {
        self.lease.commit();
        self.session
    }

    /// Undo a provisioned session that could not be registered
    pub async fn abandon(self, engine: &dyn ContainerEngine) {
        let container_id = &self.session.container_id;
        warn!("Abandoning container {} for session {}", container_id, self.session.id);
        if let Err(e) = engine.remove(container_id).await {
            error!("Failed to remove abandoned container {}: {}", container_id, e);
        }
        // Dropping the lease releases the ports
        drop(self.lease);
    }
}

/// Runs the provisioning steps against an engine and allocator
pub struct ProvisioningWorkflow<'a> {
    engine: &'a dyn ContainerEngine,
    allocator: &'a Arc<PortAllocator>,
    access_host: &'a str,
    max_ports: usize,
}

impl<'a> ProvisioningWorkflow<'a> {
    pub fn new(
        engine: &'a dyn ContainerEngine,
        allocator: &'a Arc<PortAllocator>,
        access_host: &'a str,
        max_ports: usize,
    ) -> Self {
        Self {
            engine,
            allocator,
            access_host,
            max_ports,
        }
    }

    /// Reject requests that can never succeed
    pub fn validate(&self, request: &CreateSessionRequest) -> CubeResult<()> {
        if request.image_name.trim().is_empty() {
            return Err(CubeError::invalid_request("image_name is required"));
        }
        // num_ports is ignored once explicit mappings are given
        if let Some(count) = request.num_ports.filter(|_| request.port_mappings.is_empty()) {
            if count > self.max_ports {
                return Err(CubeError::invalid_request(format!(
                    "num_ports {} exceeds the limit of {}",
                    count, self.max_ports
                )));
            }
            if count > usize::from(u16::MAX - GENERIC_PORT_BASE) {
                return Err(CubeError::invalid_request(format!("num_ports {} is out of range", count)));
            }
        }
        if request.port_mappings.len() > self.max_ports {
            return Err(CubeError::invalid_request(format!(
                "{} port mappings exceed the limit of {}",
                request.port_mappings.len(),
                self.max_ports
            )));
        }
        if request.port_mappings.iter().any(|m| m.container_port == 0) {
            return Err(CubeError::invalid_request("container_port must be between 1 and 65535"));
        }
        Ok(())
    }

    /// Step 1: resolve the port plan
    pub async fn plan(&self, request: &CreateSessionRequest) -> CubeResult<Vec<PlannedPort>> {
        let image_name = request.image_name.trim();

        let (source, plan) = match plan_from_request(request) {
            Some(found) => found,
            None => {
                info!("Detecting exposed ports for image {}", image_name);
                let images = self
                    .engine
                    .list_images()
                    .await
                    .map_err(|e| e.context("failed to list images"))?;
                plan_from_image(image_name, &images)
            }
        };

        match source {
            PlanSource::Explicit => info!("Using {} explicit port mapping(s) for image {}", plan.len(), image_name),
            PlanSource::Count => info!("Using {} generic port(s) for image {}", plan.len(), image_name),
            PlanSource::Image => info!(
                "Using exposed ports {:?} from image {}",
                plan.iter().map(|p| p.container_port).collect::<Vec<_>>(),
                image_name
            ),
            PlanSource::Fallback => warn!("No exposed ports detected for image {}, using default HTTP port", image_name),
        }

        Ok(plan)
    }

    /// Steps 1-4. The returned container is running and its ports leased,
    /// but the session is not yet visible to anyone.
    pub async fn run(&self, request: &CreateSessionRequest) -> CubeResult<Provisioned> {
        self.validate(request)?;
        let image_name = request.image_name.trim();
        let plan = self.plan(request).await?;

        // Step 2: lease; a partial lease is dropped (released) on error
        let lease = self.allocator.lease_many(plan.len()).map_err(|e| {
            error!("Failed to lease host ports for image {}: {}", image_name, e);
            e.context("failed to get available port")
        })?;

        let mappings: Vec<PortMapping> = plan
            .iter()
            .zip(lease.ports())
            .map(|(planned, host_port)| PortMapping {
                host_port: *host_port,
                container_port: planned.container_port,
                protocol: planned.protocol,
            })
            .collect();

        info!("Creating container for image {} with {} port mapping(s)", image_name, mappings.len());
        for (i, m) in mappings.iter().enumerate() {
            debug!("Port {}: {} -> {}/{}", i + 1, m.host_port, m.container_port, m.protocol);
        }

        // Step 3: create and start; the lease rolls back if this fails
        let container_id = match self.engine.create_and_start(image_name, &mappings).await {
            Ok(id) => id,
            Err(e) => {
                error!("Failed to create container for image {}: {}", image_name, e);
                return Err(e.context("failed to create container"));
            }
        };

        // Step 4: access metadata
        let ports = plan
            .into_iter()
            .zip(mappings.iter())
            .map(|(planned, m)| PortBinding {
                host_port: m.host_port,
                container_port: m.container_port,
                protocol: m.protocol,
                url: access_url(self.access_host, m.host_port, m.container_port, m.protocol),
                description: planned.description,
            })
            .collect();

        let session = Session {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            image_name: image_name.to_string(),
            container_id,
            ports,
            status: SessionStatus::Running,
        };

        Ok(Provisioned { session, lease })
    }
}
