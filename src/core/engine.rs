//! Container engine gateway.
//!
//! Everything the orchestration core needs from a container runtime goes
//! through [`ContainerEngine`]. Implementations live in `infrastructure`.

use crate::core::session::Protocol;
use crate::domain::error::CubeResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Host to container port mapping handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PortMapping {
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: Protocol,
}

/// Typed subset of a container inspection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerInspect {
    pub running: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub restart_count: i64,
    /// Engine state string, e.g. "running", "exited"
    pub status: String,
}

/// Image known to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineImage {
    pub id: String,
    pub repository: String,
    pub tag: String,
    pub size_bytes: u64,
    pub created: DateTime<Utc>,
    pub exposed_ports: Vec<u16>,
}

impl EngineImage {
    /// Whether `name` refers to this image, as `repository:tag` or bare `repository`
    pub fn matches(&self, name: &str) -> bool {
        if self.repository == name {
            return true;
        }
        !self.tag.is_empty() && format!("{}:{}", self.repository, self.tag) == name
    }
}

/// Container known to the engine, managed or not
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub status: String,
    pub created: DateTime<Utc>,
    pub ports: Vec<PortMapping>,
}

/// Container engine gateway
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Create a container from `image` with `bindings` published and start it.
    /// Returns the container handle.
    async fn create_and_start(&self, image: &str, bindings: &[PortMapping]) -> CubeResult<String>;

    /// Stop a running container
    async fn stop(&self, handle: &str) -> CubeResult<()>;

    /// Force-remove a container
    async fn remove(&self, handle: &str) -> CubeResult<()>;

    /// Whether the container still exists
    async fn exists(&self, handle: &str) -> CubeResult<bool>;

    /// Inspect a container's runtime state
    async fn inspect(&self, handle: &str) -> CubeResult<ContainerInspect>;

    /// List locally available images
    async fn list_images(&self) -> CubeResult<Vec<EngineImage>>;

    /// List all containers, including stopped ones
    async fn list_containers(&self) -> CubeResult<Vec<EngineContainer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(repository: &str, tag: &str) -> EngineImage {
        EngineImage {
            id: "sha256:1".to_string(),
            repository: repository.to_string(),
            tag: tag.to_string(),
            size_bytes: 0,
            created: Utc::now(),
            exposed_ports: Vec::new(),
        }
    }

    #[test]
    fn test_image_matching() {
        let img = image("postgres", "16");
        assert!(img.matches("postgres"));
        assert!(img.matches("postgres:16"));
        assert!(!img.matches("postgres:15"));
        assert!(!img.matches("redis"));

        let untagged = image("scratchpad", "");
        assert!(untagged.matches("scratchpad"));
        assert!(!untagged.matches("scratchpad:"));
    }
}
