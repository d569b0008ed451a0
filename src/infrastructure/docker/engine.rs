use super::convert::{self, engine_error};
use crate::core::engine::{ContainerEngine, ContainerInspect, EngineContainer, EngineImage, PortMapping};
use crate::domain::config::EngineConfig;
use crate::domain::error::{CubeError, CubeResult};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions,
};
use bollard::image::ListImagesOptions;
use bollard::models::HostConfig;
use bollard::Docker;
use tracing::{debug, info, warn};

/// Container engine backed by a Docker daemon
pub struct DockerEngine {
    docker: Docker,
    stop_timeout_secs: i64,
}

impl DockerEngine {
    /// Connect using `engine.docker_host`, or the local defaults when unset
    pub fn connect(config: &EngineConfig) -> CubeResult<Self> {
        let timeout = config.api_timeout_secs;
        let docker = match config.docker_host.as_deref() {
            None => Docker::connect_with_local_defaults(),
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_socket(host, timeout, bollard::API_DEFAULT_VERSION)
            }
            Some(host) if host.starts_with("http://") || host.starts_with("tcp://") => {
                Docker::connect_with_http(host, timeout, bollard::API_DEFAULT_VERSION)
            }
            Some(host) => {
                return Err(CubeError::config(format!(
                    "unsupported engine.docker_host '{}' (expected unix://, tcp:// or http://)",
                    host
                )))
            }
        }
        .map_err(|e| CubeError::upstream("failed to connect to Docker", e))?;

        info!(
            "Docker engine configured ({})",
            config.docker_host.as_deref().unwrap_or("local defaults")
        );

        Ok(Self {
            docker: docker.with_timeout(std::time::Duration::from_secs(timeout)),
            stop_timeout_secs: config.stop_timeout_secs,
        })
    }

    /// Check that the daemon answers
    pub async fn ping(&self) -> CubeResult<()> {
        self.docker
            .ping()
            .await
            .map(|_| ())
            .map_err(|e| CubeError::upstream("Docker daemon is not reachable", e))
    }

    async fn exposed_ports(&self, image_id: &str) -> Vec<u16> {
        match self.docker.inspect_image(image_id).await {
            Ok(inspect) => convert::exposed_ports(inspect.config.as_ref().and_then(|c| c.exposed_ports.as_ref())),
            Err(e) => {
                debug!("Failed to inspect image {}: {}", image_id, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    fn name(&self) -> &'static str {
        "docker"
    }

    async fn create_and_start(&self, image: &str, bindings: &[PortMapping]) -> CubeResult<String> {
        let (exposed, published) = convert::port_maps(bindings);

        let host_config = HostConfig {
            port_bindings: Some(published),
            ..Default::default()
        };
        let config = Config {
            image: Some(image.to_string()),
            exposed_ports: Some(exposed),
            host_config: Some(host_config),
            tty: Some(true),
            open_stdin: Some(true),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(|e| CubeError::upstream(format!("failed to create container from {}", image), e))?;
        let container_id = response.id;
        for warning in &response.warnings {
            warn!("Docker warning for {}: {}", container_id, warning);
        }

        if let Err(e) = self
            .docker
            .start_container(&container_id, None::<StartContainerOptions<String>>)
            .await
        {
            warn!("Container {} failed to start, removing it", container_id);
            if let Err(remove_err) = self.remove(&container_id).await {
                warn!("Failed to remove container {}: {}", container_id, remove_err);
            }
            return Err(CubeError::upstream(format!("failed to start container {}", container_id), e));
        }

        debug!("Started container {} from {}", container_id, image);
        Ok(container_id)
    }

    async fn stop(&self, handle: &str) -> CubeResult<()> {
        match self
            .docker
            .stop_container(handle, Some(StopContainerOptions { t: self.stop_timeout_secs }))
            .await
        {
            Ok(()) => Ok(()),
            // Already stopped
            Err(e) if convert::status_code(&e) == Some(304) => Ok(()),
            Err(e) => Err(engine_error(format!("failed to stop container {}", handle), e)),
        }
    }

    async fn remove(&self, handle: &str) -> CubeResult<()> {
        self.docker
            .remove_container(
                handle,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| engine_error(format!("failed to remove container {}", handle), e))
    }

    async fn exists(&self, handle: &str) -> CubeResult<bool> {
        match self
            .docker
            .inspect_container(handle, None::<InspectContainerOptions>)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if convert::status_code(&e) == Some(404) => Ok(false),
            Err(e) => Err(CubeError::upstream(format!("failed to inspect container {}", handle), e)),
        }
    }

    async fn inspect(&self, handle: &str) -> CubeResult<ContainerInspect> {
        self.docker
            .inspect_container(handle, None::<InspectContainerOptions>)
            .await
            .map(convert::inspect_from_response)
            .map_err(|e| engine_error(format!("failed to inspect container {}", handle), e))
    }

    async fn list_images(&self) -> CubeResult<Vec<EngineImage>> {
        let summaries = self
            .docker
            .list_images(Some(ListImagesOptions::<String> {
                all: false,
                ..Default::default()
            }))
            .await
            .map_err(|e| CubeError::upstream("failed to list images", e))?;

        let mut images = Vec::new();
        for summary in summaries {
            if summary.repo_tags.is_empty() {
                continue;
            }
            let exposed = self.exposed_ports(&summary.id).await;
            images.extend(convert::images_from_summary(
                &summary.id,
                &summary.repo_tags,
                summary.size,
                summary.created,
                &exposed,
            ));
        }
        Ok(images)
    }

    async fn list_containers(&self) -> CubeResult<Vec<EngineContainer>> {
        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .map_err(|e| CubeError::upstream("failed to list containers", e))?;

        Ok(summaries.into_iter().map(convert::container_from_summary).collect())
    }
}
