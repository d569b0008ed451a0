//! In-process container engine.
//!
//! Keeps containers in memory and never touches a real runtime. Used by
//! `serve --engine simulated` and throughout the tests, where the fault
//! switches stand in for a misbehaving daemon.

use crate::core::engine::{ContainerEngine, ContainerInspect, EngineContainer, EngineImage, PortMapping};
use crate::core::session::Protocol;
use crate::domain::error::{CubeError, CubeResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct SimContainer {
    name: String,
    image: String,
    state: String,
    created: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ports: Vec<PortMapping>,
}

pub struct SimulatedEngine {
    images: Mutex<Vec<EngineImage>>,
    containers: Mutex<HashMap<String, SimContainer>>,
    latency: Duration,
    fail_create: AtomicBool,
    fail_exists: AtomicBool,
    fail_list_images: AtomicBool,
    fail_remove: Mutex<HashSet<String>>,
    create_calls: AtomicUsize,
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn seeded_image(repository: &str, tag: &str, size_bytes: u64, exposed_ports: &[u16]) -> EngineImage {
    EngineImage {
        id: format!("sha256:{}", Uuid::new_v4().simple()),
        repository: repository.to_string(),
        tag: tag.to_string(),
        size_bytes,
        created: Utc::now(),
        exposed_ports: exposed_ports.to_vec(),
    }
}

impl SimulatedEngine {
    /// Engine with a small catalogue of common images
    pub fn new() -> Self {
        let images = vec![
            seeded_image("nginx", "latest", 196_446_208, &[80]),
            seeded_image("postgres", "16", 451_936_256, &[5432]),
            seeded_image("redis", "7", 138_412_032, &[6379]),
            seeded_image("busybox", "latest", 4_404_019, &[]),
        ];
        Self::with_images(images)
    }

    pub fn with_images(images: Vec<EngineImage>) -> Self {
        Self {
            images: Mutex::new(images),
            containers: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
            fail_create: AtomicBool::new(false),
            fail_exists: AtomicBool::new(false),
            fail_list_images: AtomicBool::new(false),
            fail_remove: Mutex::new(HashSet::new()),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Delay every create by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Add an image exposing `exposed_ports`
    pub fn add_image(&self, repository: &str, tag: &str, exposed_ports: &[u16]) {
        guard(&self.images).push(seeded_image(repository, tag, 1024 * 1024, exposed_ports));
    }

    pub fn fail_create(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    pub fn fail_exists(&self, fail: bool) {
        self.fail_exists.store(fail, Ordering::SeqCst);
    }

    pub fn fail_list_images(&self, fail: bool) {
        self.fail_list_images.store(fail, Ordering::SeqCst);
    }

    /// Make every removal of `handle` fail
    pub fn fail_remove(&self, handle: &str) {
        guard(&self.fail_remove).insert(handle.to_string());
    }

    /// Delete a container behind the orchestrator's back
    pub fn vanish(&self, handle: &str) -> bool {
        guard(&self.containers).remove(handle).is_some()
    }

    pub fn container_count(&self) -> usize {
        guard(&self.containers).len()
    }

    /// Number of create calls, failed ones included
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    fn not_found(handle: &str) -> CubeError {
        CubeError::not_found(format!("no such container: {}", handle))
    }
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerEngine for SimulatedEngine {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn create_and_start(&self, image: &str, bindings: &[PortMapping]) -> CubeResult<String> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(CubeError::upstream_msg(format!("simulated create failure for {}", image)));
        }
        if !guard(&self.images).iter().any(|i| i.matches(image)) {
            return Err(CubeError::upstream_msg(format!("no such image: {}", image)));
        }

        let mut containers = guard(&self.containers);
        let published: HashSet<(u16, Protocol)> = containers
            .values()
            .flat_map(|c| c.ports.iter().map(|p| (p.host_port, p.protocol)))
            .collect();
        if let Some(taken) = bindings.iter().find(|b| published.contains(&(b.host_port, b.protocol))) {
            return Err(CubeError::upstream_msg(format!(
                "port {} is already allocated",
                taken.host_port
            )));
        }

        let id = format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let now = Utc::now();
        containers.insert(
            id.clone(),
            SimContainer {
                name: format!("cube-{}", &id[..12]),
                image: image.to_string(),
                state: "running".to_string(),
                created: now,
                started_at: Some(now),
                ports: bindings.to_vec(),
            },
        );
        debug!("Simulated container {} started from {}", id, image);
        Ok(id)
    }

    async fn stop(&self, handle: &str) -> CubeResult<()> {
        let mut containers = guard(&self.containers);
        let container = containers.get_mut(handle).ok_or_else(|| Self::not_found(handle))?;
        container.state = "exited".to_string();
        Ok(())
    }

    async fn remove(&self, handle: &str) -> CubeResult<()> {
        if guard(&self.fail_remove).contains(handle) {
            return Err(CubeError::upstream_msg(format!("simulated remove failure for {}", handle)));
        }
        guard(&self.containers)
            .remove(handle)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(handle))
    }

    async fn exists(&self, handle: &str) -> CubeResult<bool> {
        if self.fail_exists.load(Ordering::SeqCst) {
            return Err(CubeError::upstream_msg("simulated engine is unreachable"));
        }
        Ok(guard(&self.containers).contains_key(handle))
    }

    async fn inspect(&self, handle: &str) -> CubeResult<ContainerInspect> {
        let containers = guard(&self.containers);
        let container = containers.get(handle).ok_or_else(|| Self::not_found(handle))?;
        Ok(ContainerInspect {
            running: container.state == "running",
            started_at: container.started_at,
            restart_count: 0,
            status: container.state.clone(),
        })
    }

    async fn list_images(&self) -> CubeResult<Vec<EngineImage>> {
        if self.fail_list_images.load(Ordering::SeqCst) {
            return Err(CubeError::upstream_msg("simulated image listing failure"));
        }
        Ok(guard(&self.images).clone())
    }

    async fn list_containers(&self) -> CubeResult<Vec<EngineContainer>> {
        let mut containers: Vec<EngineContainer> = guard(&self.containers)
            .iter()
            .map(|(id, c)| EngineContainer {
                id: id.clone(),
                name: c.name.clone(),
                image: c.image.clone(),
                state: c.state.clone(),
                status: match c.state.as_str() {
                    "running" => "Up".to_string(),
                    _ => "Exited (0)".to_string(),
                },
                created: c.created,
                ports: c.ports.clone(),
            })
            .collect();
        containers.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(containers)
    }
}
