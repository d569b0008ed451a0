// Conversions between Docker API shapes and engine types
use crate::core::engine::{ContainerInspect, EngineContainer, EngineImage, PortMapping};
use crate::core::session::Protocol;
use crate::domain::error::CubeError;
use bollard::models::{ContainerInspectResponse, ContainerSummary, PortBinding as DockerPortBinding};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// `"<port>/<proto>"` key used by the Docker API
pub fn port_key(container_port: u16, protocol: Protocol) -> String {
    format!("{}/{}", container_port, protocol)
}

/// Parse `"80/tcp"` (or a bare `"80"`) into a port number
pub fn parse_port_key(key: &str) -> Option<u16> {
    key.split('/').next()?.parse().ok()
}

/// Exposed-port and host-binding maps for a container create call
pub fn port_maps(
    bindings: &[PortMapping],
) -> (
    HashMap<String, HashMap<(), ()>>,
    HashMap<String, Option<Vec<DockerPortBinding>>>,
) {
    let mut exposed = HashMap::new();
    let mut published: HashMap<String, Option<Vec<DockerPortBinding>>> = HashMap::new();

    for binding in bindings {
        let key = port_key(binding.container_port, binding.protocol);
        exposed.insert(key.clone(), HashMap::new());
        published
            .entry(key)
            .or_insert_with(|| Some(Vec::new()))
            .get_or_insert_with(Vec::new)
            .push(DockerPortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: Some(binding.host_port.to_string()),
            });
    }

    (exposed, published)
}

/// Split a repo tag into repository and tag.
///
/// A colon inside a registry host (`localhost:5000/app`) is not a tag separator.
pub fn split_repo_tag(repo_tag: &str) -> (String, String) {
    match repo_tag.rsplit_once(':') {
        Some((repository, tag)) if !tag.contains('/') => (repository.to_string(), tag.to_string()),
        _ => (repo_tag.to_string(), "latest".to_string()),
    }
}

pub fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

/// One engine image per usable repo tag
pub fn images_from_summary(
    id: &str,
    repo_tags: &[String],
    size: i64,
    created: i64,
    exposed_ports: &[u16],
) -> Vec<EngineImage> {
    repo_tags
        .iter()
        .filter(|tag| tag.as_str() != "<none>:<none>")
        .map(|repo_tag| {
            let (repository, tag) = split_repo_tag(repo_tag);
            EngineImage {
                id: id.to_string(),
                repository,
                tag,
                size_bytes: u64::try_from(size).unwrap_or(0),
                created: timestamp(created),
                exposed_ports: exposed_ports.to_vec(),
            }
        })
        .collect()
}

/// Sorted container ports from an exposed-ports map
pub fn exposed_ports<V>(exposed: Option<&HashMap<String, V>>) -> Vec<u16> {
    let mut ports: Vec<u16> = exposed
        .map(|map| map.keys().filter_map(|k| parse_port_key(k)).collect())
        .unwrap_or_default();
    ports.sort_unstable();
    ports.dedup();
    ports
}

pub fn inspect_from_response(response: ContainerInspectResponse) -> ContainerInspect {
    let state = response.state.unwrap_or_default();
    ContainerInspect {
        running: state.running.unwrap_or(false),
        started_at: state
            .started_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc)),
        restart_count: response.restart_count.unwrap_or(0),
        status: state.status.map(|s| s.to_string()).unwrap_or_default(),
    }
}

pub fn container_from_summary(summary: ContainerSummary) -> EngineContainer {
    let ports = summary
        .ports
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| {
            let host_port = p.public_port?;
            let protocol = p
                .typ
                .map(|t| t.to_string())
                .unwrap_or_default()
                .parse::<Protocol>()
                .unwrap_or_default();
            Some(PortMapping {
                host_port,
                container_port: p.private_port,
                protocol,
            })
        })
        .collect();

    EngineContainer {
        id: summary.id.unwrap_or_default(),
        name: summary
            .names
            .and_then(|names| names.into_iter().next())
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default(),
        image: summary.image.unwrap_or_default(),
        state: summary.state.unwrap_or_default(),
        status: summary.status.unwrap_or_default(),
        created: timestamp(summary.created.unwrap_or(0)),
        ports,
    }
}

/// Status code of a daemon response error
pub fn status_code(err: &bollard::errors::Error) -> Option<u16> {
    match err {
        bollard::errors::Error::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

/// Map a daemon error; 404 becomes NotFound
pub fn engine_error(what: String, err: bollard::errors::Error) -> CubeError {
    if status_code(&err) == Some(404) {
        CubeError::not_found(format!("{}: {}", what, err))
    } else {
        CubeError::upstream(what, err)
    }
}
