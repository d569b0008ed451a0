use crate::cli::args::OutputFormat;
use crate::core::session::{ContainerInfo, ImageInfo};
use crate::domain::config::CubeConfig;
use std::io;
use tabled::{Table, Tabled};

/// Output writer trait for different formats
pub trait OutputWriter {
    fn write_images(&self, images: &[ImageInfo]) -> Result<(), OutputError>;
    fn write_containers(&self, containers: &[ContainerInfo]) -> Result<(), OutputError>;
    fn write_config(&self, config: &CubeConfig) -> Result<(), OutputError>;
    fn write_message(&self, message: &str) -> Result<(), OutputError>;
    fn write_error(&self, error: &str) -> Result<(), OutputError>;
}

/// Output formatting errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("TOML serialization error: {0}")]
    TomlError(#[from] toml::ser::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
}

impl From<OutputError> for crate::domain::error::CubeError {
    fn from(err: OutputError) -> Self {
        Self::Output(err.to_string())
    }
}

/// Console output writer
pub struct ConsoleWriter {
    format: OutputFormat,
}

impl ConsoleWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }
}

/// Render images in `format`
pub fn render_images(images: &[ImageInfo], format: OutputFormat) -> Result<String, OutputError> {
    let rendered = match format {
        OutputFormat::Text => {
            let mut out = String::new();
            for image in images {
                out.push_str(&format!("Image: {}:{}\n", image.name, image.tag));
                out.push_str(&format!("  ID: {}\n", image.id));
                out.push_str(&format!("  Size: {}\n", image.size));
                out.push_str(&format!("  Created: {}\n", image.created));
                out.push_str(&format!("  Exposed ports: {}\n\n", join_ports(&image.exposed_ports)));
            }
            out
        }
        OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({ "images": images }))?,
        OutputFormat::Table => {
            if images.is_empty() {
                String::new()
            } else {
                let rows: Vec<ImageTableRow> = images.iter().map(ImageTableRow::from).collect();
                format!("{}\n", Table::new(rows))
            }
        }
        OutputFormat::Csv => {
            let mut csv = "id,name,tag,size,created,exposed_ports\n".to_string();
            for image in images {
                csv.push_str(&format!(
                    "{},{},{},{},{},{}\n",
                    image.id,
                    image.name,
                    image.tag,
                    image.size,
                    image.created,
                    join_ports(&image.exposed_ports).replace(", ", " ")
                ));
            }
            csv
        }
    };
    Ok(rendered)
}

/// Render containers in `format`
pub fn render_containers(containers: &[ContainerInfo], format: OutputFormat) -> Result<String, OutputError> {
    let rendered = match format {
        OutputFormat::Text => {
            let mut out = String::new();
            for container in containers {
                out.push_str(&format!("Container: {} ({})\n", short_id(&container.id), container.name));
                out.push_str(&format!("  Image: {}\n", container.image));
                out.push_str(&format!("  State: {} ({})\n", container.state, container.status));
                out.push_str(&format!("  Ports: {}\n", describe_ports(container)));
                if let Some(session_id) = &container.session_id {
                    out.push_str(&format!("  Session: {}\n", session_id));
                }
                out.push('\n');
            }
            out
        }
        OutputFormat::Json => serde_json::to_string_pretty(&serde_json::json!({ "containers": containers }))?,
        OutputFormat::Table => {
            if containers.is_empty() {
                String::new()
            } else {
                let rows: Vec<ContainerTableRow> = containers.iter().map(ContainerTableRow::from).collect();
                format!("{}\n", Table::new(rows))
            }
        }
        OutputFormat::Csv => {
            let mut csv = "id,name,image,state,managed,session_id\n".to_string();
            for container in containers {
                csv.push_str(&format!(
                    "{},{},{},{},{},{}\n",
                    container.id,
                    container.name,
                    container.image,
                    container.state,
                    container.is_managed,
                    container.session_id.as_deref().unwrap_or("")
                ));
            }
            csv
        }
    };
    Ok(rendered)
}

/// Render the configuration in `format`
pub fn render_config(config: &CubeConfig, format: OutputFormat) -> Result<String, OutputError> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string_pretty(config)?,
        OutputFormat::Csv => {
            let mut csv = "key,value\n".to_string();
            for (key, value) in config_rows(config) {
                csv.push_str(&format!("{},{}\n", key, value));
            }
            csv
        }
        OutputFormat::Table => {
            let rows: Vec<ConfigTableRow> = config_rows(config)
                .into_iter()
                .map(|(key, value)| ConfigTableRow { key, value })
                .collect();
            format!("{}\n", Table::new(rows))
        }
        OutputFormat::Text => toml::to_string_pretty(config)?,
    };
    Ok(rendered)
}

impl OutputWriter for ConsoleWriter {
    fn write_images(&self, images: &[ImageInfo]) -> Result<(), OutputError> {
        print!("{}", render_images(images, self.format)?);
        Ok(())
    }

    fn write_containers(&self, containers: &[ContainerInfo]) -> Result<(), OutputError> {
        print!("{}", render_containers(containers, self.format)?);
        Ok(())
    }

    fn write_config(&self, config: &CubeConfig) -> Result<(), OutputError> {
        print!("{}", render_config(config, self.format)?);
        Ok(())
    }

    fn write_message(&self, message: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "message": message,
                    "level": "info"
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                println!("{}", message);
            }
        }
        Ok(())
    }

    fn write_error(&self, error: &str) -> Result<(), OutputError> {
        match self.format {
            OutputFormat::Json => {
                let output = serde_json::json!({
                    "error": error,
                    "level": "error"
                });
                eprintln!("{}", serde_json::to_string_pretty(&output)?);
            }
            _ => {
                eprintln!("Error: {}", error);
            }
        }
        Ok(())
    }
}

fn join_ports(ports: &[u16]) -> String {
    if ports.is_empty() {
        return "-".to_string();
    }
    ports.iter().map(|p| p.to_string()).collect::<Vec<_>>().join(", ")
}

fn short_id(id: &str) -> &str {
    id.get(..12).unwrap_or(id)
}

fn describe_ports(container: &ContainerInfo) -> String {
    if container.ports.is_empty() {
        return "-".to_string();
    }
    container
        .ports
        .iter()
        .map(|p| format!("{}->{}/{}", p.host_port, p.container_port, p.protocol))
        .collect::<Vec<_>>()
        .join(", ")
}

fn config_rows(config: &CubeConfig) -> Vec<(String, String)> {
    let (min_port, max_port) = config.ports.range().unwrap_or((0, 0));
    vec![
        ("global.log_level".to_string(), config.global.log_level.clone()),
        ("server.bind".to_string(), config.server.bind.clone()),
        ("server.port".to_string(), config.server.port.to_string()),
        ("server.request_timeout_secs".to_string(), config.server.request_timeout_secs.to_string()),
        ("engine.kind".to_string(), config.engine.kind.to_string()),
        (
            "engine.docker_host".to_string(),
            config.engine.docker_host.clone().unwrap_or_else(|| "(local defaults)".to_string()),
        ),
        ("engine.stop_timeout_secs".to_string(), config.engine.stop_timeout_secs.to_string()),
        ("ports.bind_address".to_string(), config.ports.bind_address.clone()),
        ("ports.min_port".to_string(), min_port.to_string()),
        ("ports.max_port".to_string(), max_port.to_string()),
        ("ports.max_lease_attempts".to_string(), config.ports.max_lease_attempts.to_string()),
        (
            "sessions.public_host".to_string(),
            config.sessions.public_host.clone().unwrap_or_else(|| "(detected)".to_string()),
        ),
        ("sessions.max_ports_per_session".to_string(), config.sessions.max_ports_per_session.to_string()),
    ]
}

/// Table row for images
#[derive(Tabled)]
struct ImageTableRow {
    name: String,
    tag: String,
    size: String,
    created: String,
    ports: String,
}

impl From<&ImageInfo> for ImageTableRow {
    fn from(image: &ImageInfo) -> Self {
        Self {
            name: image.name.clone(),
            tag: image.tag.clone(),
            size: image.size.clone(),
            created: image.created.clone(),
            ports: join_ports(&image.exposed_ports),
        }
    }
}

/// Table row for containers
#[derive(Tabled)]
struct ContainerTableRow {
    id: String,
    name: String,
    image: String,
    state: String,
    ports: String,
    managed: bool,
}

impl From<&ContainerInfo> for ContainerTableRow {
    fn from(container: &ContainerInfo) -> Self {
        Self {
            id: short_id(&container.id).to_string(),
            name: container.name.clone(),
            image: container.image.clone(),
            state: container.state.clone(),
            ports: describe_ports(container),
            managed: container.is_managed,
        }
    }
}

#[derive(Tabled)]
struct ConfigTableRow {
    key: String,
    value: String,
}
