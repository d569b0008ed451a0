use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type SessionId = String;

/// Transport protocol of a port binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "tcp" => Ok(Protocol::Tcp),
            "udp" => Ok(Protocol::Udp),
            other => Err(format!("unsupported protocol '{}'", other)),
        }
    }
}

/// Session status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Container is up
    Running,
    /// Container exists but is not running
    Stopped,
    /// Container is dead or being removed
    Error,
    /// Engine could not tell us
    Unknown,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Stopped => write!(f, "stopped"),
            SessionStatus::Error => write!(f, "error"),
            SessionStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// A leased host port mapped into the session's container
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBinding {
    pub host_port: u16,
    pub container_port: u16,
    pub protocol: Protocol,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A tracked container session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub created_at: DateTime<Utc>,
    pub image_name: String,
    pub container_id: String,
    pub ports: Vec<PortBinding>,
    pub status: SessionStatus,
}

impl Session {
    /// Host ports leased on behalf of this session
    pub fn host_ports(&self) -> Vec<u16> {
        self.ports.iter().map(|p| p.host_port).collect()
    }
}

/// Caller-supplied port mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMappingRequest {
    pub container_port: u16,
    #[serde(default)]
    pub protocol: Option<Protocol>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Request to provision a new session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub image_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_ports: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub port_mappings: Vec<PortMappingRequest>,
}

impl CreateSessionRequest {
    pub fn new(image_name: &str) -> Self {
        Self {
            image_name: image_name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_num_ports(mut self, num_ports: usize) -> Self {
        self.num_ports = Some(num_ports);
        self
    }

    pub fn with_mapping(mut self, container_port: u16, protocol: Protocol, description: &str) -> Self {
        self.port_mappings.push(PortMappingRequest {
            container_port,
            protocol: Some(protocol),
            description: Some(description.to_string()),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserialization() {
        let req: CreateSessionRequest = serde_json::from_str(
            r#"{"image_name":"nginx","port_mappings":[{"container_port":53,"protocol":"udp"}]}"#,
        )
        .unwrap();

        assert_eq!(req.image_name, "nginx");
        assert_eq!(req.num_ports, None);
        assert_eq!(req.port_mappings[0].protocol, Some(Protocol::Udp));
        assert_eq!(req.port_mappings[0].description, None);
    }

    #[test]
    fn test_url_omitted_when_absent() {
        let binding = PortBinding {
            host_port: 40000,
            container_port: 53,
            protocol: Protocol::Udp,
            description: "DNS".to_string(),
            url: None,
        };
        let json = serde_json::to_value(&binding).unwrap();
        assert!(json.get("url").is_none());
        assert_eq!(json["protocol"], "udp");
    }

    #[test]
    fn test_protocol_parse() {
        assert_eq!("TCP".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("".parse::<Protocol>().unwrap(), Protocol::Tcp);
        assert_eq!("udp".parse::<Protocol>().unwrap(), Protocol::Udp);
        assert!("sctp".parse::<Protocol>().is_err());
    }
}
