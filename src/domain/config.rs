use serde::{Deserialize, Serialize};

/// Cube configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CubeConfig {
    /// Global configuration
    #[serde(default)]
    pub global: GlobalConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Container engine settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Host port leasing
    #[serde(default)]
    pub ports: PortConfig,
    /// Session provisioning
    #[serde(default)]
    pub sessions: SessionConfig,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Listen port
    #[serde(default = "default_server_port")]
    pub port: u16,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

/// Which container engine backs the sessions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Docker,
    Simulated,
}

/// Container engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine implementation
    #[serde(default)]
    pub kind: EngineKind,
    /// Docker endpoint (unix://, tcp:// or http://); local defaults when unset
    #[serde(default)]
    pub docker_host: Option<String>,
    /// Grace period before a stop turns into a kill
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: i64,
    /// Engine API timeout in seconds
    #[serde(default = "default_engine_timeout")]
    pub api_timeout_secs: u64,
}

/// Host port leasing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortConfig {
    /// Address probed when asking the OS for a free port
    #[serde(default = "default_bind")]
    pub bind_address: String,
    /// Lower bound of the lease range (0 lets the OS choose)
    #[serde(default)]
    pub min_port: u16,
    /// Upper bound of the lease range (0 lets the OS choose)
    #[serde(default)]
    pub max_port: u16,
    /// Probe attempts before a lease gives up
    #[serde(default = "default_lease_attempts")]
    pub max_lease_attempts: usize,
}

/// Session provisioning settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Host used in access URLs; detected from interfaces when unset
    #[serde(default)]
    pub public_host: Option<String>,
    /// Upper limit for `num_ports` and explicit mappings
    #[serde(default = "default_max_ports")]
    pub max_ports_per_session: usize,
}

impl PortConfig {
    /// Inclusive lease range, if one is configured
    pub fn range(&self) -> Option<(u16, u16)> {
        if self.min_port == 0 || self.max_port == 0 {
            None
        } else {
            Some((self.min_port, self.max_port))
        }
    }
}

impl CubeConfig {
    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), String> {
        if let Some((min, max)) = self.ports.range() {
            if min > max {
                return Err(format!("ports.min_port ({}) is above ports.max_port ({})", min, max));
            }
        }
        if self.ports.max_lease_attempts == 0 {
            return Err("ports.max_lease_attempts must be at least 1".to_string());
        }
        if self.sessions.max_ports_per_session == 0 {
            return Err("sessions.max_ports_per_session must be at least 1".to_string());
        }
        if self.ports.bind_address.parse::<std::net::IpAddr>().is_err() {
            return Err(format!("ports.bind_address '{}' is not an IP address", self.ports.bind_address));
        }
        Ok(())
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    120
}

fn default_stop_timeout() -> i64 {
    10
}

fn default_engine_timeout() -> u64 {
    120
}

fn default_lease_attempts() -> usize {
    64
}

fn default_max_ports() -> usize {
    32
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_server_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            docker_host: None,
            stop_timeout_secs: default_stop_timeout(),
            api_timeout_secs: default_engine_timeout(),
        }
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind(),
            min_port: 0,
            max_port: 0,
            max_lease_attempts: default_lease_attempts(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            public_host: None,
            max_ports_per_session: default_max_ports(),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Docker => write!(f, "docker"),
            EngineKind::Simulated => write!(f, "simulated"),
        }
    }
}
