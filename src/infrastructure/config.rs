use crate::domain::{config::CubeConfig, error::{CubeError, CubeResult}};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const CONFIG_DIR: &str = ".cube";
const CONFIG_FILE: &str = "config.toml";

/// Configuration manager
///
/// Layers the global file, then the nearest project file, on top of the
/// built-in defaults. Keys set in a later layer win; unset keys fall through.
pub struct ConfigManager {
    global_config_path: PathBuf,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> CubeResult<Self> {
        let global_config_path = Self::get_global_config_path()?;
        let project_config_path = Self::find_project_config_path();

        Ok(Self {
            global_config_path,
            project_config_path,
        })
    }

    /// Manager that reads a single explicit file instead of the layered lookup
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            global_config_path: path.into(),
            project_config_path: None,
        }
    }

    /// Load configuration from files
    pub fn load_config(&self) -> CubeResult<CubeConfig> {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        if self.global_config_path.exists() {
            debug!("Loading configuration from {}", self.global_config_path.display());
            merge_values(&mut merged, read_value(&self.global_config_path)?);
        }

        if let Some(project_path) = &self.project_config_path {
            if project_path.exists() {
                debug!("Loading project configuration from {}", project_path.display());
                merge_values(&mut merged, read_value(project_path)?);
            }
        }

        let config: CubeConfig = merged.try_into().map_err(|e| CubeError::Config {
            message: format!("Invalid configuration: {}", e),
        })?;
        config.validate().map_err(CubeError::config)?;
        Ok(config)
    }

    /// Get global configuration path
    fn get_global_config_path() -> CubeResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| CubeError::Config {
            message: "Could not determine home directory".to_string(),
        })?;

        Ok(home.join(".config").join("cube").join(CONFIG_FILE))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut path = current_dir.as_path();

        loop {
            let config_path = path.join(CONFIG_DIR).join(CONFIG_FILE);
            if config_path.exists() {
                return Some(config_path);
            }

            path = path.parent()?;
        }
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> CubeResult<CubeConfig> {
        let content = fs::read_to_string(path).map_err(|e| CubeError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: CubeConfig = toml::from_str(&content).map_err(|e| CubeError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;
        config.validate().map_err(CubeError::config)?;
        Ok(config)
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &CubeConfig) -> CubeResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| CubeError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CubeError::Config {
                message: format!("Failed to create config directory: {}", e),
            })?;
        }

        fs::write(path, content).map_err(|e| CubeError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Write a default project configuration under `path/.cube`
    pub fn init_project_config(&self, path: &Path) -> CubeResult<PathBuf> {
        let config_file = path.join(CONFIG_DIR).join(CONFIG_FILE);
        self.init_at(&config_file)?;
        Ok(config_file)
    }

    /// Write a default global configuration
    pub fn init_global_config(&self) -> CubeResult<PathBuf> {
        self.init_at(&self.global_config_path)?;
        Ok(self.global_config_path.clone())
    }

    fn init_at(&self, config_file: &Path) -> CubeResult<()> {
        if config_file.exists() {
            return Err(CubeError::Config {
                message: format!("Configuration already exists at {}", config_file.display()),
            });
        }
        self.save_config_to_path(config_file, &CubeConfig::default())
    }

    /// Get the current project config path (if any)
    pub fn get_project_config_path(&self) -> Option<&PathBuf> {
        self.project_config_path.as_ref()
    }

    /// Get the global config path
    pub fn get_global_config_path_ref(&self) -> &PathBuf {
        &self.global_config_path
    }
}

fn read_value(path: &Path) -> CubeResult<toml::Value> {
    let content = fs::read_to_string(path).map_err(|e| CubeError::Config {
        message: format!("Failed to read config file {}: {}", path.display(), e),
    })?;

    toml::from_str(&content).map_err(|e| CubeError::Config {
        message: format!("Failed to parse config file {}: {}", path.display(), e),
    })
}

/// Recursively overlay `overlay` onto `base`; tables merge, everything else replaces
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
