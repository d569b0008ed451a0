use crate::api;
use crate::cli::args::{Args, Command, ConfigCommand, ServeArgs};
use crate::cli::output::{ConsoleWriter, OutputWriter};
use crate::core::engine::ContainerEngine;
use crate::core::session::SessionManager;
use crate::domain::config::{CubeConfig, EngineConfig, EngineKind};
use crate::domain::error::{CubeError, CubeResult};
use crate::infrastructure::config::ConfigManager;
use crate::infrastructure::docker::DockerEngine;
use crate::infrastructure::logging::init_logging;
use crate::infrastructure::simulated::SimulatedEngine;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

/// Execute CLI command
pub async fn execute_command(args: Args) -> CubeResult<()> {
    let writer = ConsoleWriter::new(args.output);

    // Load configuration using ConfigManager
    let config_manager = ConfigManager::new()?;
    let mut config = if let Some(config_path) = &args.config {
        config_manager.load_config_from_path(config_path.as_ref())?
    } else {
        config_manager.load_config()?
    };

    if let Some(engine) = args.engine {
        config.engine.kind = engine.into();
    }

    // Initialize logging
    if !args.quiet {
        init_logging(&config.global.log_level, args.verbose)
            .map_err(|e| CubeError::config(format!("Failed to initialize logging: {}", e)))?;
    }

    match args.command {
        Command::Serve(serve_args) => execute_serve(serve_args, config).await,
        Command::Images => {
            let manager = build_manager(&config)?;
            let images = manager.list_images().await?;
            writer.write_images(&images)?;
            Ok(())
        }
        Command::Containers => {
            let manager = build_manager(&config)?;
            let containers = manager.list_containers().await?;
            writer.write_containers(&containers)?;
            Ok(())
        }
        Command::Config(config_args) => {
            execute_config_command(config_args.command, &writer, &config, &config_manager)
        }
        Command::Version => {
            writer.write_message(&format!("cube {}", env!("CARGO_PKG_VERSION")))?;
            Ok(())
        }
    }
}

/// Container engine selected by configuration
pub fn build_engine(config: &EngineConfig) -> CubeResult<Arc<dyn ContainerEngine>> {
    let engine: Arc<dyn ContainerEngine> = match config.kind {
        EngineKind::Docker => Arc::new(DockerEngine::connect(config)?),
        EngineKind::Simulated => Arc::new(SimulatedEngine::new()),
    };
    info!("Using {} container engine", engine.name());
    Ok(engine)
}

fn build_manager(config: &CubeConfig) -> CubeResult<SessionManager> {
    let engine = build_engine(&config.engine)?;
    SessionManager::from_config(engine, config)
}

/// Apply command line overrides to the server section
pub fn apply_serve_overrides(config: &mut CubeConfig, args: &ServeArgs) {
    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
}

async fn execute_serve(args: ServeArgs, mut config: CubeConfig) -> CubeResult<()> {
    apply_serve_overrides(&mut config, &args);

    let manager = build_manager(&config)?;
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| CubeError::config(format!("Failed to bind {}: {}", addr, e)))?;

    api::serve(
        listener,
        manager,
        Duration::from_secs(config.server.request_timeout_secs),
        api::shutdown_signal(),
    )
    .await
}

fn execute_config_command(
    command: ConfigCommand,
    writer: &ConsoleWriter,
    config: &CubeConfig,
    config_manager: &ConfigManager,
) -> CubeResult<()> {
    match command {
        ConfigCommand::Show => {
            writer.write_config(config)?;
            Ok(())
        }
        ConfigCommand::Validate { file } => {
            let result = match &file {
                Some(config_path) => config_manager.load_config_from_path(config_path.as_ref()).map(|_| ()),
                None => config_manager.load_config().map(|_| ()),
            };
            match (result, file) {
                (Ok(()), Some(path)) => writer.write_message(&format!("Configuration file '{}' is valid", path))?,
                (Ok(()), None) => writer.write_message("Current configuration is valid")?,
                (Err(e), _) => {
                    writer.write_error(&format!("Configuration validation failed: {}", e))?;
                    return Err(e);
                }
            }
            Ok(())
        }
        ConfigCommand::Init { output, global } => {
            let path = if global {
                config_manager.init_global_config()?
            } else if let Some(output_path) = output {
                config_manager.init_project_config(output_path.as_ref())?
            } else {
                let current_dir = std::env::current_dir()?;
                config_manager.init_project_config(&current_dir)?
            };
            writer.write_message(&format!("Configuration initialized at '{}'", path.display()))?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_overrides() {
        let mut config = CubeConfig::default();
        let args = ServeArgs {
            bind: Some("127.0.0.1".to_string()),
            port: None,
        };
        apply_serve_overrides(&mut config, &args);

        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_simulated_engine_selected() {
        let config = EngineConfig {
            kind: EngineKind::Simulated,
            ..Default::default()
        };
        let engine = build_engine(&config).unwrap();
        assert_eq!(engine.name(), "simulated");
    }

    #[test]
    fn test_unsupported_docker_host_rejected() {
        let config = EngineConfig {
            docker_host: Some("ftp://example".to_string()),
            ..Default::default()
        };
        assert!(build_engine(&config).is_err());
    }
}
