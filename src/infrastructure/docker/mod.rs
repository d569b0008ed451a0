// Docker module - Container engine on a Docker daemon
pub mod convert;
pub mod engine;

pub use engine::DockerEngine;
