// Infrastructure module - External dependencies and adapters
pub mod config;
pub mod docker;
pub mod logging;
pub mod network;
pub mod simulated;
