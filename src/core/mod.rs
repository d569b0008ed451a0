// Core module - Session orchestration logic
pub mod engine;
pub mod ports;
pub mod session;
