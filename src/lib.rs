//! Cube Library
//!
//! Container session orchestration: leases host ports, provisions one
//! container per session, tracks sessions in an in-memory registry and
//! reconciles it against the container engine.

pub mod api;
pub mod cli;
pub mod core;
pub mod domain;
pub mod infrastructure;

pub use domain::error::{CubeError, CubeResult, ErrorKind};
pub use domain::config::CubeConfig;
pub use core::engine::ContainerEngine;
pub use core::ports::PortAllocator;
pub use core::session::{CreateSessionRequest, Session, SessionId, SessionManager, SessionRegistry, SessionStatus};
