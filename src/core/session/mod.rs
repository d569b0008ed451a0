// Session module - Session orchestration
pub mod manager;
pub mod provisioning;
pub mod reconciler;
pub mod registry;
pub mod session;
pub mod teardown;

pub use manager::{ContainerInfo, ImageInfo, SessionManager, SessionSettings, SessionStatistics};
pub use reconciler::ReconcileReport;
pub use registry::{SessionRegistry, SessionTable};
pub use session::{CreateSessionRequest, PortBinding, PortMappingRequest, Protocol, Session, SessionId, SessionStatus};
