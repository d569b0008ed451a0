#![allow(dead_code)]

use axum::Router;
use cube::api::{create_router, AppState};
use cube::core::session::SessionSettings;
use cube::infrastructure::simulated::SimulatedEngine;
use cube::{PortAllocator, SessionManager, SessionRegistry};
use std::sync::Arc;
use std::time::Duration;

/// Session manager over a fresh simulated engine
pub fn test_manager() -> (SessionManager, Arc<SimulatedEngine>) {
    test_manager_with(SimulatedEngine::new())
}

pub fn test_manager_with(engine: SimulatedEngine) -> (SessionManager, Arc<SimulatedEngine>) {
    let engine = Arc::new(engine);
    let manager = SessionManager::new(
        Arc::new(SessionRegistry::new()),
        Arc::new(PortAllocator::new()),
        engine.clone(),
        SessionSettings {
            access_host: "cube.test".to_string(),
            max_ports_per_session: 8,
        },
    );
    (manager, engine)
}

/// Router over a fresh simulated engine
pub fn test_app() -> (Router, SessionManager, Arc<SimulatedEngine>) {
    let (manager, engine) = test_manager();
    let app = create_router(AppState::new(manager.clone()), Duration::from_secs(30));
    (app, manager, engine)
}
