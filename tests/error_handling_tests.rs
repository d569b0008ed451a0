use cube::core::session::CreateSessionRequest;
use cube::infrastructure::config::ConfigManager;
use cube::{CubeError, CubeResult, ErrorKind};
use std::error::Error;
use tokio_test::{assert_err, assert_ok};

mod common;
use common::test_manager;

/// Error handling and resilience tests
#[cfg(test)]
mod error_handling_tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let errors = vec![
            (CubeError::invalid_request("bad"), ErrorKind::InvalidRequest),
            (CubeError::not_found("missing"), ErrorKind::NotFound),
            (CubeError::exhausted("no ports"), ErrorKind::ResourceExhausted),
            (CubeError::upstream_msg("daemon down"), ErrorKind::Upstream),
            (CubeError::unknown("engine unreachable"), ErrorKind::Unknown),
            (CubeError::internal("oops"), ErrorKind::Internal),
            (CubeError::config("bad file"), ErrorKind::Internal),
            (CubeError::Output("broken pipe".to_string()), ErrorKind::Internal),
        ];

        for (error, kind) in errors {
            assert!(!error.to_string().is_empty());
            assert_eq!(error.kind(), kind);
        }

        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CubeError>();
    }

    #[test]
    fn test_upstream_keeps_source() {
        let io_error = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let error = CubeError::upstream("failed to reach engine", io_error);

        assert!(error.source().is_some());
        assert!(error.to_string().contains("failed to reach engine"));
    }

    #[test]
    fn test_context_preserves_kind() {
        let error = CubeError::not_found("container 'abc'").context("failed to remove container abc");

        assert!(error.is_not_found());
        assert!(error.to_string().contains("failed to remove container abc"));
        assert!(error.to_string().contains("container 'abc'"));
    }

    #[test]
    fn test_io_conversion() {
        fn read_missing() -> CubeResult<String> {
            Ok(std::fs::read_to_string("/definitely/not/here.toml")?)
        }

        let error = read_missing().unwrap_err();
        assert!(matches!(error, CubeError::Io(_)));
        assert_eq!(error.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_invalid_config_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[ports]\nmin_port = 9000\nmax_port = 8000\n").unwrap();

        let manager = ConfigManager::with_path(temp_dir.path().join("global.toml"));
        let error = manager.load_config_from_path(&path).unwrap_err();

        assert!(matches!(error, CubeError::Config { .. }));
    }

    #[test]
    fn test_malformed_config_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "this is [not toml").unwrap();

        let manager = ConfigManager::with_path(temp_dir.path().join("global.toml"));
        assert!(manager.load_config_from_path(&path).is_err());
    }

    #[tokio::test]
    async fn test_request_validation() {
        let (manager, engine) = test_manager();

        let cases = vec![
            CreateSessionRequest::new("  "),
            CreateSessionRequest::new("nginx").with_num_ports(9),
            CreateSessionRequest::new("nginx").with_mapping(0, Default::default(), "zero"),
        ];

        for request in cases {
            let error = assert_err!(manager.create_session(request).await);
            assert_eq!(error.kind(), ErrorKind::InvalidRequest);
        }
        assert_eq!(engine.create_calls(), 0);
        assert_eq!(manager.allocator().leased_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_image_is_upstream() {
        let (manager, engine) = test_manager();

        let error = manager
            .create_session(CreateSessionRequest::new("no-such-image"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Upstream);
        assert_eq!(manager.allocator().leased_count(), 0);
        assert_eq!(engine.container_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_removal_keeps_session() {
        let (manager, engine) = test_manager();
        let session = assert_ok!(manager.create_session(CreateSessionRequest::new("nginx")).await);
        engine.fail_remove(&session.container_id);

        let error = assert_err!(manager.delete_session(&session.id).await);

        assert_eq!(error.kind(), ErrorKind::Upstream);
        assert!(manager.registry().get(&session.id).await.is_some());
        assert!(manager.allocator().is_leased(session.ports[0].host_port));
    }

    #[tokio::test]
    async fn test_engine_outage_marks_sessions_unknown() {
        let (manager, engine) = test_manager();
        manager.create_session(CreateSessionRequest::new("nginx")).await.unwrap();
        manager.create_session(CreateSessionRequest::new("redis:7")).await.unwrap();
        engine.fail_exists(true);

        let sessions = manager.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 2);

        let stats = manager.statistics().await;
        assert_eq!(stats.unknown_sessions, 2);
        assert_eq!(stats.leased_ports, 2);
    }
}
