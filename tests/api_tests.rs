use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;
use common::test_app;

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// HTTP API tests against a simulated engine
#[cfg(test)]
mod api_tests {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let (app, _manager, _engine) = test_app();

        let (status, body) = send(&app, Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["engine"], "simulated");
        assert_eq!(body["total_sessions"], 0);
        assert_eq!(body["leased_ports"], 0);
    }

    #[tokio::test]
    async fn test_create_session() {
        let (app, manager, _engine) = test_app();

        let (status, body) = send(
            &app,
            Method::POST,
            "/sessions",
            Some(json!({ "image_name": "nginx", "num_ports": 2 })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let session = &body["session"];
        assert_eq!(session["image_name"], "nginx");
        assert_eq!(session["status"], "running");
        assert_eq!(session["ports"].as_array().unwrap().len(), 2);
        assert_eq!(session["ports"][0]["container_port"], 8080);
        assert_eq!(session["ports"][0]["protocol"], "tcp");
        assert_eq!(manager.registry().len().await, 1);
    }

    #[tokio::test]
    async fn test_create_with_explicit_mappings() {
        let (app, _manager, _engine) = test_app();

        let (status, body) = send(
            &app,
            Method::POST,
            "/sessions",
            Some(json!({
                "image_name": "postgres:16",
                "port_mappings": [
                    { "container_port": 5432 },
                    { "container_port": 53, "protocol": "udp", "description": "DNS" }
                ]
            })),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        let ports = body["session"]["ports"].as_array().unwrap();
        assert_eq!(ports[0]["description"], "PostgreSQL");
        assert_eq!(ports[1]["protocol"], "udp");
        assert_eq!(ports[1]["description"], "DNS");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_image() {
        let (app, manager, _engine) = test_app();

        let (status, body) = send(&app, Method::POST, "/sessions", Some(json!({ "image_name": "" }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "invalid_request");
        assert_eq!(manager.allocator().leased_count(), 0);
    }

    #[tokio::test]
    async fn test_create_rejects_malformed_body() {
        let (app, _manager, _engine) = test_app();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/sessions")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_engine_failure_is_server_error() {
        let (app, manager, engine) = test_app();
        engine.fail_create(true);

        let (status, body) = send(&app, Method::POST, "/sessions", Some(json!({ "image_name": "nginx" }))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["code"], "upstream");
        assert_eq!(body["error"], "Internal Server Error");
        assert_eq!(manager.allocator().leased_count(), 0);
    }

    #[tokio::test]
    async fn test_list_and_get_sessions() {
        let (app, _manager, _engine) = test_app();
        let (_, created) = send(&app, Method::POST, "/sessions", Some(json!({ "image_name": "redis:7" }))).await;
        let id = created["session"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, Method::GET, "/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
        assert_eq!(body["sessions"][0]["id"], id.as_str());

        let (status, body) = send(&app, Method::GET, &format!("/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["session"]["image_name"], "redis:7");
        assert_eq!(body["session"]["ports"][0]["description"], "Redis");
    }

    #[tokio::test]
    async fn test_list_purges_vanished_sessions() {
        let (app, manager, engine) = test_app();
        let (_, created) = send(&app, Method::POST, "/sessions", Some(json!({ "image_name": "nginx" }))).await;
        let container_id = created["session"]["container_id"].as_str().unwrap();

        engine.vanish(container_id);
        let (status, body) = send(&app, Method::GET, "/sessions", None).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["sessions"].as_array().unwrap().is_empty());
        assert_eq!(manager.allocator().leased_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let (app, _manager, _engine) = test_app();

        let (status, body) = send(&app, Method::GET, "/sessions/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");

        let (status, body) = send(&app, Method::DELETE, "/sessions/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not Found");
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (app, manager, engine) = test_app();
        let (_, created) = send(&app, Method::POST, "/sessions", Some(json!({ "image_name": "nginx" }))).await;
        let id = created["session"]["id"].as_str().unwrap();

        let (status, body) = send(&app, Method::DELETE, &format!("/sessions/{}", id), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "session deleted successfully");
        assert!(manager.registry().is_empty().await);
        assert_eq!(engine.container_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_all_sessions() {
        let (app, manager, _engine) = test_app();
        for _ in 0..3 {
            send(&app, Method::POST, "/sessions", Some(json!({ "image_name": "nginx" }))).await;
        }

        let (status, body) = send(&app, Method::DELETE, "/sessions/all", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 3);
        assert_eq!(body["message"], "sessions deleted successfully");
        assert_eq!(manager.allocator().leased_count(), 0);

        let (status, body) = send(&app, Method::DELETE, "/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn test_versioned_prefix() {
        let (app, _manager, _engine) = test_app();

        let (status, _) = send(&app, Method::POST, "/api/v1/sessions", Some(json!({ "image_name": "nginx" }))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = send(&app, Method::GET, "/api/v1/sessions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_images() {
        let (app, _manager, _engine) = test_app();

        let (status, body) = send(&app, Method::GET, "/images", None).await;

        assert_eq!(status, StatusCode::OK);
        let names: Vec<&str> = body["images"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|image| image["name"].as_str())
            .collect();
        assert!(names.contains(&"nginx"));
        assert!(names.contains(&"postgres"));
    }

    #[tokio::test]
    async fn test_list_and_delete_containers() {
        let (app, _manager, engine) = test_app();
        let (_, created) = send(&app, Method::POST, "/sessions", Some(json!({ "image_name": "nginx" }))).await;
        let session_id = created["session"]["id"].as_str().unwrap();

        let (status, body) = send(&app, Method::GET, "/containers", None).await;
        assert_eq!(status, StatusCode::OK);
        let containers = body["containers"].as_array().unwrap();
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0]["is_managed"], true);
        assert_eq!(containers[0]["session_id"], session_id);

        let container_id = containers[0]["id"].as_str().unwrap();
        let (status, body) = send(&app, Method::DELETE, &format!("/containers/{}", container_id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "container deleted successfully");
        assert_eq!(engine.container_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_unknown_container() {
        let (app, _manager, _engine) = test_app();

        let (status, body) = send(&app, Method::DELETE, "/containers/deadbeef", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "not_found");
    }
}
