//! HTTP handlers. Each one is a thin shell over a `SessionManager` call.

use super::error::{ApiError, ApiResult};
use super::state::AppState;
use crate::core::session::{ContainerInfo, CreateSessionRequest, ImageInfo, Session, SessionStatistics};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use tracing::{info, instrument};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub engine: &'static str,
    pub uptime_secs: u64,
    #[serde(flatten)]
    pub statistics: SessionStatistics,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: Session,
}

#[derive(Debug, Serialize)]
pub struct ListSessionsResponse {
    pub sessions: Vec<Session>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct DeleteAllResponse {
    pub count: usize,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ListImagesResponse {
    pub images: Vec<ImageInfo>,
}

#[derive(Debug, Serialize)]
pub struct ListContainersResponse {
    pub containers: Vec<ContainerInfo>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        engine: state.sessions.engine().name(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        statistics: state.sessions.statistics().await,
    })
}

#[instrument(skip(state))]
pub async fn list_sessions(State(state): State<AppState>) -> ApiResult<Json<ListSessionsResponse>> {
    let sessions = state.sessions.list_sessions().await?;
    info!(count = sessions.len(), "Listed sessions");
    Ok(Json(ListSessionsResponse { sessions }))
}

#[instrument(skip(state, body))]
pub async fn create_session(
    State(state): State<AppState>,
    body: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let Json(request) = body.map_err(ApiError::from)?;
    let session = state.sessions.create_session(request).await?;
    info!(session_id = %session.id, "Created session");
    Ok((StatusCode::CREATED, Json(SessionResponse { session })))
}

#[instrument(skip(state))]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<SessionResponse>> {
    let session = state.sessions.get_session(&session_id).await?;
    Ok(Json(SessionResponse { session }))
}

#[instrument(skip(state))]
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.sessions.delete_session(&session_id).await?;
    info!(session_id = %session_id, "Deleted session");
    Ok(Json(MessageResponse {
        message: "session deleted successfully".to_string(),
    }))
}

#[instrument(skip(state))]
pub async fn delete_all_sessions(State(state): State<AppState>) -> ApiResult<Json<DeleteAllResponse>> {
    let count = state.sessions.delete_all_sessions().await?;
    info!(count, "Deleted all sessions");
    Ok(Json(DeleteAllResponse {
        count,
        message: "sessions deleted successfully".to_string(),
    }))
}

#[instrument(skip(state))]
pub async fn list_images(State(state): State<AppState>) -> ApiResult<Json<ListImagesResponse>> {
    let images = state.sessions.list_images().await?;
    Ok(Json(ListImagesResponse { images }))
}

#[instrument(skip(state))]
pub async fn list_containers(State(state): State<AppState>) -> ApiResult<Json<ListContainersResponse>> {
    let containers = state.sessions.list_containers().await?;
    Ok(Json(ListContainersResponse { containers }))
}

#[instrument(skip(state))]
pub async fn delete_container(
    State(state): State<AppState>,
    Path(container_id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    state.sessions.delete_container(&container_id).await?;
    info!(container_id = %container_id, "Deleted container");
    Ok(Json(MessageResponse {
        message: "container deleted successfully".to_string(),
    }))
}
