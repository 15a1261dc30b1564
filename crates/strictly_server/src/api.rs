//! REST and server-sent-events API.

use crate::manager::{SessionManager, Subscription};
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{Request, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use std::convert::Infallible;
use strictly_checkers::{
    CreateSessionRequest, ErrorBody, ErrorKind, JoinRequest, MoveRequest, PlayerRequest, Session,
    SessionError,
};
use tower::ServiceBuilder;
use tracing::{error, info, instrument, warn};

/// HTTP status for an error category.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::NotActive => StatusCode::CONFLICT,
        ErrorKind::RuleViolation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::TransportFailure => StatusCode::BAD_GATEWAY,
    }
}

/// Error response: status derived from the error kind, JSON body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let body = ErrorBody::from(&err);
        warn!(kind = %body.kind, code = %body.code, "Request rejected: {}", body.message);
        Self {
            status: status_for(body.kind),
            body,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

type ApiResult = Result<Json<Session>, ApiError>;

/// Builds the application router over `manager`.
pub fn router(manager: SessionManager) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/sessions", post(create_session))
        .route("/api/sessions/code/{code}", get(find_by_code))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/join", post(join_session))
        .route("/api/sessions/{id}/moves", post(submit_move))
        .route("/api/sessions/{id}/resign", post(resign))
        .route("/api/sessions/{id}/disconnect", post(disconnect))
        .route("/api/sessions/{id}/events", get(events))
        .with_state(manager)
        .layer(ServiceBuilder::new().map_request(|req: Request<Body>| {
            info!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
            req
        }))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[instrument(skip(manager, req), fields(player_id = %req.player.id))]
async fn create_session(
    State(manager): State<SessionManager>,
    Json(req): Json<CreateSessionRequest>,
) -> (StatusCode, Json<Session>) {
    let session = manager.create_session(req.player, req.time_control_secs);
    (StatusCode::CREATED, Json(session))
}

#[instrument(skip(manager))]
async fn get_session(State(manager): State<SessionManager>, Path(id): Path<String>) -> ApiResult {
    Ok(Json(manager.get(&id)?))
}

#[instrument(skip(manager))]
async fn find_by_code(
    State(manager): State<SessionManager>,
    Path(code): Path<String>,
) -> ApiResult {
    Ok(Json(manager.find_by_code(&code)?))
}

#[instrument(skip(manager, req), fields(player_id = %req.player.id))]
async fn join_session(
    State(manager): State<SessionManager>,
    Path(id): Path<String>,
    Json(req): Json<JoinRequest>,
) -> ApiResult {
    Ok(Json(manager.join(&id, req.player)?))
}

#[instrument(skip(manager, req), fields(player_id = %req.player_id))]
async fn submit_move(
    State(manager): State<SessionManager>,
    Path(id): Path<String>,
    Json(req): Json<MoveRequest>,
) -> ApiResult {
    Ok(Json(manager.submit_move(&id, &req.player_id, req.coords)?))
}

#[instrument(skip(manager, req), fields(player_id = %req.player_id))]
async fn resign(
    State(manager): State<SessionManager>,
    Path(id): Path<String>,
    Json(req): Json<PlayerRequest>,
) -> ApiResult {
    Ok(Json(manager.resign(&id, &req.player_id)?))
}

#[instrument(skip(manager, req), fields(player_id = %req.player_id))]
async fn disconnect(
    State(manager): State<SessionManager>,
    Path(id): Path<String>,
    Json(req): Json<PlayerRequest>,
) -> ApiResult {
    Ok(Json(manager.disconnect(&id, &req.player_id)?))
}

#[instrument(skip(manager))]
async fn events(
    State(manager): State<SessionManager>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let subscription = manager.subscribe(&id)?;
    info!("Snapshot stream opened");
    Ok(Sse::new(snapshot_stream(subscription)).keep_alive(KeepAlive::default()))
}

/// Turns a subscription into `snapshot` events, one per revision.
fn snapshot_stream(subscription: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(subscription, |mut subscription| async move {
        let snapshot = subscription.next().await?;
        match Event::default()
            .event("snapshot")
            .id(snapshot.revision().to_string())
            .json_data(&snapshot)
        {
            Ok(event) => Some((Ok(event), subscription)),
            Err(e) => {
                error!(session_id = %subscription.session_id(), error = %e, "Failed to encode snapshot");
                None
            }
        }
    })
}
