use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, error, info};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::commentrelay::event::CommentPayload;
use crate::commentrelay::model::{CreateCommentRequest, CreateReplyRequest};
use crate::commentrelay::service::CommentService;
use crate::commentrelay::session::StreamSession;
use crate::error::{CommentRelayError, ErrorCode};

/// Frames buffered between a session and its response body
const FRAME_BUFFER: usize = 16;

/// Shared by every request handler
#[derive(Clone)]
pub struct AppState {
    service: Arc<CommentService>,
    heartbeat: Duration,
    shutdown: CancellationToken,
}

impl AppState {
    /// `shutdown` is the parent of every stream session's cancellation token.
    pub fn new(service: Arc<CommentService>, heartbeat: Duration, shutdown: CancellationToken) -> Self {
        Self {
            service,
            heartbeat,
            shutdown,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(readiness))
        .route("/comments", post(create_comment))
        .route("/comments/stream", get(stream_comments))
        .route("/comments/:comment_id/replies", post(create_reply).get(list_replies))
        .route("/videos/:video_id/comments", get(list_comments))
        .layer(middleware::from_fn(log_requests))
        .with_state(state)
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(req).await;

    info!("{} {} {} {:?}", method, path, response.status().as_u16(), start.elapsed());
    response
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn readiness() -> Json<serde_json::Value> {
    Json(json!({ "status": "ready" }))
}

async fn create_comment(
    State(state): State<AppState>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentPayload>), CommentRelayError> {
    let Json(req) = payload.map_err(malformed)?;
    let comment = state.service.create_comment(req).await?;
    Ok((StatusCode::CREATED, Json(CommentPayload::from(&comment))))
}

async fn create_reply(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
    payload: Result<Json<CreateReplyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentPayload>), CommentRelayError> {
    let parent_id = parse_comment_id(&comment_id)?;
    let Json(req) = payload.map_err(malformed)?;
    let reply = state.service.create_reply(parent_id, req).await?;
    Ok((StatusCode::CREATED, Json(CommentPayload::from(&reply))))
}

async fn list_replies(
    State(state): State<AppState>,
    Path(comment_id): Path<String>,
) -> Result<Json<Vec<CommentPayload>>, CommentRelayError> {
    let parent_id = parse_comment_id(&comment_id)?;
    let replies = state.service.list_replies(parent_id).await?;
    Ok(Json(replies.iter().map(CommentPayload::from).collect()))
}

async fn list_comments(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<Vec<CommentPayload>>, CommentRelayError> {
    let comments = state.service.list_top_level(&video_id).await?;
    Ok(Json(comments.iter().map(CommentPayload::from).collect()))
}

#[derive(Debug, Deserialize)]
struct StreamParams {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

/// Server-sent event stream of one video's comments.
///
/// The session runs in its own task; dropping the response body (client
/// disconnect) or server shutdown cancels it.
async fn stream_comments(
    State(state): State<AppState>,
    Query(params): Query<StreamParams>,
) -> Result<impl IntoResponse, CommentRelayError> {
    let cancel = state.shutdown.child_token();
    let session = StreamSession::open(
        state.service.broker(),
        params.video_id.as_deref(),
        state.heartbeat,
        cancel.clone(),
    )?;

    let (tx, rx) = mpsc::channel::<Event>(FRAME_BUFFER);
    tokio::spawn(session.run(tx));

    let guard = cancel.drop_guard();
    let events = ReceiverStream::new(rx).map(move |event| {
        let _ = &guard;
        Ok::<_, Infallible>(event)
    });

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        Sse::new(events),
    ))
}

fn parse_comment_id(raw: &str) -> Result<Uuid, CommentRelayError> {
    Uuid::parse_str(raw).map_err(|_| CommentRelayError::from_code(ErrorCode::InvalidCommentId))
}

fn malformed(rejection: JsonRejection) -> CommentRelayError {
    debug!("Rejected request body: {}", rejection);
    CommentRelayError::from_code(ErrorCode::MalformedRequest)
}

/// HTTP status for an error code
pub fn status_for(code: Option<ErrorCode>) -> StatusCode {
    match code {
        Some(ErrorCode::InvalidPayload)
        | Some(ErrorCode::ParentNotTopLevel)
        | Some(ErrorCode::MissingTopicKey)
        | Some(ErrorCode::MalformedRequest)
        | Some(ErrorCode::InvalidCommentId) => StatusCode::BAD_REQUEST,
        Some(ErrorCode::ParentNotFound) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for CommentRelayError {
    fn into_response(self) -> Response {
        let status = status_for(self.code());
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}
