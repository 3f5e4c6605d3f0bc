use axum::body::{Body, Bytes};
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{HeaderMap, Request, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::CompanionError;
use crate::models::ConversationTurn;
use crate::service::{AnalysisReply, ChatReply, CompanionService};

/// Uploaded PDFs can be far larger than axum's 2 MB default
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct ChatParams {
    #[serde(default)]
    pub session_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct DrugParams {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub text: String,
    pub stem: String,
}

/// Maps library errors onto HTTP statuses. Orchestrator failures are not
/// errors and never pass through here.
pub struct ApiError(CompanionError);

impl From<CompanionError> for ApiError {
    fn from(e: CompanionError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CompanionError::Validation(_) => StatusCode::BAD_REQUEST,
            CompanionError::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CompanionError::Config(_) | CompanionError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.0);
        }
        (status, Json(json!({ "ok": false, "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn chat(
    State(svc): State<Arc<CompanionService>>,
    Json(params): Json<ChatParams>,
) -> ApiResult<ChatReply> {
    Ok(Json(svc.wellness_chat(params.session_id, &params.message).await?))
}

async fn chat_history(
    State(svc): State<Arc<CompanionService>>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Vec<ConversationTurn>>, StatusCode> {
    svc.chat_history(session_id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn end_chat(
    State(svc): State<Arc<CompanionService>>,
    Path(session_id): Path<Uuid>,
) -> StatusCode {
    if svc.end_session(session_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

async fn report(State(svc): State<Arc<CompanionService>>, body: Bytes) -> ApiResult<AnalysisReply> {
    Ok(Json(svc.analyze_report(body.to_vec()).await?))
}

async fn drug(
    State(svc): State<Arc<CompanionService>>,
    Json(params): Json<DrugParams>,
) -> ApiResult<AnalysisReply> {
    Ok(Json(svc.drug_info(&params.name).await?))
}

async fn drug_pdf(
    State(svc): State<Arc<CompanionService>>,
    Query(params): Query<DrugParams>,
    body: Bytes,
) -> ApiResult<AnalysisReply> {
    Ok(Json(svc.drug_info_from_pdf(&params.name, body.to_vec()).await?))
}

async fn download(
    State(svc): State<Arc<CompanionService>>,
    Json(params): Json<DownloadParams>,
) -> Response {
    let artifact = svc.download(&params.text, &params.stem);
    (
        [
            (header::CONTENT_TYPE, artifact.content_type.to_string()),
            (header::CONTENT_DISPOSITION, artifact.content_disposition()),
        ],
        artifact.body,
    )
        .into_response()
}

async fn require_bearer(
    State(expected): State<Arc<String>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if req.uri().path() == "/health" {
        return next.run(req).await;
    }
    let headers: &HeaderMap = req.headers();
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|v| v == format!("Bearer {}", expected.as_str()));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    next.run(req).await
}

/// All routes; `/health` stays reachable without a token
pub fn router(svc: Arc<CompanionService>, bearer_token: Option<String>) -> Router {
    let mut router = Router::new()
        .route("/api/chat", post(chat))
        .route("/api/chat/:session_id", get(chat_history).delete(end_chat))
        .route("/api/report", post(report))
        .route("/api/drug", post(drug))
        .route("/api/drug/pdf", post(drug_pdf))
        .route("/api/download", post(download))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(svc);

    if let Some(expected) = bearer_token {
        router = router.layer(middleware::from_fn_with_state(
            Arc::new(expected),
            require_bearer,
        ));
    }

    router.route("/health", get(|| async { "ok" }))
}
