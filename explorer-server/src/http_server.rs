use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
        DefaultBodyLimit, Multipart, Path, State,
    },
    http::header,
    response::{Html, IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use explorer_engine::{
    Action, ChartRequest, ColumnSelection, ExplorerEngine, ExplorerError, Page, PageView,
    PreprocessOptions,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

use crate::error::{ApiErrorResponse, ApiSuccess};

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ExplorerEngine>,
    pub upload_limit_bytes: usize,
}

/// JSON form of the actions a page can send. Uploads arrive as multipart
/// on their own route.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionRequest {
    Navigate { page: Page },
    Preprocess { options: PreprocessOptions },
    GenerateChart { chart: ChartRequest },
    ComputeStatistics { selection: ColumnSelection },
    Refresh,
}

impl From<ActionRequest> for Action {
    fn from(request: ActionRequest) -> Self {
        match request {
            ActionRequest::Navigate { page } => Action::Navigate(page),
            ActionRequest::Preprocess { options } => Action::Preprocess(options),
            ActionRequest::GenerateChart { chart } => Action::GenerateChart(chart),
            ActionRequest::ComputeStatistics { selection } => Action::ComputeStatistics(selection),
            ActionRequest::Refresh => Action::Refresh,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: String,
    pub view: PageView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub sessions: usize,
}

pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    pub fn new(engine: Arc<ExplorerEngine>, upload_limit_bytes: usize) -> Self {
        Self {
            state: AppState {
                engine,
                upload_limit_bytes,
            },
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn start(&self, addr: SocketAddr) -> Result<(), ExplorerError> {
        info!("Starting HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

pub fn build_router(state: AppState) -> Router {
    let upload_limit_bytes = state.upload_limit_bytes;
    Router::new()
        .route("/", get(root_handler))
        .route("/api/v1/health", get(health_handler))
        .route("/api/v1/sessions", post(create_session_handler))
        .route("/api/v1/sessions/:session_id", delete(delete_session_handler))
        .route("/api/v1/sessions/:session_id/view", get(view_handler))
        .route("/api/v1/sessions/:session_id/actions", post(action_handler))
        .route(
            "/api/v1/sessions/:session_id/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(upload_limit_bytes)),
        )
        .route(
            "/api/v1/sessions/:session_id/export/preprocessed.csv",
            get(export_csv_handler),
        )
        .route(
            "/api/v1/sessions/:session_id/export/chart.png",
            get(export_chart_handler),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically drops idle sessions.
pub fn spawn_session_sweeper(engine: Arc<ExplorerEngine>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = engine.purge_expired_sessions().await;
            debug!("Session sweep removed {} sessions", removed);
        }
    })
}

async fn root_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_handler(State(state): State<AppState>) -> Json<ApiSuccess<HealthStatus>> {
    ApiSuccess::new(HealthStatus {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        sessions: state.engine.session_count().await,
    })
}

async fn create_session_handler(State(state): State<AppState>) -> Json<ApiSuccess<SessionCreated>> {
    let (session_id, view) = state.engine.create_session().await;
    ApiSuccess::new(SessionCreated { session_id, view })
}

async fn delete_session_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiSuccess<serde_json::Value>>, ApiErrorResponse> {
    state.engine.remove_session(&session_id).await?;
    Ok(ApiSuccess::new(serde_json::json!({ "sessionId": session_id })))
}

async fn view_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ApiSuccess<PageView>>, ApiErrorResponse> {
    let view = state.engine.view(&session_id).await?;
    Ok(ApiSuccess::new(view))
}

async fn action_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Result<Json<ActionRequest>, JsonRejection>,
) -> Result<Json<ApiSuccess<PageView>>, ApiErrorResponse> {
    let Json(request) =
        payload.map_err(|e| ApiErrorResponse::bad_request(format!("Invalid action: {}", e.body_text())))?;
    debug!("Session {} action: {:?}", session_id, request);
    let view = state.engine.dispatch(&session_id, request.into()).await?;
    Ok(ApiSuccess::new(view))
}

async fn upload_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ApiSuccess<PageView>>, ApiErrorResponse> {
    let multipart = multipart
        .map_err(|e| ApiErrorResponse::bad_request(format!("Expected a multipart upload: {}", e.body_text())))?;
    let upload = parse_upload_multipart(multipart).await?;

    let mut options = state.engine.settings().csv;
    if let Some(delimiter) = upload.delimiter.as_deref() {
        options = options.with_delimiter_str(delimiter)?;
    }

    info!(
        "Session {} uploading '{}' ({} bytes)",
        session_id,
        upload.file_name,
        upload.bytes.len()
    );
    let action = Action::Upload {
        file_name: upload.file_name,
        bytes: upload.bytes,
        options,
    };
    let view = state.engine.dispatch(&session_id, action).await?;
    Ok(ApiSuccess::new(view))
}

async fn export_csv_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiErrorResponse> {
    let csv = state.engine.export_preprocessed(&session_id).await?;
    Ok(attachment("text/csv; charset=utf-8", "preprocessed_data.csv", csv))
}

async fn export_chart_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Response, ApiErrorResponse> {
    let png = state.engine.export_chart(&session_id).await?;
    Ok(attachment("image/png", "visualization.png", png))
}

fn attachment(content_type: &'static str, file_name: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}

struct UploadForm {
    file_name: String,
    bytes: Vec<u8>,
    delimiter: Option<String>,
}

/// Reads the `file` part and the optional `delimiter` part of an upload.
/// The body size is capped by the route's `DefaultBodyLimit`.
async fn parse_upload_multipart(mut multipart: Multipart) -> Result<UploadForm, ApiErrorResponse> {
    let malformed = |e: MultipartError| {
        ApiErrorResponse::new(
            e.status(),
            "UploadError",
            format!("Could not read the upload: {}", e.body_text()),
        )
    };

    let mut file = None;
    let mut delimiter = None;
    while let Some(field) = multipart.next_field().await.map_err(malformed)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.csv").to_string();
                let bytes = field.bytes().await.map_err(malformed)?;
                file = Some((file_name, bytes.to_vec()));
            }
            "delimiter" => {
                let value = field.text().await.map_err(malformed)?;
                delimiter = Some(value).filter(|v| !v.is_empty());
            }
            _ => debug!("Ignoring unexpected upload field '{}'", name),
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| ApiErrorResponse::bad_request("The upload has no 'file' part."))?;
    Ok(UploadForm {
        file_name,
        bytes,
        delimiter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn actions_parse_from_json() {
        let request: ActionRequest =
            serde_json::from_str(r#"{"type":"navigate","page":"stats"}"#).unwrap();
        assert!(matches!(
            Action::from(request),
            Action::Navigate(Page::Stats)
        ));

        let request: ActionRequest = serde_json::from_str(
            r#"{"type":"compute_statistics","selection":{"mode":"subset","columns":["a"]}}"#,
        )
        .unwrap();
        assert!(matches!(
            Action::from(request),
            Action::ComputeStatistics(ColumnSelection::Subset(_))
        ));

        assert!(serde_json::from_str::<ActionRequest>(r#"{"type":"explode"}"#).is_err());
    }
}
