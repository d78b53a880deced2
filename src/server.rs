use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

use crate::annotator::{Annotation, Annotator};
use crate::config::{has_extension, UPLOAD_EXTENSIONS};
use crate::error::AnnotateError;
use crate::html_template::HTML_CONTENT;

/// Multipart field names accepted for the uploaded file
const UPLOAD_FIELDS: [&str; 2] = ["audio", "file"];

pub struct ServerConfig {
    pub port: u16,
    pub models_dir: PathBuf,
    pub web_dir: Option<PathBuf>,
    pub max_upload_mb: usize,
}

struct AppState {
    annotator: Arc<Annotator>,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Upload(#[from] MultipartError),

    /// The upload was accepted but could not be decoded
    #[error("{0}")]
    Unprocessable(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upload(e) => (e.status(), e.body_text()),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<AnnotateError> for ApiError {
    fn from(e: AnnotateError) -> Self {
        match e {
            AnnotateError::Load { .. } => ApiError::Unprocessable(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Router over an already loaded annotator.
pub fn build_router(annotator: Arc<Annotator>, web_dir: Option<&Path>, max_upload_bytes: usize) -> Router {
    let state = Arc::new(AppState { annotator });

    let mut app = Router::new()
        .route("/", get(serve_index))
        .route("/api/health", get(health))
        .route("/api/analyze", post(analyze_upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state);

    if let Some(dir) = web_dir {
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    let models_dir = config.models_dir.clone();
    info!("Loading models from {:?}", models_dir);
    let annotator = tokio::task::spawn_blocking(move || Annotator::load(&models_dir)).await?;

    let app = build_router(
        Arc::new(annotator),
        config.web_dir.as_deref(),
        config.max_upload_mb * 1024 * 1024,
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Web Dashboard available at http://{}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn serve_index() -> Html<&'static str> {
    Html(HTML_CONTENT)
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "unavailable": state.annotator.unavailable(),
    }))
}

async fn analyze_upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<Annotation>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name().is_some_and(|n| UPLOAD_FIELDS.contains(&n)) {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await?;
            upload = Some((filename, data));
            break;
        }
    }

    let (filename, data) = upload.ok_or_else(|| ApiError::BadRequest("No file provided".into()))?;
    // Only the final component of a client-supplied name is kept.
    let filename = Path::new(&filename)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if filename.trim().is_empty() {
        return Err(ApiError::BadRequest("No file selected".into()));
    }
    if !has_extension(Path::new(&filename), UPLOAD_EXTENSIONS) {
        return Err(ApiError::BadRequest(format!(
            "Unsupported file type. Allowed: {}",
            UPLOAD_EXTENSIONS.join(", ")
        )));
    }

    info!("Analyzing upload {} ({} bytes)", filename, data.len());
    let annotator = state.annotator.clone();
    let annotation = tokio::task::spawn_blocking(move || annotator.analyze_bytes(data.to_vec(), &filename))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))??;

    Ok(Json(annotation))
}
