//! HTTP surface: one render endpoint plus static access to finished videos.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::pipeline::Pipeline;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Text field is required")]
    MissingText,

    #[error("Failed to generate video")]
    GenerationFailed,

    #[error("Processing failed: {0}")]
    Processing(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingText => StatusCode::BAD_REQUEST,
            ApiError::GenerationFailed | ApiError::Processing(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    /// Owned by the render task for its whole run, so renders never overlap.
    render_gate: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            render_gate: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GenerateVideoRequest {
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateVideoResponse {
    pub success: bool,
    pub video_filename: String,
    pub message: String,
    pub transcript: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn home() -> Html<&'static str> {
    Html("<h1>API is Running</h1>")
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn generate_video(
    State(state): State<AppState>,
    payload: Result<Json<GenerateVideoRequest>, JsonRejection>,
) -> ApiResult<Json<GenerateVideoResponse>> {
    let text = match payload {
        Ok(Json(GenerateVideoRequest { text: Some(text) })) => text,
        Ok(_) => return Err(ApiError::MissingText),
        Err(rejection) => {
            warn!("Rejected generate-video body: {}", rejection.body_text());
            return Err(ApiError::MissingText);
        }
    };

    let gate = Arc::clone(&state.render_gate).lock_owned().await;
    let pipeline = Arc::clone(&state.pipeline);

    // The task owns the gate, so an abandoned request still blocks the next
    // render until its own finishes. A panic surfaces as a JoinError.
    let rendered = tokio::spawn(async move {
        let _gate = gate;
        pipeline.run(&text).await
    })
        .await
        .map_err(|e| {
            error!("Render task failed: {}", e);
            ApiError::Processing(e.to_string())
        })?;

    let output = rendered.ok_or(ApiError::GenerationFailed)?;
    info!("Served render {}", output.request_id);

    Ok(Json(GenerateVideoResponse {
        success: true,
        video_filename: output.file_name(),
        message: "Video generated successfully".to_string(),
        transcript: output.transcript,
    }))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.allows_any_origin() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", o);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

pub fn create_router(state: AppState) -> Router {
    let config = state.pipeline.config().clone();

    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/api/generate-video", post(generate_video))
        .nest_service("/videos", ServeDir::new(config.videos_dir()))
        .layer(cors_layer(&config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(pipeline: Pipeline) -> anyhow::Result<()> {
    let config = pipeline.config().clone();
    config.ensure_dirs()?;

    let app = create_router(AppState::new(pipeline));
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeClips, FakeCompositor, FakeSpeech};
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app_with(compositor: FakeCompositor) -> (tempfile::TempDir, Router) {
        app_sharing(Arc::new(compositor))
    }

    fn app_sharing(compositor: Arc<FakeCompositor>) -> (tempfile::TempDir, Router) {
        let tmp = tempfile::tempdir().unwrap();
        let config = AppConfig::default().with_output_dir(tmp.path());
        config.ensure_dirs().unwrap();
        let pipeline = Pipeline::new(
            config,
            Arc::new(FakeClips::default()),
            Arc::new(FakeSpeech::default()),
            compositor,
        );
        (tmp, create_router(AppState::new(pipeline)))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/generate-video")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn home_reports_running() {
        let (_tmp, app) = app_with(FakeCompositor::default());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"<h1>API is Running</h1>");
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (_tmp, app) = app_with(FakeCompositor::default());
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn missing_text_is_bad_request() {
        for body in ["{}", r#"{"txt": "hello"}"#, r#"{"text": 42}"#, "not json", ""] {
            let (_tmp, app) = app_with(FakeCompositor::default());
            let response = app.oneshot(post_json(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body {:?}", body);
            assert_eq!(json_body(response).await["error"], "Text field is required");
        }
    }

    #[tokio::test]
    async fn successful_render_returns_filename() {
        let (_tmp, app) = app_with(FakeCompositor::default());
        let text = "Water conservation is essential for our planet's future.";
        let response = app
            .oneshot(post_json(&serde_json::json!({ "text": text }).to_string()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Video generated successfully");
        assert_eq!(body["transcript"], text);
        let name = body["video_filename"].as_str().unwrap();
        assert!(name.starts_with("video_") && name.ends_with(".mp4"), "{}", name);
    }

    #[tokio::test]
    async fn pipeline_failure_is_server_error() {
        let compositor = FakeCompositor {
            fail: true,
            ..FakeCompositor::default()
        };
        let (_tmp, app) = app_with(compositor);
        let response = app
            .oneshot(post_json(r#"{"text": "Plenty of keywords right here"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "Failed to generate video");
    }

    #[tokio::test]
    async fn text_without_keywords_is_server_error() {
        let (_tmp, app) = app_with(FakeCompositor::default());
        let response = app.oneshot(post_json(r#"{"text": ""}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn abandoned_request_still_blocks_next_render() {
        let compositor = Arc::new(FakeCompositor {
            delay: Duration::from_millis(500),
            ..FakeCompositor::default()
        });
        let (_tmp, app) = app_sharing(Arc::clone(&compositor));
        let body = r#"{"text": "Plenty of keywords right here"}"#;

        let abandoned =
            tokio::time::timeout(Duration::from_millis(100), app.clone().oneshot(post_json(body)))
                .await;
        assert!(abandoned.is_err(), "first render should still be running");

        let response = app.oneshot(post_json(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(compositor.peak.load(Ordering::SeqCst), 1, "renders overlapped");
    }

    #[tokio::test]
    async fn rendered_videos_are_served() {
        let (tmp, app) = app_with(FakeCompositor::default());
        std::fs::write(tmp.path().join("videos").join("video_abc.mp4"), b"mp4-bytes").unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/videos/video_abc.mp4")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"mp4-bytes");
    }

    #[test]
    fn error_statuses() {
        assert_eq!(ApiError::MissingText.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::GenerationFailed.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::Processing("boom".into()).to_string(),
            "Processing failed: boom"
        );
    }
}
