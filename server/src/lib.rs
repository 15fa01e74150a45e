pub mod config;
pub mod error;
pub mod sessions;
pub mod validation;

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use pitch_core::{
    render_overview, EditorEvent, Frame, FrameTarget, MelScale, PitchDocument, PitchError, RenderCommand,
};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_governor::{governor::GovernorConfigBuilder, key_extractor::GlobalKeyExtractor, GovernorLayer};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::sessions::{lock_session, SessionStore, SharedSession};
use crate::validation::{parse_session_id, validate_canvas_height, validate_canvas_size, validate_scale};

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            sessions: SessionStore::new(config.max_sessions, config.canvas_height),
            config,
        }
    }
}

/// One rendered canvas, PNG encoded for transport.
#[derive(Debug, Serialize)]
pub struct FrameResponse {
    pub target: FrameTarget,
    pub width: u32,
    pub height: u32,
    pub png_base64: String,
}

impl FrameResponse {
    pub fn from_frame(frame: &Frame) -> Result<Self, PitchError> {
        Ok(Self {
            target: frame.target.clone(),
            width: frame.image.width(),
            height: frame.image.height(),
            png_base64: frame.png_base64()?,
        })
    }
}

#[derive(Deserialize)]
pub struct RenderParams {
    scale: Option<f64>,
    height: Option<u32>,
}

#[derive(Serialize)]
pub struct RenderResponse {
    width: u32,
    height: u32,
    png_base64: String,
}

#[derive(Serialize)]
pub struct ScaleResponse {
    floor_hz: f64,
    ceil_hz: f64,
    bands: usize,
    band_frequencies: Vec<f64>,
}

#[derive(Serialize)]
pub struct CreateSessionResponse {
    id: Uuid,
    created_at: DateTime<Utc>,
    canvas_height: u32,
}

#[derive(Serialize)]
pub struct LoadResponse {
    generation: u64,
    columns: usize,
    bands: usize,
    contours: Vec<String>,
    frames: Vec<FrameResponse>,
}

#[derive(Deserialize)]
pub struct EventParams {
    render: Option<bool>,
}

#[derive(Serialize)]
pub struct EventResponse {
    commands: Vec<RenderCommand>,
    frames: Vec<FrameResponse>,
}

/// Routes and per-request plumbing, without the outer middleware stack.
pub fn router(state: AppState) -> Router {
    // Request ID middleware for tracing
    async fn add_request_id(mut request: Request, next: Next) -> Response {
        let request_id = Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            request.headers_mut().insert("x-request-id", value.clone());
            let mut response = next.run(request).await;
            response.headers_mut().insert("x-request-id", value);
            return response;
        }
        next.run(request).await
    }

    let api = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .route("/scale", get(scale_info))
        .route("/render", post(render_endpoint))
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", axum::routing::delete(delete_session))
        .route("/sessions/{id}/document", post(load_document))
        .route("/sessions/{id}/events", post(session_event))
        .route("/sessions/{id}/frame", get(editor_frame))
        .route("/sessions/{id}/final", get(download_final));

    let max_body = state.config.max_document_bytes;

    Router::new()
        .merge(api.clone()) // root paths
        .nest("/api", api) // /api prefix
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body))
        .layer(axum::middleware::from_fn(add_request_id))
        .with_state(state)
}

/// The full application: routes plus tracing, rate limiting, timeouts and CORS.
pub fn build_app(state: AppState) -> anyhow::Result<Router> {
    let config = state.config.clone();

    // CORS configuration - environment-aware
    let cors = match config.cors_allowed_origins.as_ref() {
        Some(allowed) => {
            let origins: Vec<HeaderValue> = allowed.iter().filter_map(|o| o.parse::<HeaderValue>().ok()).collect();
            if origins.is_empty() {
                warn!("CORS_ALLOWED_ORIGINS is empty, falling back to permissive CORS");
                permissive_cors()
            } else {
                info!("CORS configured for {} origin(s)", origins.len());
                CorsLayer::new()
                    .allow_origin(tower_http::cors::AllowOrigin::list(origins))
                    .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                    .allow_headers(tower_http::cors::Any)
                    .allow_credentials(false)
            }
        }
        None => {
            warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (development mode)");
            permissive_cors()
        }
    };

    // Global rate limit: pointer events from one editor arrive in bursts, so
    // the burst size is the full per-minute allowance.
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .period(config.rate_limit_period())
            .burst_size(config.rate_limit_per_minute.max(1))
            .key_extractor(GlobalKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("invalid rate limit configuration"))?,
    );
    info!("Rate limiting: {} requests per minute", config.rate_limit_per_minute);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(cors)
        .into_inner();

    Ok(router(state).layer(middleware_stack))
}

fn permissive_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
        .allow_credentials(false)
}

fn find_session(state: &AppState, id: &str) -> Result<(Uuid, SharedSession), ApiError> {
    let id = parse_session_id(id)?;
    let session = state
        .sessions
        .get(&id)
        .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", id)))?;
    Ok((id, session))
}

fn canvas_width_for(columns: usize, scale: f64) -> u32 {
    ((columns as f64 * scale).floor() as u32).max(1)
}

pub async fn health_check() -> &'static str {
    "ok"
}

pub async fn scale_info() -> Json<ScaleResponse> {
    let mel = MelScale::default();
    Json(ScaleResponse {
        floor_hz: mel.floor_hz,
        ceil_hz: mel.ceil_hz,
        bands: mel.bands,
        band_frequencies: mel.band_frequencies(),
    })
}

/// Render a document in one shot: heatmap with every contour overlaid.
pub async fn render_endpoint(
    State(state): State<AppState>,
    Query(params): Query<RenderParams>,
    body: Bytes,
) -> Result<Json<RenderResponse>, ApiError> {
    let scale = params.scale.unwrap_or(1.0);
    let height = params.height.unwrap_or(state.config.canvas_height);
    validate_scale(scale)?;
    validate_canvas_height(height)?;

    // Parsing and rasterizing are CPU bound; keep them off the async runtime.
    let response = tokio::task::spawn_blocking(move || -> Result<RenderResponse, ApiError> {
        let doc = PitchDocument::from_json_slice(&body)?;
        validate_canvas_size(canvas_width_for(doc.matrix.cols(), scale), height)?;

        let started = std::time::Instant::now();
        let image = render_overview(&doc, scale, height, &MelScale::default());
        info!(
            "Rendered overview {}x{} in {:.2}ms",
            image.width(),
            image.height(),
            started.elapsed().as_secs_f64() * 1000.0
        );

        Ok(RenderResponse {
            width: image.width(),
            height: image.height(),
            png_base64: pitch_core::encode_png_base64(&image)?,
        })
    })
    .await??;

    Ok(Json(response))
}

pub async fn create_session(State(state): State<AppState>) -> Json<CreateSessionResponse> {
    let (id, created_at) = state.sessions.create();
    Json(CreateSessionResponse {
        id,
        created_at,
        canvas_height: state.config.canvas_height,
    })
}

pub async fn delete_session(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let id = parse_session_id(&id)?;
    if state.sessions.remove(&id) {
        info!("Deleted session {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Session {} not found", id)))
    }
}

/// Load a document into a session.
///
/// The load ticket is taken before parsing starts, so if another upload for
/// the same session begins meanwhile this one completes as a 409 instead of
/// overwriting the newer document. The session lock is only taken on the
/// blocking pool.
pub async fn load_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<LoadResponse>, ApiError> {
    let (id, session) = find_session(&state, &id)?;

    let response = tokio::task::spawn_blocking(move || -> Result<LoadResponse, ApiError> {
        let ticket = {
            let mut entry = lock_session(&session)?;
            entry.touch();
            entry.editor.begin_load()
        };
        info!("Session {}: load generation {} started ({} bytes)", id, ticket.generation(), body.len());

        let doc = PitchDocument::from_json_slice(&body)?;

        let mut entry = lock_session(&session)?;
        validate_canvas_size(doc.matrix.cols() as u32, entry.editor.canvas_height())?;

        let columns = doc.matrix.cols();
        let bands = doc.matrix.rows();
        let contours = doc.contours.candidates().map(|(name, _)| name.to_string()).collect();

        let commands = entry.editor.complete_load(ticket, doc)?;
        let frames = entry.render(&commands)?;

        Ok(LoadResponse {
            generation: ticket.generation(),
            columns,
            bands,
            contours,
            frames,
        })
    })
    .await??;

    Ok(Json(response))
}

/// Feed one editor event to a session and return whatever had to be redrawn.
pub async fn session_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<EventParams>,
    Json(event): Json<EditorEvent>,
) -> Result<Json<EventResponse>, ApiError> {
    let (_, session) = find_session(&state, &id)?;
    let render = params.render.unwrap_or(true);

    let response = tokio::task::spawn_blocking(move || -> Result<EventResponse, ApiError> {
        let mut entry = lock_session(&session)?;
        entry.touch();

        if event == EditorEvent::ZoomIn {
            validate_canvas_size(entry.editor.canvas_width().saturating_mul(2), entry.editor.canvas_height())?;
        }

        let commands = entry.editor.handle(event)?;
        let frames = if render { entry.render(&commands)? } else { Vec::new() };
        Ok(EventResponse { commands, frames })
    })
    .await??;

    Ok(Json(response))
}

/// Current editor canvas.
pub async fn editor_frame(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<FrameResponse>, ApiError> {
    let (_, session) = find_session(&state, &id)?;

    let frame = tokio::task::spawn_blocking(move || -> Result<FrameResponse, ApiError> {
        let mut entry = lock_session(&session)?;
        entry.touch();
        let frames = entry.render(&[RenderCommand::RenderEditor])?;
        frames.into_iter().next().ok_or_else(|| PitchError::NoDocument.into())
    })
    .await??;

    Ok(Json(frame))
}

/// Download the `"final"` contour as a JSON array.
pub async fn download_final(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response, ApiError> {
    let (_, session) = find_session(&state, &id)?;
    let body = tokio::task::spawn_blocking(move || -> Result<String, ApiError> {
        let entry = lock_session(&session)?;
        Ok(entry.editor.document().ok_or(PitchError::NoDocument)?.final_json())
    })
    .await??;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"final.json\""),
        ],
        body,
    )
        .into_response())
}
