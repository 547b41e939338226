//! # HTTP Server
//!
//! Serves the submission form, the sealing endpoint and sealed manifest downloads,
//! plus metrics and Kubernetes probes.
//!
//! Provides endpoints:
//! - `GET /` - Form with the namespace dropdown
//! - `POST /` - Submit `env_content` and `namespace`, returns the sealed secret page
//! - `GET /download/{filename}` - Sealed manifest as an attachment
//! - `/metrics` - Prometheus metrics in text format
//! - `/healthz` - Liveness probe (always returns 200)
//! - `/readyz` - Readiness probe (returns 200 once the server is serving)

use crate::constants::DEFAULT_NAMESPACE;
use crate::namespaces::NamespaceList;
use crate::observability::metrics;
use crate::pipeline::{Pipeline, PipelineError, SealedManifest, WorkingStorage};
use anyhow::{Context as _, Result};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tera::{Context, Tera};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const INDEX_TEMPLATE: &str = include_str!("../templates/index.html");
const SEALED_TEMPLATE: &str = include_str!("../templates/sealed_secret.html");

pub struct AppState {
    pub pipeline: Pipeline,
    pub storage: WorkingStorage,
    pub templates: Tera,
    pub is_ready: AtomicBool,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pipeline", &self.pipeline)
            .field("storage", &self.storage)
            .field("is_ready", &self.is_ready.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(pipeline: Pipeline, storage: WorkingStorage) -> Result<Self> {
        let mut templates = Tera::default();
        templates
            .add_raw_templates(vec![
                ("index.html", INDEX_TEMPLATE),
                ("sealed_secret.html", SEALED_TEMPLATE),
            ])
            .context("Failed to load HTML templates")?;
        Ok(Self {
            pipeline,
            storage,
            templates,
            is_ready: AtomicBool::new(false),
        })
    }
}

/// Form fields posted to `/`
#[derive(Debug, Deserialize)]
pub struct SubmitForm {
    #[serde(default)]
    pub env_content: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler).post(submit_handler))
        .route("/download/{filename}", get(download_handler))
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(address: &str, state: Arc<AppState>) -> Result<()> {
    let app = router(Arc::clone(&state));

    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;

    info!("HTTP server listening on {}", address);
    state.is_ready.store(true, Ordering::Relaxed);

    axum::serve(listener, app).await?;

    Ok(())
}

struct FormView<'a> {
    namespaces: &'a NamespaceList,
    selected_namespace: &'a str,
    env_content: &'a str,
    error_message: &'a str,
}

fn render_index(state: &AppState, view: &FormView<'_>) -> Response {
    let mut context = Context::new();
    context.insert("namespaces", &view.namespaces.names);
    context.insert("used_fallback", &view.namespaces.used_fallback);
    context.insert("selected_namespace", view.selected_namespace);
    context.insert("env_content", view.env_content);
    context.insert("error_message", view.error_message);
    render(state, "index.html", &context)
}

fn render_sealed(state: &AppState, sealed: &SealedManifest) -> Response {
    let mut context = Context::new();
    context.insert("secret_name", sealed.secret_name().unwrap_or_default());
    context.insert("namespace", sealed.namespace().unwrap_or(DEFAULT_NAMESPACE));
    context.insert("keys", &sealed.encrypted_keys().collect::<Vec<_>>());
    context.insert("sealed_yaml", &sealed.yaml);
    context.insert("file_name", &sealed.file_name);
    render(state, "sealed_secret.html", &context)
}

fn render(state: &AppState, template: &str, context: &Context) -> Response {
    match state.templates.render(template, context) {
        Ok(body) => Html(body).into_response(),
        Err(e) => {
            error!("Failed to render {}: {:?}", template, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    let namespaces = state.pipeline.namespaces().await;
    render_index(
        &state,
        &FormView {
            namespaces: &namespaces,
            selected_namespace: DEFAULT_NAMESPACE,
            env_content: "",
            error_message: "",
        },
    )
}

async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<SubmitForm>,
) -> Response {
    let namespace = form.namespace.as_deref().unwrap_or(DEFAULT_NAMESPACE);

    match state.pipeline.submit(&form.env_content, namespace).await {
        Ok(sealed) => render_sealed(&state, &sealed),
        Err(PipelineError::EmptyInput) => {
            (StatusCode::BAD_REQUEST, "❌ Error: No input provided").into_response()
        }
        Err(e @ PipelineError::Validation(_)) => {
            let namespaces = state.pipeline.namespaces().await;
            let message = format!("❌ {e}");
            let mut response = render_index(
                &state,
                &FormView {
                    namespaces: &namespaces,
                    selected_namespace: namespace,
                    env_content: &form.env_content,
                    error_message: &message,
                },
            );
            if response.status() == StatusCode::OK {
                *response.status_mut() = StatusCode::UNPROCESSABLE_ENTITY;
            }
            response
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("❌ Error: {e}")).into_response(),
    }
}

async fn download_handler(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Response {
    let Some(path) = state.storage.resolve_download(&filename) else {
        return (StatusCode::NOT_FOUND, "Not found").into_response();
    };

    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/x-yaml".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to read {}: {}", path.display(), e);
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    }
}

async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = metrics::gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        );
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        buffer,
    )
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
