// Copyright 2026 Deepcrawl Contributors
// SPDX-License-Identifier: Apache-2.0

//! Read-only HTTP view of archived artifacts.
//!
//! Runs alongside the pipeline and shares nothing with it but the
//! filesystem. Every request reads a fresh directory snapshot, so listings
//! may be slightly stale but never inconsistent with what can be served.

use crate::artifact::{ArtifactKind, RunLayout, RunSlot, StoredArtifact};
use crate::error::CrawlError;
use anyhow::Context;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared handler state.
pub struct ServerState {
    pub layout: RunLayout,
}

/// Build the axum Router with all artifact endpoints.
pub fn router(layout: RunLayout) -> Router {
    let state = Arc::new(ServerState { layout });

    Router::new()
        .route("/", get(list_current))
        .route("/old_runs/", get(list_cold))
        .route("/html/:filename", get(serve_artifact))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the listening socket. Fails fast when the address is taken.
pub async fn bind(addr: SocketAddr) -> anyhow::Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("artifact server cannot listen on {addr}"))
}

/// Serve on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, layout: RunLayout, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    info!("artifact server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(layout))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn start<F>(addr: SocketAddr, layout: RunLayout, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    serve(bind(addr).await?, layout, shutdown).await
}

// ── Handlers ────────────────────────────────────────────────────

async fn health() -> Json<Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_current(State(state): State<Arc<ServerState>>) -> Response {
    listing(&state, RunSlot::Current)
}

async fn list_cold(State(state): State<Arc<ServerState>>) -> Response {
    listing(&state, RunSlot::Cold)
}

fn listing(state: &ServerState, slot: RunSlot) -> Response {
    let layout = &state.layout;
    let listed = layout
        .list(slot, ArtifactKind::Html)
        .and_then(|html| Ok((html, layout.list(slot, ArtifactKind::Json)?)));

    match listed {
        Ok((html, json)) => Html(render_listing(slot, &html, &json)).into_response(),
        Err(e) => {
            error!(dir = %layout.dir(slot).display(), "listing failed: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, "listing unavailable").into_response()
        }
    }
}

async fn serve_artifact(
    State(state): State<Arc<ServerState>>,
    filename: Result<Path<String>, PathRejection>,
) -> Result<Response, CrawlError> {
    let Ok(Path(filename)) = filename else {
        return Err(CrawlError::NotFound("unparseable artifact path".into()));
    };
    let (path, kind) = state
        .layout
        .resolve(&filename)
        .ok_or_else(|| CrawlError::NotFound(filename.clone()))?;
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(header::CONTENT_TYPE, kind.content_type())], bytes).into_response()),
        // Rotated away between resolve and read.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CrawlError::NotFound(filename)),
        Err(e) => Err(CrawlError::fs(path, e)),
    }
}

impl IntoResponse for CrawlError {
    fn into_response(self) -> Response {
        match self {
            CrawlError::NotFound(_) => (StatusCode::NOT_FOUND, "File not found.").into_response(),
            other => {
                error!("artifact read failed: {other}");
                (StatusCode::INTERNAL_SERVER_ERROR, "artifact unavailable").into_response()
            }
        }
    }
}

// ── Rendering ───────────────────────────────────────────────────

fn render_listing(slot: RunSlot, html: &[StoredArtifact], json: &[StoredArtifact]) -> String {
    let (title, other_label, other_href) = match slot {
        RunSlot::Current => ("Current Run: Scraped HTML Files", "OLD RUNS", "/old_runs/"),
        RunSlot::Cold => ("Old Runs: Scraped HTML Files", "BACK TO HOME", "/"),
    };

    let mut items = String::new();
    for artifact in html {
        let name = escape_html(&artifact.name);
        items.push_str(&format!("<li><a href=\"/html/{name}\">{name}</a>"));
        let sidecar = std::path::Path::new(&artifact.name)
            .with_extension(ArtifactKind::Json.extension());
        if let Some(sidecar) = sidecar.to_str() {
            if json.iter().any(|j| j.name == sidecar) {
                let sidecar = escape_html(sidecar);
                items.push_str(&format!(" [<a href=\"/html/{sidecar}\">json</a>]"));
            }
        }
        items.push_str("</li>\n");
    }

    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body><h1>{title}</h1><p><a href=\"{other_href}\">{other_label}</a></p>\
         <ul>\n{items}</ul></body></html>\n"
    )
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
