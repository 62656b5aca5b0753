//! HTTP server.
//!
//! Serves the search page and streams results into it while the search is
//! still running.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Search form, landing page or streamed results |
//! | `GET`  | `/config` | The configured `server.config_page` document |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! A malformed query is rejected with `400 Bad input: ...` before anything is
//! streamed. Once results start flowing the status is already `200`, so a
//! failing search is reported as an inline `alert-danger` notice after the
//! partial results instead.

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::{Body, Bytes},
    extract::{Query as FormQuery, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use futures::StreamExt;
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::SinkError;
use crate::metadata::{IndexMetadata, MetadataResolver};
use crate::models::CorpusStats;
use crate::page;
use crate::query::{parse_query, EntryMode, Query};
use crate::render::{self, ChannelSink, FragmentSink};
use crate::source::{IndexSource, MatchSource};
use crate::stats::{IndexStats, StatsProvider};

/// Response chunks queued ahead of a slow client.
const BODY_CHANNEL: usize = 16;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    source: Arc<dyn MatchSource>,
    metadata: Arc<dyn MetadataResolver>,
    stats: Arc<dyn StatsProvider>,
}

impl AppState {
    /// State with custom backends, e.g. a different search engine.
    pub fn new(
        config: Config,
        source: Arc<dyn MatchSource>,
        metadata: Arc<dyn MetadataResolver>,
        stats: Arc<dyn StatsProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            source,
            metadata,
            stats,
        }
    }

    /// State backed by the directory index named in `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let root = &config.index.root;
        let source = IndexSource::new(
            root,
            config.search.max_hit_lines,
            config.search.max_file_bytes,
        )?;
        let metadata = IndexMetadata::new(root, config.job_url_base());
        let stats = IndexStats::new(
            root,
            std::time::Duration::from_secs(config.index.stats_refresh_secs),
        );
        Ok(Self::new(
            config.clone(),
            Arc::new(source),
            Arc::new(metadata),
            Arc::new(stats),
        ))
    }

    async fn corpus_stats(&self) -> CorpusStats {
        let stats = self.stats.clone();
        tokio::task::spawn_blocking(move || stats.stats())
            .await
            .unwrap_or_default()
    }
}

/// Build the router for `state`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/config", get(handle_config))
        .route("/health", get(handle_health))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind` over the configured index.
///
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> Result<()> {
    let state = AppState::from_config(config)?;
    let listener = TcpListener::bind(&config.server.bind).await?;
    info!("ci-search listening on http://{}", listener.local_addr()?);
    serve(listener, state).await
}

/// Serve `state` on an already bound listener.
pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============ Error response ============

/// Error returned before any part of the response body was sent.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message,
        )
            .into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /config ============

async fn handle_config(State(state): State<AppState>) -> Result<Response, AppError> {
    let Some(path) = &state.config.server.config_page else {
        return Ok(StatusCode::NO_CONTENT.into_response());
    };
    let data = tokio::fs::read(path)
        .await
        .map_err(|e| internal(format!("Unable to read config: {}", e)))?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], data).into_response())
}

// ============ GET / ============

/// Handler for `GET /`.
///
/// Validates the query, then either returns the landing page or starts a
/// search whose results are streamed into the response body by a spawned
/// task.
async fn handle_index(
    State(state): State<AppState>,
    FormQuery(form): FormQuery<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let query = parse_query(&form, EntryMode::Text, state.config.max_age())
        .map_err(|e| bad_request(format!("Bad input: {}", e)))?;

    let mut head = page::page_start(page::PAGE_TITLE);
    head.push_str(&page::search_form(&query));

    if query.is_empty() {
        let stats = state.corpus_stats().await;
        head.push_str(&page::landing(stats));
        head.push_str(page::PAGE_END);
        return Ok(Html(head).into_response());
    }

    let (tx, rx) = mpsc::channel::<Bytes>(BODY_CHANNEL);
    tokio::spawn(stream_results(state, query, head, ChannelSink::new(tx)));

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<Bytes, Infallible>));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/html; charset=utf-8")
        .body(body)
        .map_err(|e| internal(e.to_string()))
}

async fn send_all(sink: &mut ChannelSink, parts: &[&str]) -> Result<(), SinkError> {
    for part in parts {
        sink.write(part).await?;
    }
    sink.flush().await
}

/// Render one search into `sink`, framed by the page shell.
async fn stream_results(state: AppState, query: Query, head: String, mut sink: ChannelSink) {
    let search = query.patterns[0].clone();
    if let Err(err) = send_all(&mut sink, &[head.as_str()]).await {
        debug!("client left before search {:?} started: {}", search, err);
        return;
    }

    if let Err(err) = sink.write(page::RESULTS_START).await {
        debug!("client left before results of {:?}: {}", search, err);
        return;
    }

    let start = Utc::now();
    let events = state.source.search(&query, state.config.time_budget());
    let stats = render::render(events, &query, state.metadata.as_ref(), start, &mut sink).await;

    let tail = match &stats.error {
        Some(err) if err.is_disconnect() => {
            warn!(
                "Search {:?} abandoned with {} results in {:?}: {}",
                search, stats.matched, stats.elapsed, err
            );
            return;
        }
        Some(err) => {
            error!(
                "Search {:?} failed with {} results in {:?}: {}",
                search, stats.matched, stats.elapsed, err
            );
            page::error_notice(&err.to_string())
        }
        None => {
            info!(
                "Search {:?} completed with {} results in {:?}",
                search, stats.matched, stats.elapsed
            );
            let corpus = state.corpus_stats().await;
            page::results_end(stats.matched, stats.elapsed, corpus)
        }
    };

    if let Err(err) = send_all(&mut sink, &[tail.as_str(), page::PAGE_END]).await {
        debug!("unable to finish response for {:?}: {}", search, err);
    }
}
