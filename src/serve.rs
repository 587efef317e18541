//! Purpose: Provide the HTTP server that hands out decoded deck reports.
//! Exports: `ServeConfig`, `serve`, `validate_config`.
//! Role: Axum-based server over a shared `DeckRegistry`.
//! Invariants: Reports are `text/plain` bytes as decoded; errors use the JSON error envelope.
//! Invariants: Loopback-only unless explicitly allowed.
//! Notes: Decoding runs on the blocking pool; waits on in-flight decodes are bounded.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path as AxumPath, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use deckstring::api::{DeckRegistry, Error, ErrorKind};

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub deck_dir: Option<PathBuf>,
    pub allow_non_loopback: bool,
    pub max_body_bytes: u64,
    pub decode_wait_ms: u64,
}

struct AppState {
    registry: DeckRegistry,
    decode_wait: Duration,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let max_body_bytes: usize = config
        .max_body_bytes
        .try_into()
        .map_err(|_| Error::new(ErrorKind::Usage).with_message("--max-body-bytes is too large"))?;

    let registry = DeckRegistry::new();
    if let Some(dir) = &config.deck_dir {
        let loaded = registry.load_dir(dir)?;
        tracing::info!(loaded, dir = %dir.display(), "loaded decks");
    }

    let state = Arc::new(AppState {
        registry,
        decode_wait: Duration::from_millis(config.decode_wait_ms),
    });

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/decks", get(list_decks))
        .route("/deck/:name", get(get_deck).put(put_deck).delete(delete_deck))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    tracing::info!(bind = %config.bind, "serving decks");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(|err| {
                Error::new(ErrorKind::Io)
                    .with_message("server failed")
                    .with_source(err)
            })?;
        }
        _ = shutdown_signal() => {
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(|err| {
                    Error::new(ErrorKind::Io)
                        .with_message("server failed")
                        .with_source(err)
                })?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

pub fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if config.max_body_bytes == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes must be greater than zero")
            .with_hint("Use a positive value like 1048576."));
    }

    if config.max_body_bytes > usize::MAX as u64 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-body-bytes exceeds platform limits")
            .with_hint("Use a smaller value that fits in memory."));
    }

    if config.decode_wait_ms == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--decode-wait-ms must be greater than zero")
            .with_hint("Use a positive value like 5000."));
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    deck: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

async fn list_decks(State(state): State<Arc<AppState>>) -> Response {
    Json(json!({ "decks": state.registry.names() })).into_response()
}

async fn get_deck(State(state): State<Arc<AppState>>, AxumPath(name): AxumPath<String>) -> Response {
    let result = tokio::task::spawn_blocking(move || {
        state.registry.report_timeout(&name, state.decode_wait)
    })
    .await;

    match result {
        Ok(Ok(report)) => {
            let mut response = Response::new(axum::body::Body::from(report));
            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain"),
            );
            response
        }
        Ok(Err(err)) => error_response(err),
        Err(join_err) => error_response(
            Error::new(ErrorKind::Internal)
                .with_message("decode task failed")
                .with_source(join_err),
        ),
    }
}

async fn put_deck(
    State(state): State<Arc<AppState>>,
    AxumPath(name): AxumPath<String>,
    body: Bytes,
) -> Response {
    if name.trim().is_empty() {
        return error_response(Error::new(ErrorKind::Usage).with_message("deck name is empty"));
    }
    let len = body.len();
    state.registry.insert(&name, body);
    tracing::info!(deck = %name, bytes = len, "registered deck");
    (
        StatusCode::CREATED,
        Json(json!({ "deck": { "name": name.to_lowercase(), "bytes": len } })),
    )
        .into_response()
}

async fn delete_deck(
    State(state): State<Arc<AppState>>,
    AxumPath(name): AxumPath<String>,
) -> Response {
    if state.registry.remove(&name) {
        Json(json!({ "ok": true })).into_response()
    } else {
        error_response(
            Error::new(ErrorKind::NotFound)
                .with_message("deck not found")
                .with_deck(name.to_lowercase()),
        )
    }
}

fn error_response(err: Error) -> Response {
    let status = match err.kind() {
        ErrorKind::Usage => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Busy => StatusCode::LOCKED,
        ErrorKind::Corrupt | ErrorKind::Io | ErrorKind::Internal => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
            deck: err.deck().map(str::to_string),
            hint: err.hint().map(str::to_string),
        },
    };
    (status, Json(body)).into_response()
}
