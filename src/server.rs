//! HTTP hosting for the archive on axum.
//!
//! Every request is handed to [`Archive::handle`] on the blocking pool,
//! since page handlers run synchronous SQLite queries.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::Router;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info};

use crate::archive::Archive;
use crate::web::{RawRequest, Response};

/// Largest request body accepted (form posts only).
const MAX_BODY_SIZE: usize = 1024 * 1024;

type SharedArchive = Arc<Archive>;

/// Bind `addr` and serve until Ctrl-C or SIGTERM.
pub async fn serve(archive: SharedArchive, addr: SocketAddr) -> std::io::Result<()> {
    let router = build_router(archive);
    info!(%addr, "Binding HTTP listener");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("HTTP server exited");
    Ok(())
}

/// All paths go through one fallback; the archive does its own routing.
pub fn build_router(archive: SharedArchive) -> Router {
    Router::new()
        .fallback(forward)
        .with_state(archive)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new())
                .on_response(DefaultOnResponse::new()),
        )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

async fn forward(State(archive): State<SharedArchive>, request: Request) -> axum::response::Response {
    let raw = match into_raw(request).await {
        Ok(raw) => raw,
        Err(response) => return into_axum(response),
    };

    match tokio::task::spawn_blocking(move || archive.handle(raw)).await {
        Ok(response) => into_axum(response),
        Err(e) => {
            error!(error = %e, "Request task failed");
            into_axum(Response::unexpected_error(&e.to_string()))
        }
    }
}

async fn into_raw(request: Request) -> Result<RawRequest, Response> {
    let (parts, body) = request.into_parts();
    let header_text = |name: header::HeaderName| {
        parts
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let content_type = header_text(header::CONTENT_TYPE);
    let if_modified_since = header_text(header::IF_MODIFIED_SINCE);
    let body = axum::body::to_bytes(body, MAX_BODY_SIZE)
        .await
        .map_err(|_| Response::with_content(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body too large",
            "text/plain; charset=utf-8",
        ))?;

    Ok(RawRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(str::to_string),
        content_type,
        if_modified_since,
        body: body.to_vec(),
    })
}

fn into_axum(response: Response) -> axum::response::Response {
    let (status, headers, body) = response.into_parts();
    let mut builder = axum::http::Response::builder().status(status);
    for (name, value) in &headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder.body(Body::from(body)).unwrap_or_else(|e| {
        error!(error = %e, "Invalid response header");
        let mut fallback = axum::response::Response::new(Body::empty());
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    })
}
