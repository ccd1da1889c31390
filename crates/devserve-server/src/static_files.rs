//! Static file serving with SPA fallback.
//!
//! [`PathResolver`](crate::resolver::PathResolver) picks the file; tower-http's
//! [`ServeFile`] streams it, which also brings `Content-Type`, range and
//! conditional request handling.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::middleware::headers::no_cache_headers;
use crate::state::AppState;

/// Serve the file resolved for the request path, or a plain-text 404.
pub(crate) async fn serve_static(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let Some(file) = state.resolver.resolve(request.uri().path()).await else {
        return (
            StatusCode::NOT_FOUND,
            no_cache_headers(),
            [(header::CONTENT_TYPE, "text/plain")],
            "Not found",
        )
            .into_response();
    };

    // Every method reads the file; HEAD keeps its body-less response.
    let (mut parts, body) = request.into_parts();
    if parts.method != Method::HEAD {
        parts.method = Method::GET;
    }

    let Ok(response) = ServeFile::new(&file.path)
        .oneshot(Request::from_parts(parts, body))
        .await;

    (no_cache_headers(), response.map(Body::new)).into_response()
}
