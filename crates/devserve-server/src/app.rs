//! Router construction.
//!
//! `/__livereload` opens an event stream; every other request is resolved
//! against the static root.

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::live_reload::{self, LIVE_RELOAD_PATH};
use crate::middleware::headers;
use crate::state::AppState;
use crate::static_files;

/// Create the application router.
pub(crate) fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(LIVE_RELOAD_PATH, get(live_reload::event_stream_handler))
        .fallback(static_files::serve_static)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(headers::allow_any_origin_layer()),
        )
        .with_state(state)
}
