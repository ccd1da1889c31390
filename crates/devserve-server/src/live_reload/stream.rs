//! Event-stream endpoint for live reload.
//!
//! Each request becomes a subscription whose frames are written as the
//! response body until the browser disconnects.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// Open a live reload event stream.
pub(crate) async fn event_stream_handler(State(state): State<Arc<AppState>>) -> Response {
    let subscription = state.live_reload.subscribe();

    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/event-stream"),
            ),
            (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (header::CONNECTION, HeaderValue::from_static("keep-alive")),
        ],
        Body::from_stream(subscription),
    )
        .into_response()
}
