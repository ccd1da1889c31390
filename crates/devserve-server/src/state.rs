//! Application state.
//!
//! Shared state for all request handlers.

use crate::live_reload::LiveReloadBroadcaster;
use crate::resolver::PathResolver;

/// Application state shared across all handlers.
pub(crate) struct AppState {
    /// Maps request paths to files under the static root.
    pub(crate) resolver: PathResolver,
    /// Live reload subscribers.
    pub(crate) live_reload: LiveReloadBroadcaster,
}
