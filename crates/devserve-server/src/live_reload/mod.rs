//! Live reload: file watching and event-stream broadcasting.

mod broadcaster;
mod debouncer;
mod stream;
mod watcher;

pub use broadcaster::{LiveReloadBroadcaster, SubscriberId, Subscription};
pub(crate) use stream::event_stream_handler;
pub(crate) use watcher::{IgnoreFilter, LiveReloadWatcher};

/// Path of the event-stream endpoint browsers subscribe to.
pub const LIVE_RELOAD_PATH: &str = "/__livereload";
