//! HTTP server for devserve.
//!
//! Serves a directory of static files for single-page applications:
//! - Exact files, then directory `index.html`, then the root `index.html`
//!   (SPA fallback), then a plain-text 404
//! - Cache-defeating headers on every static response
//! - An event stream at `/__livereload` that tells browsers to reload when
//!   files under the root change
//!
//! # Quick Start
//!
//! ```ignore
//! use std::path::PathBuf;
//! use devserve_server::{DevServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig {
//!         root_dir: PathBuf::from("public"),
//!         ..ServerConfig::default()
//!     };
//!
//!     let server = DevServer::bind(config).await.unwrap();
//!     println!("listening on {}", server.local_addr());
//!     server.serve().await.unwrap();
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! Browser ──HTTP──► axum router
//!                        │
//!                        ├─► /__livereload ──► LiveReloadBroadcaster::subscribe
//!                        │                            ▲
//!                        │                            │ broadcast
//!                        │                     LiveReloadWatcher (notify)
//!                        │
//!                        └─► everything else ──► PathResolver ──► tokio::fs
//! ```

mod app;
mod error;
mod live_reload;
mod middleware;
mod resolver;
mod state;
mod static_files;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

pub use error::{ServerError, WatchError};
pub use live_reload::{LIVE_RELOAD_PATH, LiveReloadBroadcaster, SubscriberId, Subscription};
pub use resolver::{PathResolver, ResolvedFile};

use live_reload::{IgnoreFilter, LiveReloadWatcher};
use state::AppState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on (0 picks a free port).
    pub port: u16,
    /// Directory static files are served from.
    pub root_dir: PathBuf,
    /// Index document name.
    pub index_file: String,
    /// Serve the root index document for unmatched routes.
    pub spa_fallback: bool,
    /// Watch the root and push reload events.
    pub live_reload_enabled: bool,
    /// Debounce window for file events.
    pub debounce: Duration,
    /// Glob patterns that never trigger a reload.
    pub ignore_patterns: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: devserve_config::DEFAULT_PORT,
            root_dir: PathBuf::from("."),
            index_file: devserve_config::DEFAULT_INDEX_FILE.to_owned(),
            spa_fallback: true,
            live_reload_enabled: true,
            debounce: Duration::from_millis(devserve_config::DEFAULT_DEBOUNCE_MS),
            ignore_patterns: Vec::new(),
        }
    }
}

/// Create server configuration from devserve config.
#[must_use]
pub fn server_config_from_config(config: &devserve_config::Config) -> ServerConfig {
    ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        root_dir: config.site_resolved.root_dir.clone(),
        index_file: config.site_resolved.index_file.clone(),
        spa_fallback: config.site_resolved.spa_fallback,
        live_reload_enabled: config.live_reload.enabled,
        debounce: Duration::from_millis(config.live_reload.debounce_ms),
        ignore_patterns: config.live_reload.ignore.clone(),
    }
}

/// A bound, not yet serving, dev server.
pub struct DevServer {
    listener: TcpListener,
    router: Router,
    broadcaster: LiveReloadBroadcaster,
    watcher: Option<LiveReloadWatcher>,
}

impl DevServer {
    /// Bind the listening socket and start the file watcher.
    ///
    /// A watcher that cannot start only disables live reload; the event-stream
    /// endpoint stays available and simply never fires.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket cannot be bound.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let broadcaster = LiveReloadBroadcaster::new();

        let watcher = if config.live_reload_enabled {
            match LiveReloadWatcher::start(
                &config.root_dir,
                config.debounce,
                IgnoreFilter::new(&config.ignore_patterns),
                broadcaster.clone(),
            ) {
                Ok(watcher) => Some(watcher),
                Err(error) => {
                    tracing::warn!(%error, "File watching unavailable; live reload disabled");
                    None
                }
            }
        } else {
            None
        };

        let resolver = PathResolver::new(config.root_dir.clone())
            .with_index_file(config.index_file.clone())
            .with_spa_fallback(config.spa_fallback);

        let state = Arc::new(AppState {
            resolver,
            live_reload: broadcaster.clone(),
        });

        Ok(Self {
            listener,
            router: app::create_router(state),
            broadcaster,
            watcher,
        })
    }

    /// Address the server is listening on.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.listener
            .local_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)))
    }

    /// Whether file changes will be pushed to browsers.
    #[must_use]
    pub fn live_reload_active(&self) -> bool {
        self.watcher.is_some()
    }

    /// Serve requests until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the accept loop fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        tracing::info!(address = %self.local_addr(), "Starting server");

        let result = axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal(self.broadcaster))
            .await
            .map_err(ServerError::Serve);

        drop(self.watcher);
        result
    }
}

/// Wait for Ctrl-C, then end open event streams so shutdown can complete.
async fn shutdown_signal(broadcaster: LiveReloadBroadcaster) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
    broadcaster.close_all();
}
