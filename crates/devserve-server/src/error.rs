//! Error types for the dev server.

/// Server error type.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The listening socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested (`host:port`).
        addr: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The accept loop failed.
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Live reload watcher error. Never fatal: the server runs without reloads.
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The platform watcher could not be created or attached.
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),
}
