//! Request path resolution.
//!
//! Maps a request path to a file under the static root. Candidates are probed
//! in a fixed order and the first existing file wins:
//!
//! 1. the sanitized path itself (`index.html` appended for trailing `/`)
//! 2. the sanitized path as a directory, i.e. `<path>/index.html`
//! 3. the root `index.html` (SPA fallback, when enabled)
//!
//! Probing only looks at metadata; file contents are streamed later by the
//! static handler. Probe failures other than "not found" are logged and
//! otherwise treated as a miss, so a broken file never turns into a server
//! error.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use percent_encoding::percent_decode_str;

/// A file chosen to satisfy a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedFile {
    /// Path on disk, under the static root.
    pub path: PathBuf,
}

/// Outcome of probing a single candidate path.
#[derive(Debug)]
pub(crate) enum Probe {
    Found(ResolvedFile),
    NotFound,
    Error(std::io::Error),
}

/// Resolves request paths against a static root directory.
#[derive(Clone, Debug)]
pub struct PathResolver {
    root: PathBuf,
    index_file: String,
    spa_fallback: bool,
}

impl PathResolver {
    /// Create a resolver for `root` with `index.html` and SPA fallback enabled.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index_file: devserve_config::DEFAULT_INDEX_FILE.to_owned(),
            spa_fallback: true,
        }
    }

    /// Set the index document name.
    #[must_use]
    pub fn with_index_file(mut self, index_file: impl Into<String>) -> Self {
        self.index_file = index_file.into();
        self
    }

    /// Enable or disable the root index fallback for unmatched routes.
    #[must_use]
    pub fn with_spa_fallback(mut self, spa_fallback: bool) -> Self {
        self.spa_fallback = spa_fallback;
        self
    }

    /// Resolve a raw (still percent-encoded) request path to a file.
    ///
    /// Returns `None` when no candidate exists.
    pub async fn resolve(&self, request_path: &str) -> Option<ResolvedFile> {
        for candidate in self.candidates(request_path) {
            match probe(&candidate).await {
                Probe::Found(file) => {
                    tracing::debug!(
                        request = request_path,
                        path = %file.path.display(),
                        "Resolved request"
                    );
                    return Some(file);
                }
                Probe::NotFound => {}
                Probe::Error(error) => {
                    tracing::warn!(
                        path = %candidate.display(),
                        %error,
                        "Skipping unreadable file"
                    );
                }
            }
        }

        tracing::debug!(request = request_path, "No file matched request");
        None
    }

    /// Candidate paths for a request, in probe order.
    pub(crate) fn candidates(&self, request_path: &str) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(3);

        if let Some(relative) = self.sanitize(request_path) {
            let exact = self.root.join(&relative);
            let dir_index = exact.join(&self.index_file);
            candidates.push(exact);
            candidates.push(dir_index);
        } else {
            tracing::debug!(request = request_path, "Rejected path outside root");
        }

        if self.spa_fallback {
            candidates.push(self.root.join(&self.index_file));
        }

        candidates
    }

    /// Decode a request path into a path relative to the root.
    ///
    /// Leading separators are stripped. Returns `None` if the decoded path
    /// contains parent, root or prefix components.
    fn sanitize(&self, request_path: &str) -> Option<PathBuf> {
        let decoded = percent_decode_str(request_path).decode_utf8_lossy();
        let mut relative = decoded.trim_start_matches(['/', '\\']).to_owned();

        if relative.is_empty() || relative.ends_with(['/', '\\']) {
            relative.push_str(&self.index_file);
        }

        let relative = PathBuf::from(relative);
        let stays_inside = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

        stays_inside.then_some(relative)
    }
}

/// Probe a candidate path.
///
/// Directories and "not a directory" failures count as missing files.
pub(crate) async fn probe(path: &Path) -> Probe {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Probe::Found(ResolvedFile {
            path: path.to_path_buf(),
        }),
        Ok(_) => Probe::NotFound,
        Err(e) if is_missing(&e) => Probe::NotFound,
        Err(e) => Probe::Error(e),
    }
}

fn is_missing(error: &std::io::Error) -> bool {
    matches!(error.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory)
}
