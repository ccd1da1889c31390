//! File watcher driving live reload.
//!
//! notify delivers raw events on its own thread. They are forwarded into a
//! tokio task that filters ignored paths and feeds the debouncer; a second
//! task drains the debouncer on a fixed tick and broadcasts one reload per
//! batch of settled changes.

use std::path::{Component, Path};
use std::sync::Arc;
use std::time::Duration;

use notify::event::{MetadataKind, ModifyKind};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use super::broadcaster::LiveReloadBroadcaster;
use super::debouncer::{EventDebouncer, FsEvent, FsEventKind};
use crate::error::WatchError;

/// How often settled events are drained from the debouncer.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Raw events buffered between the notify thread and the tokio side.
const EVENT_BUFFER: usize = 256;

/// Paths excluded from triggering reloads.
///
/// A pattern matches if it matches the whole root-relative path or any single
/// component of it, so `node_modules` excludes the directory at any depth.
#[derive(Clone, Debug, Default)]
pub(crate) struct IgnoreFilter {
    patterns: Vec<glob::Pattern>,
}

impl IgnoreFilter {
    pub(crate) fn new(patterns: &[String]) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match glob::Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(error) => {
                    tracing::warn!(pattern = %p, %error, "Ignoring invalid ignore pattern");
                    None
                }
            })
            .collect();
        Self { patterns }
    }

    pub(crate) fn is_ignored(&self, relative: &Path) -> bool {
        let whole = to_url_path(relative);

        self.patterns.iter().any(|pattern| {
            pattern.matches(&whole)
                || relative.components().any(|c| match c {
                    Component::Normal(name) => pattern.matches(&name.to_string_lossy()),
                    _ => false,
                })
        })
    }
}

/// Render a relative path with forward slashes regardless of platform.
pub(crate) fn to_url_path(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Human-readable reason for a batch of changes: root-relative paths, sorted.
pub(crate) fn describe_changes(events: &[FsEvent], root: &Path) -> String {
    let mut paths: Vec<String> = events
        .iter()
        .map(|event| match event.path.strip_prefix(root) {
            Ok(relative) => to_url_path(relative),
            Err(_) => event.path.display().to_string(),
        })
        .filter(|path| !path.is_empty())
        .collect();
    paths.sort();
    paths.dedup();

    if paths.is_empty() {
        "change".to_owned()
    } else {
        paths.join(", ")
    }
}

/// Map a notify event kind to the kinds the debouncer understands.
fn classify(kind: EventKind) -> Option<FsEventKind> {
    match kind {
        EventKind::Create(_) => Some(FsEventKind::Created),
        EventKind::Modify(ModifyKind::Metadata(MetadataKind::AccessTime)) => None,
        EventKind::Modify(_) => Some(FsEventKind::Modified),
        EventKind::Remove(_) => Some(FsEventKind::Removed),
        _ => None,
    }
}

/// Watches the static root and broadcasts reloads while alive.
pub(crate) struct LiveReloadWatcher {
    _watcher: RecommendedWatcher,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveReloadWatcher {
    /// Start watching `root` recursively.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform watcher cannot be created or the root
    /// cannot be watched.
    pub(crate) fn start(
        root: &Path,
        debounce: Duration,
        ignore: IgnoreFilter,
        broadcaster: LiveReloadBroadcaster,
    ) -> Result<Self, WatchError> {
        // notify reports canonical paths on some platforms (e.g. /private/var on macOS).
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
        let (tx, mut rx) = mpsc::channel::<Event>(EVENT_BUFFER);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                // try_send: the callback runs on notify's thread and must not block.
                Ok(event) => forward_event(&tx, event),
                Err(error) => tracing::warn!(%error, "File watcher error"),
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;
        tracing::debug!(root = %root.display(), ?debounce, "Watching for changes");

        let debouncer = Arc::new(EventDebouncer::new(debounce));

        let record_task = {
            let debouncer = Arc::clone(&debouncer);
            let root = root.clone();
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    record_event(&event, &root, &ignore, &debouncer);
                }
            })
        };

        let broadcast_task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(POLL_INTERVAL);
            loop {
                interval.tick().await;
                let events = debouncer.drain_ready();
                if events.is_empty() {
                    continue;
                }
                for event in &events {
                    tracing::debug!(path = %event.path.display(), kind = ?event.kind, "Settled change");
                }
                let reason = describe_changes(&events, &root);
                tracing::info!(changed = %reason, "Change detected, notifying browsers");
                broadcaster.broadcast(&reason);
            }
        });

        Ok(Self {
            _watcher: watcher,
            tasks: vec![record_task, broadcast_task],
        })
    }
}

impl Drop for LiveReloadWatcher {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Hand a raw event to the recording task without blocking.
///
/// A full buffer drops the event; the burst that filled it still yields a
/// reload once it settles.
fn forward_event(tx: &mpsc::Sender<Event>, event: Event) {
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => {
            tracing::debug!(paths = ?event.paths, "Watcher event buffer full, event dropped");
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!("Watcher stopped, event dropped");
        }
    }
}

/// Record a raw notify event into the debouncer.
fn record_event(event: &Event, root: &Path, ignore: &IgnoreFilter, debouncer: &EventDebouncer) {
    let Some(kind) = classify(event.kind) else {
        return;
    };

    for path in &event.paths {
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        if ignore.is_ignored(relative) {
            continue;
        }

        debouncer.record(path.clone(), kind);
        tracing::debug!(path = %path.display(), ?kind, "Recorded filesystem event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn default_filter() -> IgnoreFilter {
        IgnoreFilter::new(&[
            ".git".to_owned(),
            "node_modules".to_owned(),
            "dist".to_owned(),
            "*.swp".to_owned(),
        ])
    }

    #[test]
    fn test_ignore_matches_component_at_any_depth() {
        let filter = default_filter();

        assert!(filter.is_ignored(Path::new(".git/HEAD")));
        assert!(filter.is_ignored(Path::new("packages/ui/node_modules/react/index.js")));
        assert!(filter.is_ignored(Path::new("dist")));
    }

    #[test]
    fn test_ignore_matches_file_globs() {
        let filter = default_filter();

        assert!(filter.is_ignored(Path::new("src/.app.js.swp")));
        assert!(!filter.is_ignored(Path::new("src/app.js")));
    }

    #[test]
    fn test_ignore_does_not_match_substrings() {
        let filter = default_filter();

        assert!(!filter.is_ignored(Path::new("distribution/index.html")));
        assert!(!filter.is_ignored(Path::new("index.html")));
    }

    #[test]
    fn test_ignore_whole_path_pattern() {
        let filter = IgnoreFilter::new(&["assets/generated/*".to_owned()]);

        assert!(filter.is_ignored(Path::new("assets/generated/icons.svg")));
        assert!(!filter.is_ignored(Path::new("assets/icons.svg")));
    }

    #[test]
    fn test_ignore_skips_invalid_patterns() {
        let filter = IgnoreFilter::new(&["[broken".to_owned(), "dist".to_owned()]);

        assert!(filter.is_ignored(Path::new("dist/app.js")));
    }

    #[test]
    fn test_describe_changes_relative_sorted() {
        let root = Path::new("/site");
        let events = vec![
            FsEvent {
                path: PathBuf::from("/site/src/b.js"),
                kind: FsEventKind::Modified,
            },
            FsEvent {
                path: PathBuf::from("/site/index.html"),
                kind: FsEventKind::Created,
            },
        ];

        assert_eq!(describe_changes(&events, root), "index.html, src/b.js");
    }

    #[test]
    fn test_describe_changes_root_itself() {
        let events = vec![FsEvent {
            path: PathBuf::from("/site"),
            kind: FsEventKind::Modified,
        }];

        assert_eq!(describe_changes(&events, Path::new("/site")), "change");
    }

    #[test]
    fn test_classify_event_kinds() {
        assert_eq!(
            classify(EventKind::Create(CreateKind::File)),
            Some(FsEventKind::Created)
        );
        assert_eq!(
            classify(EventKind::Modify(ModifyKind::Data(DataChange::Content))),
            Some(FsEventKind::Modified)
        );
        assert_eq!(
            classify(EventKind::Remove(RemoveKind::File)),
            Some(FsEventKind::Removed)
        );
        assert_eq!(
            classify(EventKind::Modify(ModifyKind::Metadata(
                MetadataKind::AccessTime
            ))),
            None
        );
        assert_eq!(classify(EventKind::Any), None);
    }

    #[test]
    fn test_record_event_filters_paths() {
        let debouncer = EventDebouncer::new(Duration::ZERO);
        let root = Path::new("/site");
        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(PathBuf::from("/site/app.js"))
            .add_path(PathBuf::from("/site/node_modules/x/index.js"))
            .add_path(PathBuf::from("/elsewhere/app.js"));

        record_event(&event, root, &default_filter(), &debouncer);

        let events = debouncer.drain_ready();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, PathBuf::from("/site/app.js"));
    }

    #[tokio::test]
    async fn test_forward_event_full_buffer_keeps_queued_events() {
        let (tx, mut rx) = mpsc::channel(1);
        let created = |path: &str| {
            Event::new(EventKind::Create(CreateKind::File)).add_path(PathBuf::from(path))
        };

        forward_event(&tx, created("/site/a.js"));
        forward_event(&tx, created("/site/b.js"));
        drop(tx);

        let queued = rx.recv().await.unwrap();
        assert_eq!(queued.paths, vec![PathBuf::from("/site/a.js")]);
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_forward_event_after_close_does_not_panic() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        forward_event(&tx, Event::new(EventKind::Any));
    }

    #[tokio::test]
    async fn test_watcher_broadcasts_file_change() {
        let dir = tempfile::tempdir().unwrap();
        let broadcaster = LiveReloadBroadcaster::new();
        let mut subscription = broadcaster.subscribe();
        subscription.recv().await.unwrap();

        let _watcher = LiveReloadWatcher::start(
            dir.path(),
            Duration::from_millis(20),
            default_filter(),
            broadcaster.clone(),
        )
        .unwrap();

        tokio::fs::write(dir.path().join("app.js"), "console.log(2)")
            .await
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(5), subscription.recv())
            .await
            .expect("reload event within timeout")
            .unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("data: reload\n"));
        assert!(text.contains("comment: app.js"));
    }

    #[tokio::test]
    async fn test_watcher_fails_for_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");

        let result = LiveReloadWatcher::start(
            &missing,
            Duration::from_millis(20),
            IgnoreFilter::default(),
            LiveReloadBroadcaster::new(),
        );

        assert!(result.is_err());
    }
}
