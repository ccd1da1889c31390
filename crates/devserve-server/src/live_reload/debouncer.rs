//! Event debouncing for live reload.
//!
//! Editors rarely save with a single write. The debouncer folds the burst of
//! raw filesystem events for a path into one event that becomes ready once
//! the path has been quiet for the debounce window.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Kind of filesystem event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FsEventKind {
    Created,
    Modified,
    Removed,
}

/// A debounced filesystem event.
#[derive(Clone, Debug)]
pub(crate) struct FsEvent {
    pub path: PathBuf,
    pub kind: FsEventKind,
}

struct PendingEvent {
    kind: FsEventKind,
    deadline: Instant,
}

/// Per-path event debouncer, shared between the notify callback side and
/// the broadcast task.
pub(crate) struct EventDebouncer {
    pending: Mutex<HashMap<PathBuf, PendingEvent>>,
    window: Duration,
}

impl EventDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            window,
        }
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<PathBuf, PendingEvent>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record an event, restarting the path's quiet window.
    pub fn record(&self, path: PathBuf, kind: FsEventKind) {
        let deadline = Instant::now() + self.window;
        let mut pending = self.pending();

        match pending.entry(path) {
            Entry::Vacant(entry) => {
                entry.insert(PendingEvent { kind, deadline });
            }
            Entry::Occupied(mut entry) => match Self::coalesce(entry.get().kind, kind) {
                Some(kind) => {
                    *entry.get_mut() = PendingEvent { kind, deadline };
                }
                None => {
                    entry.remove();
                }
            },
        }
    }

    /// Fold a new event into an earlier one for the same path.
    ///
    /// `None` means the pair cancels out (a file created and removed within
    /// one window never existed as far as the browser is concerned).
    fn coalesce(earlier: FsEventKind, later: FsEventKind) -> Option<FsEventKind> {
        use FsEventKind::{Created, Modified, Removed};

        match (earlier, later) {
            (Created, Removed) => None,
            (Created, _) => Some(Created),
            (Modified, later) => Some(later),
            (Removed, Created) => Some(Modified),
            (Removed, _) => Some(Removed),
        }
    }

    /// Take every event whose quiet window has elapsed.
    pub fn drain_ready(&self) -> Vec<FsEvent> {
        let now = Instant::now();

        self.pending()
            .extract_if(|_, event| event.deadline <= now)
            .map(|(path, event)| FsEvent {
                path,
                kind: event.kind,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const WINDOW: Duration = Duration::from_millis(10);

    fn settle() {
        thread::sleep(WINDOW + Duration::from_millis(5));
    }

    #[test]
    fn test_event_ready_only_after_window() {
        let debouncer = EventDebouncer::new(WINDOW);
        let path = PathBuf::from("/site/app.js");

        debouncer.record(path.clone(), FsEventKind::Modified);
        assert!(debouncer.drain_ready().is_empty());

        settle();

        let events = debouncer.drain_ready();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].path, path);
        assert_eq!(events[0].kind, FsEventKind::Modified);
        assert!(debouncer.drain_ready().is_empty());
    }

    #[test]
    fn test_burst_of_writes_is_one_event() {
        let debouncer = EventDebouncer::new(WINDOW);
        let path = PathBuf::from("/site/style.css");

        for _ in 0..5 {
            debouncer.record(path.clone(), FsEventKind::Modified);
        }
        settle();

        let events = debouncer.drain_ready();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, FsEventKind::Modified);
    }

    #[test]
    fn test_record_restarts_window() {
        let debouncer = EventDebouncer::new(Duration::from_millis(200));
        let path = PathBuf::from("/site/index.html");

        debouncer.record(path.clone(), FsEventKind::Modified);
        thread::sleep(Duration::from_millis(120));
        debouncer.record(path, FsEventKind::Modified);
        thread::sleep(Duration::from_millis(120));

        assert!(debouncer.drain_ready().is_empty());
    }

    #[test]
    fn test_created_then_removed_cancels_out() {
        let debouncer = EventDebouncer::new(WINDOW);
        let path = PathBuf::from("/site/.index.html.swp");

        debouncer.record(path.clone(), FsEventKind::Created);
        debouncer.record(path, FsEventKind::Removed);
        settle();

        assert!(debouncer.drain_ready().is_empty());
    }

    #[test]
    fn test_paths_are_independent() {
        let debouncer = EventDebouncer::new(WINDOW);

        debouncer.record(PathBuf::from("/site/a.js"), FsEventKind::Modified);
        debouncer.record(PathBuf::from("/site/b.js"), FsEventKind::Created);
        settle();

        assert_eq!(debouncer.drain_ready().len(), 2);
    }

    #[test]
    fn test_coalesce_all_combinations() {
        use FsEventKind::{Created, Modified, Removed};

        assert_eq!(EventDebouncer::coalesce(Created, Created), Some(Created));
        assert_eq!(EventDebouncer::coalesce(Created, Modified), Some(Created));
        assert_eq!(EventDebouncer::coalesce(Created, Removed), None);

        assert_eq!(EventDebouncer::coalesce(Modified, Created), Some(Created));
        assert_eq!(EventDebouncer::coalesce(Modified, Modified), Some(Modified));
        assert_eq!(EventDebouncer::coalesce(Modified, Removed), Some(Removed));

        assert_eq!(EventDebouncer::coalesce(Removed, Created), Some(Modified));
        assert_eq!(EventDebouncer::coalesce(Removed, Modified), Some(Removed));
        assert_eq!(EventDebouncer::coalesce(Removed, Removed), Some(Removed));
    }
}
