use std::path::PathBuf;

/// A single filesystem change, reduced to the four kinds the translator handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawNotification {
    Created(PathBuf),
    Deleted(PathBuf),
    Modified(PathBuf),
    /// Both ends are inside the watched tree. Moves across the tree boundary
    /// arrive as `Created` (moved in) or `Deleted` (moved out).
    Moved { src: PathBuf, dest: PathBuf },
}

/// What the watcher delivers to the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Notification(RawNotification),
    /// Events may have been lost (queue overflow) or a periodic resync is due:
    /// the whole tree has to be re-scanned.
    Rescan,
}

impl From<RawNotification> for WatchEvent {
    fn from(notification: RawNotification) -> Self {
        Self::Notification(notification)
    }
}
