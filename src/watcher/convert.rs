use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind};

use super::event::{RawNotification, WatchEvent};

/// How many settled moves are remembered to swallow a trailing `Name(Both)`
/// that repeats them.
const SETTLED_MEMORY: usize = 64;

/// A move-out waiting for its move-in half.
#[derive(Debug)]
struct PendingMove {
    path: PathBuf,
    tracker: Option<usize>,
    since: Instant,
}

/// A move whose halves were already reported.
#[derive(Debug)]
enum Settled {
    /// `From` and `To` paired up into one move.
    Paired { src: PathBuf, dest: PathBuf },
    /// `To` arrived with no `From` waiting: a move in, or a move-out that
    /// already expired as a delete.
    Arrived { tracker: usize, dest: PathBuf },
}

/// Turns `notify` events into [`WatchEvent`]s.
///
/// Backends report renames differently: inotify sends `From`, `To` and then
/// `Both` for one move, ReadDirectoryChanges sends `From` and `To`, FSEvents
/// only says a name changed (`Any`). `From` halves are held until the matching
/// `To` shows up; one that never does left the tree.
#[derive(Debug)]
pub struct EventConverter {
    grace: Duration,
    pending: Vec<PendingMove>,
    settled: VecDeque<Settled>,
}

impl EventConverter {
    pub fn new(grace: Duration) -> Self {
        Self {
            grace,
            pending: Vec::new(),
            settled: VecDeque::new(),
        }
    }

    pub fn convert(&mut self, event: Event, now: Instant) -> Vec<WatchEvent> {
        if event.need_rescan() {
            return vec![WatchEvent::Rescan];
        }

        let tracker = event.attrs.tracker();
        let notifications = match event.kind {
            EventKind::Create(_) => event
                .paths
                .into_iter()
                .map(RawNotification::Created)
                .collect(),
            // Directory contents are reported one by one before the directory itself.
            EventKind::Remove(RemoveKind::Folder) => Vec::new(),
            EventKind::Remove(_) => event
                .paths
                .into_iter()
                .map(RawNotification::Deleted)
                .collect(),
            EventKind::Modify(ModifyKind::Name(mode)) => {
                self.rename(mode, event.paths, tracker, now)
            }
            EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
            EventKind::Modify(_) => event
                .paths
                .into_iter()
                .map(RawNotification::Modified)
                .collect(),
            EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
        };

        notifications.into_iter().map(WatchEvent::from).collect()
    }

    /// Report move-outs whose grace period has run out as deletions.
    pub fn expire(&mut self, now: Instant) -> Vec<WatchEvent> {
        let grace = self.grace;
        let (expired, waiting): (Vec<_>, Vec<_>) = self
            .pending
            .drain(..)
            .partition(|p| now.saturating_duration_since(p.since) >= grace);
        self.pending = waiting;
        expired
            .into_iter()
            .map(|p| RawNotification::Deleted(p.path).into())
            .collect()
    }

    /// When the oldest pending move-out expires, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.since + self.grace).min()
    }

    fn rename(
        &mut self,
        mode: RenameMode,
        paths: Vec<PathBuf>,
        tracker: Option<usize>,
        now: Instant,
    ) -> Vec<RawNotification> {
        match mode {
            RenameMode::From => {
                for path in paths {
                    self.pending.push(PendingMove {
                        path,
                        tracker,
                        since: now,
                    });
                }
                Vec::new()
            }
            RenameMode::To => {
                let mut out = Vec::with_capacity(paths.len());
                for dest in paths {
                    match self.take_pending(tracker) {
                        Some(src) => {
                            self.remember(Settled::Paired {
                                src: src.clone(),
                                dest: dest.clone(),
                            });
                            out.push(RawNotification::Moved { src, dest });
                        }
                        None => {
                            if let Some(tracker) = tracker {
                                self.remember(Settled::Arrived {
                                    tracker,
                                    dest: dest.clone(),
                                });
                            }
                            out.push(RawNotification::Created(dest));
                        }
                    }
                }
                out
            }
            RenameMode::Both => match <[PathBuf; 2]>::try_from(paths) {
                Ok([src, dest]) => {
                    if self.forget(&src, &dest, tracker) {
                        return Vec::new();
                    }
                    self.pending.retain(|p| p.path != src);
                    vec![RawNotification::Moved { src, dest }]
                }
                Err(paths) => by_existence(paths),
            },
            RenameMode::Any | RenameMode::Other => by_existence(paths),
        }
    }

    fn take_pending(&mut self, tracker: Option<usize>) -> Option<PathBuf> {
        let index = self.pending.iter().position(|p| p.tracker == tracker)?;
        Some(self.pending.remove(index).path)
    }

    fn remember(&mut self, settled: Settled) {
        if self.settled.len() == SETTLED_MEMORY {
            self.settled.pop_front();
        }
        self.settled.push_back(settled);
    }

    /// Whether `Both(src, dest)` repeats a move already reported.
    fn forget(&mut self, src: &Path, dest: &Path, tracker: Option<usize>) -> bool {
        let found = self.settled.iter().position(|settled| match settled {
            Settled::Paired { src: s, dest: d } => s == src && d == dest,
            Settled::Arrived { tracker: t, dest: d } => tracker == Some(*t) && d == dest,
        });
        match found {
            Some(index) => {
                self.settled.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Without pairing information a renamed path either appeared or vanished.
fn by_existence(paths: Vec<PathBuf>) -> Vec<RawNotification> {
    paths
        .into_iter()
        .map(|p| {
            if p.exists() {
                RawNotification::Created(p)
            } else {
                RawNotification::Deleted(p)
            }
        })
        .collect()
}
