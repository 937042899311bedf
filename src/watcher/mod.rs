pub mod convert;
pub mod event;

use std::sync::mpsc::{self as std_mpsc, RecvTimeoutError};
use std::time::{Duration, Instant};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as tokio_mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, trace};

use crate::classify::WatchRoot;
use crate::error::Result;
use convert::EventConverter;
use event::WatchEvent;

/// Handle to a running watcher. Dropping it releases the OS subscription; the
/// bridge then drains and closes the event channel.
pub struct WatcherHandle {
    /// Keep alive: dropping the watcher stops the OS subscription.
    _watcher: RecommendedWatcher,
    /// The bridge task forwarding events from the std channel to the tokio channel.
    _bridge_task: JoinHandle<()>,
}

#[derive(Debug, Clone, Copy)]
pub struct WatchOptions {
    /// How long a move-out waits for its move-in half.
    pub rename_grace: Duration,
    /// Emit [`WatchEvent::Rescan`] this often, if set.
    pub resync_interval: Option<Duration>,
}

/// Subscribe to recursive change notifications below `root`.
///
/// Returns a `WatcherHandle` (must be kept alive) and a tokio mpsc receiver
/// that yields converted `WatchEvent`s in delivery order.
pub fn start_watcher(
    root: &WatchRoot,
    options: WatchOptions,
) -> Result<(WatcherHandle, tokio_mpsc::Receiver<WatchEvent>)> {
    let (std_tx, std_rx) = std_mpsc::channel::<notify::Result<notify::Event>>();

    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = std_tx.send(res);
    })?;
    watcher.watch(root.path(), RecursiveMode::Recursive)?;
    info!("watching {}", root.path().display());

    let (tokio_tx, tokio_rx) = tokio_mpsc::channel::<WatchEvent>(256);

    // Bridge: pair renames, expire move-outs and schedule resyncs off the runtime.
    let bridge_task = tokio::task::spawn_blocking(move || bridge(std_rx, tokio_tx, options));

    Ok((
        WatcherHandle {
            _watcher: watcher,
            _bridge_task: bridge_task,
        },
        tokio_rx,
    ))
}

fn bridge(
    std_rx: std_mpsc::Receiver<notify::Result<notify::Event>>,
    tokio_tx: tokio_mpsc::Sender<WatchEvent>,
    options: WatchOptions,
) {
    let mut converter = EventConverter::new(options.rename_grace);
    let mut next_resync = options.resync_interval.map(|every| Instant::now() + every);

    loop {
        // Sleep until the next event unless a move-out or resync is due first.
        let deadline = converter.next_deadline().into_iter().chain(next_resync).min();
        let received = match deadline {
            Some(at) => std_rx.recv_timeout(at.saturating_duration_since(Instant::now())),
            None => std_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        let now = Instant::now();
        let mut out = converter.expire(now);
        match received {
            Ok(Ok(event)) => {
                trace!(?event, "raw event");
                out.extend(converter.convert(event, now));
            }
            Ok(Err(err)) => error!("watch error: {err}"),
            Err(RecvTimeoutError::Timeout) => {}
            // Watcher dropped: shutdown.
            Err(RecvTimeoutError::Disconnected) => return,
        }

        if let (Some(at), Some(every)) = (next_resync, options.resync_interval)
            && now >= at
        {
            out.push(WatchEvent::Rescan);
            next_resync = Some(now + every);
        }

        for event in out {
            if tokio_tx.blocking_send(event).is_err() {
                return; // receiver dropped, shutdown
            }
        }
    }
}
