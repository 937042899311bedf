use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use tokio::signal;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::classify::WatchRoot;
use crate::config::HostConfig;
use crate::error::HostError;
use crate::translate::Translator;
use crate::watcher::{WatchOptions, start_watcher};
use crate::wire::{MessageSink, read_frame};

/// How long a stop request waits for the dispatch thread before leaving it
/// behind. A browser that stopped reading can leave it blocked on stdout.
pub const STOP_GRACE: Duration = Duration::from_secs(2);

/// Run the host until it is told to stop.
///
/// The subscription is taken before the startup scan so that nothing changing
/// during the scan is missed; events queue up and are processed right after.
/// A single dispatch thread runs the scan and then every event in order, and
/// is the only writer to stdout.
///
/// Stops on SIGINT/SIGTERM, when the browser closes stdin, or when dispatch
/// fails (e.g. stdout is a broken pipe). The subscription is released on all
/// of these paths. After a signal or stdin EOF, queued events are discarded
/// and the dispatch thread gets [`STOP_GRACE`] to finish the message it is
/// writing; the caller must not wait on the runtime's blocking pool after that.
pub async fn run(root: WatchRoot, config: &HostConfig) -> anyhow::Result<()> {
    let options = WatchOptions {
        rename_grace: config.rename_grace(),
        resync_interval: config.resync_interval(),
    };
    let (handle, mut rx) = start_watcher(&root, options)
        .with_context(|| format!("failed to watch {}", root.path().display()))?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut translator = Translator::new(root, MessageSink::new(io::stdout()));
    let mut dispatch = {
        let stop = Arc::clone(&stop);
        tokio::task::spawn_blocking(move || -> Result<(), HostError> {
            translator.resync()?;
            while let Some(event) = rx.blocking_recv() {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                translator.handle(&event)?;
            }
            Ok(())
        })
    };

    let stdin_closed = drain_stdin();

    let finished = tokio::select! {
        joined = &mut dispatch => Some(joined),
        () = shutdown_signal() => None,
        _ = stdin_closed => {
            info!("stdin closed, browser disconnected");
            None
        }
    };

    stop.store(true, Ordering::Relaxed);
    // Releases the subscription; the bridge then closes the channel and
    // dispatch runs out of events.
    drop(handle);

    let joined = match finished {
        Some(joined) => joined,
        None => match tokio::time::timeout(STOP_GRACE, dispatch).await {
            Ok(joined) => joined,
            Err(_) => {
                warn!("dispatch still writing after {STOP_GRACE:?}, abandoning it");
                return Ok(());
            }
        },
    };
    joined
        .context("dispatch thread panicked")?
        .context("failed to report changes")?;

    info!("stopped");
    Ok(())
}

/// Read and discard messages from the extension until it closes the port.
///
/// Runs on a plain thread: a read blocked on stdin must not keep the runtime
/// from shutting down.
fn drain_stdin() -> oneshot::Receiver<()> {
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let mut stdin = io::stdin().lock();
        loop {
            match read_frame(&mut stdin) {
                Ok(Some(frame)) => debug!("ignoring {} byte message from extension", frame.len()),
                Ok(None) => break,
                Err(err) => {
                    warn!("stdin: {err}");
                    break;
                }
            }
        }
        let _ = tx.send(());
    });
    rx
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("cannot listen for Ctrl+C: {err}");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                info!("received SIGTERM, shutting down");
            }
            Err(err) => {
                warn!("cannot listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
