//! Keeps the reconcile worker alive for the lifetime of a collection handle.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::StoreEvent;
use super::sink::{EventStream, event_channel};
use super::worker::{ReconcileWorker, WorkerExit};
use crate::config::StoreConfig;
use crate::ports::{EventSource, FileStore, WatchError};

/// A live watch: the guard that keeps the source running and its channel.
pub struct WatchSession<G> {
    guard: G,
    stream: EventStream,
}

impl<G> WatchSession<G> {
    /// Starts watching `root` through `source`.
    ///
    /// # Errors
    ///
    /// Returns the source's error if the watch cannot be established.
    pub fn start<W>(source: &W, root: &Path, capacity: usize) -> Result<Self, WatchError>
    where
        W: EventSource<Guard = G>,
    {
        let (sink, stream) = event_channel(capacity);
        let guard = source.watch(root, sink)?;
        Ok(Self { guard, stream })
    }
}

/// Restarts the reconcile worker when it dies.
///
/// The worker is restarted with a fresh watch when it panics or when its
/// event channel closes, with exponential backoff, up to
/// [`StoreConfig::max_restarts`] times. After each restart the index is
/// rescanned to pick up anything missed while the watch was down.
pub struct Supervisor<S, W> {
    worker: ReconcileWorker<S>,
    source: Arc<W>,
    root: PathBuf,
    config: StoreConfig,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
}

impl<S: FileStore, W: EventSource> Supervisor<S, W> {
    /// Creates a supervisor. Nothing runs until [`Self::run`].
    #[must_use]
    pub const fn new(
        worker: ReconcileWorker<S>,
        source: Arc<W>,
        root: PathBuf,
        config: StoreConfig,
        cancel: CancellationToken,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            worker,
            source,
            root,
            config,
            cancel,
            running,
        }
    }

    /// Runs the worker on `session` and keeps it running until cancelled or
    /// out of restarts.
    pub async fn run(self, session: WatchSession<W::Guard>) {
        self.running.store(true, Ordering::SeqCst);
        let mut session = Some(session);
        let mut attempt: u32 = 0;

        loop {
            if let Some(WatchSession { guard, stream }) = session.take() {
                let worker = self.worker.clone();
                let outcome = tokio::spawn(worker.run(stream, self.cancel.clone())).await;
                drop(guard);

                match outcome {
                    Ok(WorkerExit::Cancelled) => break,
                    Ok(WorkerExit::ChannelClosed) => {
                        warn!(root = %self.root.display(), "Watch event channel closed");
                    }
                    Err(e) if e.is_panic() => {
                        error!(root = %self.root.display(), "Reconcile worker panicked");
                    }
                    Err(e) => {
                        warn!(root = %self.root.display(), error = %e, "Reconcile worker aborted");
                    }
                }
            }
            if self.cancel.is_cancelled() {
                break;
            }

            attempt += 1;
            if attempt > self.config.max_restarts {
                error!(
                    root = %self.root.display(),
                    restarts = self.config.max_restarts,
                    "Giving up on the watcher; external edits will not be picked up"
                );
                let _ = self.worker_events().send(StoreEvent::WatcherStopped {
                    reason: format!("gave up after {} restarts", self.config.max_restarts),
                });
                break;
            }

            let delay = self.config.backoff_for(attempt);
            warn!(attempt, delay_ms = delay.as_millis(), "Restarting watcher");
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }

            match WatchSession::start(self.source.as_ref(), &self.root, self.config.event_capacity)
            {
                Ok(restarted) => {
                    session = Some(restarted);
                    self.worker.index().rescan().await;
                    info!(attempt, root = %self.root.display(), "Watcher restarted");
                    let _ = self
                        .worker_events()
                        .send(StoreEvent::WatcherRestarted { attempt });
                }
                Err(e) => warn!(attempt, error = %e, "Watcher restart failed"),
            }
        }

        self.running.store(false, Ordering::SeqCst);
    }

    fn worker_events(&self) -> &tokio::sync::broadcast::Sender<StoreEvent> {
        self.worker.events()
    }
}
