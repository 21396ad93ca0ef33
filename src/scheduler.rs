use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

/// Polling cadence for every view. Fixed by the server contract.
pub(crate) const REFRESH_INTERVAL: Duration = Duration::from_millis(30_000);

/// Handed to each refresh cycle; views write fetched data through `apply`.
#[derive(Debug, Clone)]
pub(crate) struct CycleToken {
    stopped: watch::Receiver<bool>,
    gate: Arc<RwLock<bool>>,
}

impl CycleToken {
    pub(crate) fn is_live(&self) -> bool {
        !*self.gate.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `update` unless the cycle was stopped. `stop()` waits for a
    /// running update to finish, so none can land after it returns.
    pub(crate) fn apply<T>(&self, update: impl FnOnce() -> T) -> Option<T> {
        let stopped = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        if *stopped {
            return None;
        }
        Some(update())
    }

    async fn cancelled(&mut self) {
        // An error means the scheduler is gone, which counts as stopped.
        let _ = self.stopped.wait_for(|stopped| *stopped).await;
    }

    /// A token for one-shot refreshes outside any scheduler. It always reads
    /// as live and must not be awaited for cancellation.
    pub(crate) fn detached() -> Self {
        let (_tx, rx) = watch::channel(false);
        CycleToken {
            stopped: rx,
            gate: Arc::new(RwLock::new(false)),
        }
    }
}

/// Runs a refresh task now and then on every tick until stopped.
///
/// Ticks do not wait for the previous invocation: a slow task overlaps the
/// next one. Stopping cancels the ticker and every invocation still in
/// flight, so nothing fetched before the stop is applied after it.
pub(crate) struct RefreshScheduler {
    stop_tx: watch::Sender<bool>,
    gate: Arc<RwLock<bool>>,
    ticker: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub(crate) fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            stop_tx,
            gate: Arc::new(RwLock::new(false)),
            ticker: None,
        }
    }

    pub(crate) fn start<F, Fut>(&mut self, task: F, interval: Duration)
    where
        F: Fn(CycleToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.stop();
        let (stop_tx, stop_rx) = watch::channel(false);
        self.stop_tx = stop_tx;
        self.gate = Arc::new(RwLock::new(false));
        let token = CycleToken {
            stopped: stop_rx,
            gate: Arc::clone(&self.gate),
        };

        self.ticker = Some(tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut stop = token.clone();

            loop {
                tokio::select! {
                    biased;
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let cycle = task(token.clone());
                        let mut cancel = token.clone();
                        tokio::spawn(async move {
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => {
                                    debug!("Refresh cycle cancelled before completion");
                                }
                                res = cycle => {
                                    if let Err(e) = res {
                                        warn!("Refresh cycle failed: {:#}", e);
                                    }
                                }
                            }
                        });
                    }
                }
            }
            debug!("Refresh scheduler stopped");
        }));
    }

    /// Idempotent. No tick fires and no in-flight cycle applies after this
    /// returns; an update already inside `CycleToken::apply` is waited for.
    pub(crate) fn stop(&mut self) {
        *self.gate.write().unwrap_or_else(PoisonError::into_inner) = true;
        self.stop_tx.send_replace(true);
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
