use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// Lifecycle tracks the background tasks of a trigger: at most one running
// cycle, plus an optional ticker which schedules cycles.
pub(crate) struct Lifecycle {
    pub(crate) cancel: CancellationToken,
    closed: AtomicBool,
    cycle: Mutex<Option<JoinHandle<()>>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            closed: AtomicBool::new(false),
            cycle: Mutex::new(None),
            ticker: Mutex::new(None),
        }
    }

    // Spawn `cycle` unless the trigger is closed or a cycle is still running.
    // Cycles are never run concurrently: an overlapping request is skipped.
    pub(crate) fn try_spawn<F>(&self, cycle: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.cycle.lock().unwrap();

        if self.cancel.is_cancelled() {
            return false;
        }
        if matches!(guard.as_ref(), Some(running) if !running.is_finished()) {
            tracing::warn!("previous cycle is still running; skipping this one");
            return false;
        }
        *guard = Some(tokio::spawn(cycle));
        true
    }

    pub(crate) fn set_ticker(&self, ticker: JoinHandle<()>) {
        *self.ticker.lock().unwrap() = Some(ticker);
    }

    // Cancel and await background tasks. Returns false if already shut down.
    pub(crate) async fn shutdown(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.cancel.cancel();

        let handles = [
            self.ticker.lock().unwrap().take(),
            self.cycle.lock().unwrap().take(),
        ];
        for handle in handles.into_iter().flatten() {
            if let Err(error) = handle.await {
                tracing::warn!(%error, "trigger task failed");
            }
        }
        true
    }
}
