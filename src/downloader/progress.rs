//! Background progress reporter for a range download.
//!
//! Workers send one tick per finished chapter over an unbounded channel; a
//! single spawned task counts them and invokes the caller's callback. The
//! reporter is stopped through a cancellation token and joined with a bounded
//! wait. Dropping it without [`ProgressReporter::stop`] cancels and aborts the
//! task, so it never outlives the download call.

use crate::types::Progress;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Callback receiving running completion counts
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Upper bound on waiting for the reporter to drain and exit
pub(crate) const REPORTER_STOP_TIMEOUT: Duration = Duration::from_secs(2);

/// Cloneable handle workers use to report a finished chapter
#[derive(Clone)]
pub(crate) struct ProgressTicker(mpsc::UnboundedSender<()>);

impl ProgressTicker {
    pub(crate) fn tick(&self) {
        // The reporter only goes away after all workers finished
        self.0.send(()).ok();
    }
}

/// Owns the reporter task for one range download
pub(crate) struct ProgressReporter {
    ticker: ProgressTicker,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Spawn a reporter for `total` chapters
    pub(crate) fn spawn(total: usize, callback: Option<ProgressCallback>) -> Self {
        let (tick_tx, mut tick_rx) = mpsc::unbounded_channel::<()>();
        let cancel_token = CancellationToken::new();
        let stop = cancel_token.clone();

        let handle = tokio::spawn(async move {
            let mut completed = 0usize;
            let report = |completed: usize| {
                if let Some(callback) = &callback {
                    callback(Progress { completed, total });
                }
            };

            loop {
                tokio::select! {
                    biased;
                    tick = tick_rx.recv() => {
                        let Some(()) = tick else {
                            break;
                        };
                        completed += 1;
                        report(completed);
                    }
                    _ = stop.cancelled() => {
                        // Ticks sent before the stop signal still count
                        while tick_rx.try_recv().is_ok() {
                            completed += 1;
                            report(completed);
                        }
                        break;
                    }
                }
            }

            tracing::debug!(completed, total, "Progress reporter stopped");
        });

        Self {
            ticker: ProgressTicker(tick_tx),
            cancel_token,
            handle: Some(handle),
        }
    }

    /// A handle for one producer
    pub(crate) fn ticker(&self) -> ProgressTicker {
        self.ticker.clone()
    }

    /// Signal the reporter to finish and wait for it, aborting after `timeout`
    pub(crate) async fn stop(mut self, timeout: Duration) {
        self.cancel_token.cancel();
        let Some(mut handle) = self.handle.take() else {
            return;
        };

        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Progress reporter task panicked");
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = timeout.as_millis(),
                    "Progress reporter did not stop in time, aborting"
                );
                handle.abort();
            }
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
