use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::Exporter;

/// Background task that runs [`Exporter::sync_once`] on a fixed delay.
///
/// Passes never overlap: the delay starts after the previous pass finishes.
pub struct ExportScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ExportScheduler {
    /// Start the background loop on the current tokio runtime.
    pub fn spawn(exporter: Arc<Exporter>, interval: Duration, run_on_startup: bool) -> Self {
        let (shutdown, mut signal) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(
                interval_secs = interval.as_secs(),
                run_on_startup, "Export scheduler started"
            );

            let mut skip_pass = !run_on_startup;
            loop {
                if *signal.borrow() {
                    break;
                }

                if !skip_pass {
                    let report = exporter.sync_once().await;
                    if !report.is_success() {
                        warn!(failed = ?report.errors.keys().collect::<Vec<_>>(), "Export pass had failures");
                    }
                }
                skip_pass = false;

                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    changed = signal.changed() => {
                        // A dropped sender also means stop
                        if changed.is_err() || *signal.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("Export scheduler stopped");
        });

        Self { shutdown, handle }
    }

    /// Signal the loop to stop and wait for the in-flight pass to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Export scheduler task ended abnormally");
        }
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
