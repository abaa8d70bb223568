// libs/queue-cell/src/services/worker.rs
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use shared_config::AppConfig;

use crate::error::QueueError;
use crate::models::SweepOutcome;
use crate::services::sweep::AutoCancelService;
use crate::store::QueueStore;

/// Runs the no-show sweep on a fixed interval inside the API process.
pub struct AutoCancelWorker {
    interval: Duration,
    config: Arc<AppConfig>,
    sweep: AutoCancelService,
    is_shutdown: RwLock<bool>,
}

impl AutoCancelWorker {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn QueueStore>) -> Self {
        Self {
            interval: Duration::from_secs(config.auto_cancel_sweep_interval_seconds.max(1)),
            config,
            sweep: AutoCancelService::new(store),
            is_shutdown: RwLock::new(false),
        }
    }

    /// One sweep at the clinic's current wall-clock time.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<SweepOutcome, QueueError> {
        self.sweep.run_auto_cancel_sweep(self.config.clinic_now()).await
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run_loop().await })
    }

    pub async fn shutdown(&self) {
        *self.is_shutdown.write().await = true;
        info!("Auto-cancel worker shutting down");
    }

    async fn run_loop(&self) {
        info!("Auto-cancel worker started (every {:?})", self.interval);

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            if *self.is_shutdown.read().await {
                debug!("Auto-cancel worker received shutdown signal");
                break;
            }

            match self.run_once().await {
                Ok(SweepOutcome::Completed(report)) if report.cancelled > 0 => {
                    info!("Sweep {} cancelled {} no-shows", report.run_id, report.cancelled);
                }
                Ok(_) => debug!("Sweep finished with nothing to cancel"),
                // Nothing was written; the next tick retries.
                Err(e) => error!("Auto-cancel sweep failed: {}", e),
            }
        }

        info!("Auto-cancel worker stopped");
    }
}
