use std::sync::Arc;
use tokio::time::{interval, Duration};
use tracing::{info, warn};

pub mod tasks;

/// Job scheduler for background tasks
pub struct JobScheduler {
    context: Arc<crate::context::AppContext>,
}

impl JobScheduler {
    pub fn new(context: Arc<crate::context::AppContext>) -> Self {
        Self { context }
    }

    /// Start all background jobs
    pub fn start(self: Arc<Self>) {
        info!("Starting background job scheduler");

        tokio::spawn(Self::sync_health_job(Arc::clone(&self)));
        tokio::spawn(Self::attempt_limiter_cleanup_job(Arc::clone(&self)));

        info!("Background jobs started");
    }

    /// Report collections that stay stale (runs every minute)
    async fn sync_health_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(60));

        loop {
            interval.tick().await;

            let stale = tasks::long_stale_collections(&scheduler.context);
            for report in stale {
                warn!(
                    "{} has been stale since {} ({} attempts): {}",
                    report.collection, report.since, report.attempt, report.error
                );
            }
        }
    }

    /// Forget replenished unlock attempt state (runs every 10 minutes)
    async fn attempt_limiter_cleanup_job(scheduler: Arc<Self>) {
        let mut interval = interval(Duration::from_secs(600));

        loop {
            interval.tick().await;

            let remaining = tasks::prune_attempt_limiter(&scheduler.context);
            if remaining > 0 {
                info!("Attempt limiter tracking {} documents", remaining);
            }
        }
    }
}
