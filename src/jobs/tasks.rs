/// Background task implementations
use crate::{context::AppContext, models::Collection, sync::SyncStatus};
use chrono::{DateTime, Utc};

/// A collection whose subscription has not recovered in time
#[derive(Debug, Clone, PartialEq)]
pub struct StaleReport {
    pub collection: Collection,
    pub since: DateTime<Utc>,
    pub error: String,
    pub attempt: u32,
}

/// Collections stale for longer than the longest retry delay
pub fn long_stale_collections(ctx: &AppContext) -> Vec<StaleReport> {
    let grace = chrono::Duration::milliseconds(ctx.config.sync.retry_max_ms as i64);
    stale_beyond(ctx, Utc::now() - grace)
}

fn stale_beyond(ctx: &AppContext, cutoff: DateTime<Utc>) -> Vec<StaleReport> {
    Collection::ALL
        .iter()
        .filter_map(|&collection| match ctx.sync.status(collection) {
            SyncStatus::Stale {
                since,
                error,
                attempt,
            } if since < cutoff => Some(StaleReport {
                collection,
                since,
                error,
                attempt,
            }),
            _ => None,
        })
        .collect()
}

/// Prune the attempt limiter and return how many documents it still tracks
pub fn prune_attempt_limiter(ctx: &AppContext) -> usize {
    ctx.limiter.prune();
    ctx.limiter.tracked_documents()
}
