/// Password attempt limiting
use crate::error::{PanelError, PanelResult};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Unlock attempts per minute, per document
    pub unlock_per_minute: u32,
    /// Admin login attempts per minute, across all clients
    pub login_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            unlock_per_minute: 10,
            login_per_minute: 5,
        }
    }
}

fn per_minute(attempts: u32) -> Quota {
    Quota::per_minute(NonZeroU32::new(attempts).unwrap_or(NonZeroU32::MIN))
}

/// Limits password guessing on unlock and admin login
#[derive(Clone)]
pub struct AttemptLimiter {
    unlock: Arc<DefaultKeyedRateLimiter<String>>,
    login: Arc<GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    unlock_interval: Duration,
    login_interval: Duration,
}

impl AttemptLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        let unlock_quota = per_minute(config.unlock_per_minute);
        let login_quota = per_minute(config.login_per_minute);

        Self {
            unlock: Arc::new(GovernorLimiter::keyed(unlock_quota)),
            login: Arc::new(GovernorLimiter::direct(login_quota)),
            unlock_interval: unlock_quota.replenish_interval(),
            login_interval: login_quota.replenish_interval(),
        }
    }

    /// Check an unlock attempt on `doc_id`
    pub fn check_unlock(&self, doc_id: &str) -> PanelResult<()> {
        self.unlock
            .check_key(&doc_id.to_string())
            .map_err(|_| {
                tracing::warn!("Too many unlock attempts on document {}", doc_id);
                PanelError::RateLimitExceeded {
                    retry_after: self.unlock_interval,
                }
            })
    }

    /// Check an admin login attempt
    pub fn check_login(&self) -> PanelResult<()> {
        self.login.check().map_err(|_| {
            tracing::warn!("Too many admin login attempts");
            PanelError::RateLimitExceeded {
                retry_after: self.login_interval,
            }
        })
    }

    /// Drop per-document state that has fully replenished
    pub fn prune(&self) {
        self.unlock.retain_recent();
        self.unlock.shrink_to_fit();
    }

    pub fn tracked_documents(&self) -> usize {
        self.unlock.len()
    }
}

impl Default for AttemptLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}
