use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

/// Process-wide cooldown shared by every concurrently running clip
/// evaluation. A provider rate-limit signal arms it; it expires purely by
/// time, there is no explicit unblock.
///
/// The expiry is monotonic: concurrent `block` calls all converge to the same
/// or a later instant, never an earlier one, so simultaneous rate-limit
/// signals are idempotent.
#[derive(Debug, Clone, Default)]
pub struct RateLimitGuard {
    expiry: Arc<Mutex<Option<Instant>>>,
}

impl RateLimitGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while the current time is before the stored expiry.
    pub async fn is_blocked(&self) -> bool {
        let expiry = self.expiry.lock().await;
        match *expiry {
            Some(until) => Instant::now() < until,
            None => false,
        }
    }

    /// Extend the cooldown to `now + cooldown`, keeping whichever expiry is
    /// later.
    pub async fn block(&self, cooldown: Duration) {
        let candidate = Instant::now() + cooldown;
        let mut expiry = self.expiry.lock().await;
        match *expiry {
            Some(current) if current >= candidate => {
                debug!("Rate limit already armed past the requested expiry");
            }
            _ => {
                info!("⛔ Recognition cooldown armed for {:.1}s", cooldown.as_secs_f64());
                *expiry = Some(candidate);
            }
        }
    }

    /// The instant scanning may resume, if a cooldown is armed.
    pub async fn blocked_until(&self) -> Option<Instant> {
        *self.expiry.lock().await
    }
}
