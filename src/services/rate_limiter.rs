use governor::{
    clock::DefaultClock,
    state::{direct::NotKeyed, InMemoryState},
    Quota, RateLimiter as GovernorLimiter,
};
use std::num::NonZeroU32;

/// Token bucket bounding outbound affiliate API calls.
///
/// Refills continuously at `qps` tokens per second and holds at most `qps`
/// tokens, so a cold start may burst one second's worth of calls.
pub struct RateLimiter {
    limiter: GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>,
    qps: NonZeroU32,
}

impl RateLimiter {
    pub fn new(qps: NonZeroU32) -> Self {
        tracing::info!(qps = qps.get(), "Initializing affiliate API rate limiter");
        Self {
            limiter: GovernorLimiter::direct(Quota::per_second(qps)),
            qps,
        }
    }

    /// Wait until a token is available and take it. Never times out; callers
    /// bound the total wait at a higher level.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }

    pub fn qps(&self) -> u32 {
        self.qps.get()
    }
}
