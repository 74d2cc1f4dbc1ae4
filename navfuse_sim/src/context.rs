//! Simulated survey context for deterministic runs.

use async_trait::async_trait;
use navfuse_env::SurveyContext;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Survey epoch used by the simulator: 2024-01-01 00:00:00 UTC.
pub const SIM_EPOCH_S: u64 = 1_704_067_200;

/// Simulated context with a virtual clock.
///
/// Time only moves when the harness calls [`SimContext::advance_time`] or a
/// task sleeps, so a run is a pure function of its seed.
#[derive(Debug)]
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Virtual time since context creation, in nanoseconds
    virtual_ns: Arc<AtomicU64>,

    /// Wall-clock start of the simulated survey
    epoch: SystemTime,
}

impl SimContext {
    /// Creates a context whose survey starts at the simulator epoch.
    pub fn new(seed: u64) -> Self {
        Self::starting_at(seed, SIM_EPOCH_S as f64)
    }

    /// Creates a context whose survey starts at `start_utc` epoch seconds.
    pub fn starting_at(seed: u64, start_utc: f64) -> Self {
        Self {
            seed,
            virtual_ns: Arc::new(AtomicU64::new(0)),
            epoch: UNIX_EPOCH + Duration::from_secs_f64(start_utc.max(0.0)),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        self.virtual_ns.fetch_add(duration.as_nanos() as u64, Ordering::AcqRel);
    }

    /// Sets virtual time to a specific value; it never moves backwards.
    pub fn set_time(&self, time: Duration) {
        self.virtual_ns.fetch_max(time.as_nanos() as u64, Ordering::AcqRel);
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.virtual_ns.load(Ordering::Acquire)
    }

    /// Seconds of survey time elapsed.
    pub fn elapsed_s(&self) -> f64 {
        self.time_ns() as f64 * 1e-9
    }

    /// Current survey time as UTC epoch seconds.
    pub fn utc_s(&self) -> f64 {
        self.system_time()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_ns: self.virtual_ns.clone(),
            epoch: self.epoch,
        }
    }
}

#[async_trait]
impl SurveyContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    fn system_time(&self) -> SystemTime {
        self.epoch + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        // Sleeping in virtual time moves the clock, then yields once
        self.advance_time(duration);
        tokio::task::yield_now().await;
    }

    fn spawn<F>(&self, _name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(future);
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_virtual_time_advance() {
        let ctx = SimContext::new(42);

        assert_eq!(ctx.now(), Duration::ZERO);

        ctx.advance_time(Duration::from_secs(5));
        assert_eq!(ctx.now(), Duration::from_secs(5));

        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(5500));
    }

    #[test]
    fn test_set_time_never_rewinds() {
        let ctx = SimContext::new(1);
        ctx.set_time(Duration::from_secs(10));
        ctx.set_time(Duration::from_secs(3));
        assert_eq!(ctx.now(), Duration::from_secs(10));
    }

    #[test]
    fn test_clones_share_the_clock() {
        let ctx = SimContext::new(7);
        let other = ctx.clone();
        ctx.advance_time(Duration::from_secs(2));
        assert_eq!(other.now(), Duration::from_secs(2));
        assert_eq!(other.seed(), 7);
    }

    #[test]
    fn test_utc_follows_epoch() {
        let ctx = SimContext::starting_at(0, 1000.0);
        ctx.advance_time(Duration::from_millis(2500));
        assert!((ctx.utc_s() - 1002.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_sleep_moves_virtual_time() {
        let ctx = SimContext::new(0);
        ctx.sleep(Duration::from_secs(3)).await;
        assert_eq!(ctx.now(), Duration::from_secs(3));
    }
}
