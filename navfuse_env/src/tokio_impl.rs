//! Wall-clock survey context backed by Tokio.
//!
//! Survey time runs `speedup` times faster than the wall clock, so a
//! recorded survey can be replayed against a live engine at a chosen rate.

use crate::SurveyContext;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

/// Production context: Tokio timers, system clock, optional replay speedup.
#[derive(Debug, Clone)]
pub struct TokioContext {
    start: Instant,
    started_at: SystemTime,
    /// Survey seconds per wall-clock second
    speedup: f64,
}

impl TokioContext {
    /// A context running at wall-clock rate.
    pub fn new() -> Self {
        Self::with_speedup(1.0)
    }

    /// A replay context; non-positive or non-finite rates fall back to 1.
    pub fn with_speedup(speedup: f64) -> Self {
        let speedup = if speedup.is_finite() && speedup > 0.0 { speedup } else { 1.0 };
        Self {
            start: Instant::now(),
            started_at: SystemTime::now(),
            speedup,
        }
    }

    pub fn shared(speedup: f64) -> Arc<Self> {
        Arc::new(Self::with_speedup(speedup))
    }

    pub fn speedup(&self) -> f64 {
        self.speedup
    }

    /// Wall-clock time needed to cover `survey` seconds of survey time.
    pub fn wall_duration(&self, survey: Duration) -> Duration {
        survey.div_f64(self.speedup)
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SurveyContext for TokioContext {
    /// Survey time elapsed since creation.
    fn now(&self) -> Duration {
        self.start.elapsed().mul_f64(self.speedup)
    }

    /// Replay instant: creation time plus scaled survey time.
    fn system_time(&self) -> SystemTime {
        self.started_at + self.now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(self.wall_duration(duration)).await;
    }

    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        debug!("Spawning task '{}'", name);
        tokio::spawn(future);
    }

    fn seed(&self) -> u64 {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speedup_scales_sleep() {
        let ctx = TokioContext::with_speedup(50.0);
        assert_eq!(ctx.wall_duration(Duration::from_secs(5)), Duration::from_millis(100));
        assert_eq!(ctx.seed(), 0);

        assert_eq!(TokioContext::with_speedup(0.0).speedup(), 1.0);
        assert_eq!(TokioContext::with_speedup(f64::NAN).speedup(), 1.0);
    }

    #[tokio::test]
    async fn test_survey_clock_runs_fast() {
        let ctx = TokioContext::with_speedup(100.0);
        let before = ctx.now();
        // One survey second is 10 ms of wall time
        ctx.sleep(Duration::from_secs(1)).await;
        let elapsed = ctx.now() - before;

        assert!(elapsed >= Duration::from_secs(1));
        assert!(ctx.system_time() >= ctx.started_at + Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_spawned_task_runs() {
        let ctx = TokioContext::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        ctx.spawn("answer", async move {
            let _ = tx.send(7u32);
        });
        assert_eq!(rx.await.unwrap(), 7);
    }
}
