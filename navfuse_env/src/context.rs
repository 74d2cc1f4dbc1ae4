//! Survey clock abstraction for NavFuse drivers.

use async_trait::async_trait;
use std::future::Future;
use std::time::{Duration, SystemTime};

/// The clock and task interface used by whatever drives a fusion engine.
///
/// The engine itself is poll-driven and never sleeps; the ingest loop
/// around it decides when to poll. This trait lets that loop run against
/// real time in production and virtual time in simulation.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, optionally sped up for replay
/// - **Simulation**: `SimContext` - virtual clock advanced by the harness
#[async_trait]
pub trait SurveyContext: Send + Sync + 'static {
    /// Returns the monotonic time since context creation.
    fn now(&self) -> Duration;

    /// Returns the wall-clock time used to stamp recorded records.
    fn system_time(&self) -> SystemTime;

    /// Suspends the calling task for the given duration.
    async fn sleep(&self, duration: Duration);

    /// Spawns a background task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;

    /// Returns the context's seed (0 when not seeded).
    fn seed(&self) -> u64;
}
