//! NavFuse Deterministic Survey Simulation Harness
//!
//! This crate provides a controlled survey in which the whole fusion
//! pipeline runs deterministically, from recorder to query.
//!
//! # Core Principle: One Seed
//!
//! All sources of non-determinism are owned by the harness:
//! - **Time**: a virtual clock advanced by recorder ticks
//! - **Sensors**: GNSS, gyro and echosounder noise drawn from seeded RNGs
//! - **Recorder**: clock offset, drift and logging latency, plus optional
//!   record corruption
//!
//! # Architecture
//!
//! ```text
//!  Oracle (lawn-mower ground truth)
//!     │ noisy readings               │ truth
//!     ▼                              │
//!  Recorder (JSON, drifting stamps)  │
//!     │ raw records                  │
//!     ▼                              │
//!  MemoryChannelStore                │
//!     │ advance()                    │
//!     ▼                              ▼
//!  FusionEngine ───── query() ────► ScenarioMetrics / SimExport
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use navfuse_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42)
//!     .with_duration(300.0)
//!     .run(ScenarioId::SteadySurvey);
//! assert!(result.passed);
//! ```

mod context;
mod error;
mod exporter;
mod oracle;
mod recorder;
mod runner;
pub mod scenarios;
mod world;

pub use context::{SimContext, SIM_EPOCH_S};
pub use error::SimError;
pub use exporter::{frame_at, FusedValue, SimEvent, SimExport, SimFrame, TruthPoint};
pub use oracle::{ClockModel, Oracle, SensorReading, SurveyPlan, TruthState};
pub use recorder::{JsonRecordParser, Payload, Recorder};
pub use runner::{LivePacing, ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{probe_times, settle, survey_sources, ErrorStats, SettleTally, SimConfig, SurveyWorld};
