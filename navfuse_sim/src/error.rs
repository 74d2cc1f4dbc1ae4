//! Simulator error types.

use navfuse_core::FusionError;
use navfuse_env::EnvError;
use thiserror::Error;

/// Errors raised while setting up or driving a simulated survey.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("channel store error: {0}")]
    Env(#[from] EnvError),

    #[error("fusion engine error: {0}")]
    Fusion(#[from] FusionError),

    #[error("payload encoding failed: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("export failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("simulation task failed: {0}")]
    Task(String),
}
