//! Controller errors

use rf_stage::LifecycleState;
use thiserror::Error;

use crate::config::ConfigError;
use crate::grid::GridError;
use crate::mutation::MutationError;
use crate::outcome::OutcomeError;
use crate::pool::PoolError;
use crate::reevaluation::ChainError;

/// Errors raised by the spin lifecycle
#[derive(Debug, Error)]
pub enum SpinError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Outcome(#[from] OutcomeError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Grid(#[from] GridError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error("Cannot start a spin while {state}")]
    SpinInProgress { state: LifecycleState },

    #[error("Effects are leased by mutation playback")]
    EffectsInUse,

    #[error("No spin is running")]
    NotSpinning,

    #[error("Tick length must be positive, got {0}")]
    InvalidTick(f64),

    #[error("Spin did not settle: no progress in {state} for {elapsed_ms:.0}ms")]
    SettleTimeout {
        state: LifecycleState,
        elapsed_ms: f64,
    },
}

pub type Result<T> = std::result::Result<T, SpinError>;
