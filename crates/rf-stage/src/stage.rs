//! Stage — What happened at one moment of a spin's lifecycle
//!
//! A Stage is NOT an animation. It is the semantic record of a state
//! entry, hook call or symbol change made by the lifecycle controller.

use serde::{Deserialize, Serialize};

use crate::taxonomy::{CellPos, HookKind, LifecycleState};

/// One recorded lifecycle occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    // ═══════════════════════════════════════════════════════════════════════
    // SPIN LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════
    /// A spin was accepted by the controller
    SpinRequested {
        spin_id: u64,
    },

    /// Controller entered a lifecycle state
    StateEntered {
        state: LifecycleState,
    },

    /// Reel was commanded to stop (and landed its final symbols)
    ReelStopped {
        reel_index: u8,
        #[serde(default)]
        reevaluation: bool,
    },

    /// Player requested a slam stop
    SlamStop,

    /// Base settle behaviour displayed the payout
    PayoutDisplayed {
        credits: f64,
    },

    /// Terminal settle, exactly once per spin
    Settled,

    // ═══════════════════════════════════════════════════════════════════════
    // HOOKS
    // ═══════════════════════════════════════════════════════════════════════
    /// Presentation hook invoked
    Hook {
        hook: HookKind,
        #[serde(default)]
        reel_index: Option<u8>,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // MUTATION
    // ═══════════════════════════════════════════════════════════════════════
    /// One symbol changed identity
    SymbolMutated {
        cell: CellPos,
        from: String,
        to: String,
        /// Source cell for relocation mutations
        #[serde(default)]
        relocated_from: Option<CellPos>,
    },

    /// Mutation abandoned because its data was malformed
    MutationRejected {
        reason: String,
    },

    /// Cosmetic effect skipped (no pooled instance and factory failed)
    EffectSkipped {
        kind: String,
    },

    /// Symbol locked for the rest of a reevaluation chain
    StickyLocked {
        cell: CellPos,
        symbol: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // FEATURE
    // ═══════════════════════════════════════════════════════════════════════
    /// Reevaluation chain started
    ChainStarted {
        spins: u32,
    },

    /// Reevaluation chain exhausted
    ChainFinished {
        spins_played: u32,
    },

    /// Background music key switched
    MusicSwitched {
        key: String,
    },

    // ═══════════════════════════════════════════════════════════════════════
    // DIAGNOSTICS
    // ═══════════════════════════════════════════════════════════════════════
    /// A guarded wait gave up on an external flag
    WaitTimedOut {
        waiting_on: String,
    },
}

impl Stage {
    /// Get the stage category for grouping
    pub fn category(&self) -> StageCategory {
        match self {
            Stage::SpinRequested { .. }
            | Stage::StateEntered { .. }
            | Stage::ReelStopped { .. }
            | Stage::SlamStop
            | Stage::PayoutDisplayed { .. }
            | Stage::Settled => StageCategory::SpinLifecycle,

            Stage::Hook { .. } => StageCategory::Hook,

            Stage::SymbolMutated { .. }
            | Stage::MutationRejected { .. }
            | Stage::EffectSkipped { .. }
            | Stage::StickyLocked { .. } => StageCategory::Mutation,

            Stage::ChainStarted { .. }
            | Stage::ChainFinished { .. }
            | Stage::MusicSwitched { .. } => StageCategory::Feature,

            Stage::WaitTimedOut { .. } => StageCategory::Diagnostic,
        }
    }

    /// Get a simple string name for this stage type
    pub fn type_name(&self) -> &'static str {
        match self {
            Stage::SpinRequested { .. } => "spin_requested",
            Stage::StateEntered { .. } => "state_entered",
            Stage::ReelStopped { .. } => "reel_stopped",
            Stage::SlamStop => "slam_stop",
            Stage::PayoutDisplayed { .. } => "payout_displayed",
            Stage::Settled => "settled",
            Stage::Hook { .. } => "hook",
            Stage::SymbolMutated { .. } => "symbol_mutated",
            Stage::MutationRejected { .. } => "mutation_rejected",
            Stage::EffectSkipped { .. } => "effect_skipped",
            Stage::StickyLocked { .. } => "sticky_locked",
            Stage::ChainStarted { .. } => "chain_started",
            Stage::ChainFinished { .. } => "chain_finished",
            Stage::MusicSwitched { .. } => "music_switched",
            Stage::WaitTimedOut { .. } => "wait_timed_out",
        }
    }

    /// Hook invocation shorthand
    pub fn hook(hook: HookKind) -> Self {
        Stage::Hook {
            hook,
            reel_index: None,
        }
    }

    /// Per-reel hook invocation shorthand
    pub fn reel_hook(hook: HookKind, reel: usize) -> Self {
        Stage::Hook {
            hook,
            reel_index: Some(reel as u8),
        }
    }
}

/// Stage category for grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageCategory {
    SpinLifecycle,
    Hook,
    Mutation,
    Feature,
    Diagnostic,
}

impl StageCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::SpinLifecycle => "Spin Lifecycle",
            Self::Hook => "Presentation Hooks",
            Self::Mutation => "Symbol Mutation",
            Self::Feature => "Features",
            Self::Diagnostic => "Diagnostics",
        }
    }
}
