//! Stage Taxonomy — Enums for lifecycle phases and presentation hooks
//!
//! These enums classify where a spin is in its lifecycle and which
//! presentation hook the controller invoked.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a single spin
///
/// `Idle` is the initial state. `Settled` is terminal for one spin and
/// immediately re-arms to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Idle,
    PreSpin,
    Spinning,
    ReelStopping,
    MutationPlayback,
    BonusTransition,
    Reevaluating,
    Settled,
}

impl LifecycleState {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::PreSpin => "Pre-Spin",
            Self::Spinning => "Spinning",
            Self::ReelStopping => "Reel Stopping",
            Self::MutationPlayback => "Mutation Playback",
            Self::BonusTransition => "Bonus Transition",
            Self::Reevaluating => "Reevaluating",
            Self::Settled => "Settled",
        }
    }

    /// A spin is in flight in every state except `Idle` and `Settled`
    pub fn is_busy(&self) -> bool {
        !matches!(self, Self::Idle | Self::Settled)
    }

    /// States that belong to the optional settle-path branches
    pub fn is_settle_branch(&self) -> bool {
        matches!(
            self,
            Self::MutationPlayback | Self::BonusTransition | Self::Reevaluating
        )
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Presentation hook identifiers, in the order the controller calls them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    PreSpin,
    HandleSpecificReelStop,
    PlayMutations,
    PlayBonusAcquiredEffects,
    StartBonusGame,
    OnBonusGameEnded,
    StartNextReevaluationSpin,
    HandleReevaluationReelStop,
    OnReevaluationSpinComplete,
    ReelsStoppedCallback,
}

impl HookKind {
    /// Hook name as titles know it
    pub fn name(&self) -> &'static str {
        match self {
            Self::PreSpin => "prespin",
            Self::HandleSpecificReelStop => "handle_specific_reel_stop",
            Self::PlayMutations => "play_mutations",
            Self::PlayBonusAcquiredEffects => "play_bonus_acquired_effects",
            Self::StartBonusGame => "start_bonus_game",
            Self::OnBonusGameEnded => "on_bonus_game_ended",
            Self::StartNextReevaluationSpin => "start_next_reevaluation_spin",
            Self::HandleReevaluationReelStop => "handle_reevaluation_reel_stop",
            Self::OnReevaluationSpinComplete => "on_reevaluation_spin_complete",
            Self::ReelsStoppedCallback => "reels_stopped_callback",
        }
    }

    /// Hooks that are called once per reel
    pub fn is_per_reel(&self) -> bool {
        matches!(
            self,
            Self::HandleSpecificReelStop | Self::HandleReevaluationReelStop
        )
    }
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Grid position of a symbol (reel is the column, row counts from the top)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    pub reel: u8,
    pub row: u8,
}

impl CellPos {
    pub fn new(reel: usize, row: usize) -> Self {
        Self {
            reel: reel as u8,
            row: row as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_states() {
        assert!(!LifecycleState::Idle.is_busy());
        assert!(!LifecycleState::Settled.is_busy());
        assert!(LifecycleState::MutationPlayback.is_busy());
        assert!(LifecycleState::Reevaluating.is_settle_branch());
        assert!(!LifecycleState::ReelStopping.is_settle_branch());
    }

    #[test]
    fn test_hook_order() {
        assert!(HookKind::PreSpin < HookKind::HandleSpecificReelStop);
        assert!(HookKind::PlayBonusAcquiredEffects < HookKind::StartBonusGame);
        assert!(HookKind::StartNextReevaluationSpin < HookKind::ReelsStoppedCallback);
        assert!(HookKind::HandleReevaluationReelStop.is_per_reel());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&LifecycleState::BonusTransition).unwrap();
        assert_eq!(json, "\"bonus_transition\"");
        let hook: HookKind = serde_json::from_str("\"reels_stopped_callback\"").unwrap();
        assert_eq!(hook, HookKind::ReelsStoppedCallback);
    }
}
