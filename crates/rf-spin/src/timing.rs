//! Timing profiles for the spin lifecycle

use serde::{Deserialize, Serialize};

/// Timing profile for lifecycle waits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingProfile {
    /// Normal gameplay timing
    #[default]
    Normal,
    /// Fast/Turbo mode
    Turbo,
    /// Studio mode (short but visible, for title authoring)
    Studio,
    /// Zero-length waits, for tests and batch runs
    Instant,
    /// Hand-tuned or scaled timing
    Custom,
}

/// Detailed timing configuration
///
/// Every duration is in milliseconds of spin clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Profile type
    pub profile: TimingProfile,

    /// Time the reels spin before the first stop
    pub reel_spin_duration_ms: f64,

    /// Delay between reel stops
    pub reel_stop_interval_ms: f64,

    /// Spin time of each reevaluation pass
    pub reevaluation_spin_duration_ms: f64,

    /// Delay between reel stops during reevaluation
    pub reevaluation_stop_interval_ms: f64,

    /// Transform animation per mutated cell
    pub mutation_transform_ms: f64,

    /// Gap between two mutated cells
    pub mutation_stagger_ms: f64,

    /// Flight of a relocating symbol between two reel anchors
    pub relocation_flight_ms: f64,

    /// Bonus-acquired transition before the bonus game is started
    pub bonus_transition_ms: f64,

    /// Upper bound on any wait for an external flag
    pub external_wait_guard_ms: f64,

    /// Floor for duration waits once slam-stop is requested
    pub slam_min_wait_ms: f64,

    /// A spin that makes no lifecycle progress for this long is fatal
    pub watchdog_ms: f64,
}

impl TimingConfig {
    /// Normal gameplay timing
    pub fn normal() -> Self {
        Self {
            profile: TimingProfile::Normal,
            reel_spin_duration_ms: 800.0,
            reel_stop_interval_ms: 300.0,
            reevaluation_spin_duration_ms: 600.0,
            reevaluation_stop_interval_ms: 200.0,
            mutation_transform_ms: 400.0,
            mutation_stagger_ms: 120.0,
            relocation_flight_ms: 500.0,
            bonus_transition_ms: 2000.0,
            external_wait_guard_ms: 500.0,
            slam_min_wait_ms: 0.0,
            watchdog_ms: 60_000.0,
        }
    }

    /// Turbo mode
    pub fn turbo() -> Self {
        Self {
            profile: TimingProfile::Turbo,
            reel_spin_duration_ms: 400.0,
            reel_stop_interval_ms: 100.0,
            reevaluation_spin_duration_ms: 300.0,
            reevaluation_stop_interval_ms: 80.0,
            mutation_transform_ms: 200.0,
            mutation_stagger_ms: 50.0,
            relocation_flight_ms: 250.0,
            bonus_transition_ms: 1000.0,
            external_wait_guard_ms: 500.0,
            slam_min_wait_ms: 0.0,
            watchdog_ms: 60_000.0,
        }
    }

    /// Studio mode (short waits that still show every step)
    pub fn studio() -> Self {
        Self {
            profile: TimingProfile::Studio,
            reel_spin_duration_ms: 200.0,
            reel_stop_interval_ms: 60.0,
            reevaluation_spin_duration_ms: 150.0,
            reevaluation_stop_interval_ms: 40.0,
            mutation_transform_ms: 100.0,
            mutation_stagger_ms: 20.0,
            relocation_flight_ms: 120.0,
            bonus_transition_ms: 300.0,
            external_wait_guard_ms: 500.0,
            slam_min_wait_ms: 0.0,
            watchdog_ms: 30_000.0,
        }
    }

    /// Every timed wait collapses to zero; guards and watchdog stay armed
    pub fn instant() -> Self {
        Self {
            profile: TimingProfile::Instant,
            reel_spin_duration_ms: 0.0,
            reel_stop_interval_ms: 0.0,
            reevaluation_spin_duration_ms: 0.0,
            reevaluation_stop_interval_ms: 0.0,
            mutation_transform_ms: 0.0,
            mutation_stagger_ms: 0.0,
            relocation_flight_ms: 0.0,
            bonus_transition_ms: 0.0,
            external_wait_guard_ms: 500.0,
            slam_min_wait_ms: 0.0,
            watchdog_ms: 30_000.0,
        }
    }

    /// Get config for profile
    pub fn from_profile(profile: TimingProfile) -> Self {
        match profile {
            TimingProfile::Normal => Self::normal(),
            TimingProfile::Turbo => Self::turbo(),
            TimingProfile::Studio => Self::studio(),
            TimingProfile::Instant => Self::instant(),
            TimingProfile::Custom => Self::normal(),
        }
    }

    /// Scale all presentation timing by a factor (1.0 = unchanged)
    ///
    /// The external wait guard, slam floor and watchdog are safety bounds
    /// and are left as they are.
    pub fn scaled(&self, factor: f64) -> Self {
        let factor = factor.max(0.0);
        Self {
            profile: TimingProfile::Custom,
            reel_spin_duration_ms: self.reel_spin_duration_ms * factor,
            reel_stop_interval_ms: self.reel_stop_interval_ms * factor,
            reevaluation_spin_duration_ms: self.reevaluation_spin_duration_ms * factor,
            reevaluation_stop_interval_ms: self.reevaluation_stop_interval_ms * factor,
            mutation_transform_ms: self.mutation_transform_ms * factor,
            mutation_stagger_ms: self.mutation_stagger_ms * factor,
            relocation_flight_ms: self.relocation_flight_ms * factor,
            bonus_transition_ms: self.bonus_transition_ms * factor,
            external_wait_guard_ms: self.external_wait_guard_ms,
            slam_min_wait_ms: self.slam_min_wait_ms,
            watchdog_ms: self.watchdog_ms,
        }
    }

    /// Time from spin start until the last reel has stopped
    pub fn total_spin_duration(&self, reel_count: usize) -> f64 {
        self.reel_spin_duration_ms
            + self.reel_stop_interval_ms * reel_count.saturating_sub(1) as f64
    }

    /// Playback time of a mutation touching `cells` cells
    pub fn mutation_duration(&self, cells: usize) -> f64 {
        if cells == 0 {
            return 0.0;
        }
        self.mutation_transform_ms * cells as f64
            + self.mutation_stagger_ms * (cells - 1) as f64
    }

    /// Whether every presentation wait is zero-length
    pub fn is_instant(&self) -> bool {
        self.reel_spin_duration_ms == 0.0
            && self.reel_stop_interval_ms == 0.0
            && self.reevaluation_spin_duration_ms == 0.0
            && self.reevaluation_stop_interval_ms == 0.0
            && self.mutation_transform_ms == 0.0
            && self.mutation_stagger_ms == 0.0
            && self.relocation_flight_ms == 0.0
            && self.bonus_transition_ms == 0.0
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::normal()
    }
}
