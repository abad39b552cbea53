//! Title configuration: grid geometry, reel layout, stop order, audio keys
//!
//! Loaded from JSON or YAML. Everything but the grid has a default, so a
//! minimal title file only declares its dimensions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timing::TimingConfig;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JSON parse error: {0}")]
    Json(String),

    #[error("YAML parse error: {0}")]
    Yaml(String),

    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    #[error("Invalid stop order: {0}")]
    InvalidStopOrder(String),

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Invalid timing: {field} must be finite and non-negative")]
    InvalidTiming { field: &'static str },
}

/// Grid dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Number of reels (columns)
    pub reels: u8,
    /// Visible rows per reel
    pub rows: u8,
    /// Symbol layers per cell; layer 0 is the reel strip, layer 1 the sticky overlay
    #[serde(default = "default_layers")]
    pub layers: u8,
}

fn default_layers() -> u8 {
    2
}

impl GridSpec {
    pub fn new(reels: u8, rows: u8) -> Self {
        Self {
            reels,
            rows,
            layers: default_layers(),
        }
    }

    /// Standard 5x3 grid
    pub fn standard_5x3() -> Self {
        Self::new(5, 3)
    }

    /// Standard 5x4 grid
    pub fn standard_5x4() -> Self {
        Self::new(5, 4)
    }

    /// Total visible positions
    pub fn total_positions(&self) -> usize {
        self.reels as usize * self.rows as usize
    }

    /// Whether the grid carries a sticky overlay layer
    pub fn has_overlay(&self) -> bool {
        self.layers > 1
    }

    pub fn contains(&self, reel: usize, row: usize) -> bool {
        reel < self.reels as usize && row < self.rows as usize
    }
}

impl Default for GridSpec {
    fn default() -> Self {
        Self::standard_5x3()
    }
}

/// Screen-space point
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

impl Anchor {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Placement of one reel on screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReelLayout {
    /// Anchor of the top visible row
    pub root: Anchor,
    /// Vertical distance between two rows
    pub spacing: f32,
    /// Stop sound played instead of the title-wide key
    #[serde(default)]
    pub stop_sound: Option<String>,
}

/// Audio cue keys used by the lifecycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioKeys {
    pub spin_start: String,
    pub reel_stop: String,
    pub base_music: String,
    pub feature_music: String,
    pub bonus_acquired: String,
}

impl Default for AudioKeys {
    fn default() -> Self {
        Self {
            spin_start: "spin_start".into(),
            reel_stop: "reel_stop".into(),
            base_music: "base_game".into(),
            feature_music: "feature".into(),
            bonus_acquired: "bonus_acquired".into(),
        }
    }
}

/// Presentation of one mutation type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationStyle {
    /// Pooled effect shown on each transformed cell
    pub effect: Option<String>,
    /// Pooled effect flown between relocation anchors
    pub relocation_effect: Option<String>,
    /// Sound played per transformed cell
    pub cue: Option<String>,
    /// Symbol animation clip used for the identity change
    pub transition: Option<String>,
}

/// Complete title configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpinConfig {
    /// Title identifier (e.g., "buffalo_gold")
    #[serde(default = "default_game_id")]
    pub game_id: String,

    pub grid: GridSpec,

    /// Per-reel placement; derived from `default_spacing` when empty
    #[serde(default)]
    pub layout: Vec<ReelLayout>,

    /// Order in which reels are stopped; left to right when empty
    #[serde(default)]
    pub stop_order: Vec<u8>,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub audio: AudioKeys,

    /// Presentation per mutation `type`
    #[serde(default)]
    pub mutation_styles: HashMap<String, MutationStyle>,

    /// Wait for each reel's landing flag before its stop hook
    #[serde(default)]
    pub await_reel_landing: bool,

    /// Identity placed on every cell before the first outcome lands
    #[serde(default = "default_filler")]
    pub filler_symbol: String,

    #[serde(default = "default_spacing")]
    pub default_spacing: f32,
}

fn default_game_id() -> String {
    "generic".into()
}

fn default_filler() -> String {
    "BL".into()
}

fn default_spacing() -> f32 {
    120.0
}

impl SpinConfig {
    pub fn new(game_id: impl Into<String>, grid: GridSpec) -> Self {
        Self {
            game_id: game_id.into(),
            grid,
            layout: Vec::new(),
            stop_order: Vec::new(),
            timing: TimingConfig::default(),
            audio: AudioKeys::default(),
            mutation_styles: HashMap::new(),
            await_reel_landing: false,
            filler_symbol: default_filler(),
            default_spacing: default_spacing(),
        }
    }

    pub fn with_timing(mut self, timing: TimingConfig) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_stop_order(mut self, order: Vec<u8>) -> Self {
        self.stop_order = order;
        self
    }

    pub fn with_style(mut self, kind: impl Into<String>, style: MutationStyle) -> Self {
        self.mutation_styles.insert(kind.into(), style);
        self
    }

    /// Parse and validate a JSON title file
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Json(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a YAML title file
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_yml::from_str(yaml).map_err(|e| ConfigError::Yaml(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::Json(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.reels == 0 || self.grid.rows == 0 {
            return Err(ConfigError::InvalidGrid(format!(
                "{}x{} has no visible cells",
                self.grid.reels, self.grid.rows
            )));
        }
        if self.grid.layers == 0 {
            return Err(ConfigError::InvalidGrid("at least one layer is required".into()));
        }

        if !self.stop_order.is_empty() {
            let reels = self.grid.reels as usize;
            if self.stop_order.len() != reels {
                return Err(ConfigError::InvalidStopOrder(format!(
                    "{} entries for {} reels",
                    self.stop_order.len(),
                    reels
                )));
            }
            let mut seen = vec![false; reels];
            for &reel in &self.stop_order {
                let slot = seen.get_mut(reel as usize).ok_or_else(|| {
                    ConfigError::InvalidStopOrder(format!("reel {reel} is out of range"))
                })?;
                if *slot {
                    return Err(ConfigError::InvalidStopOrder(format!(
                        "reel {reel} listed twice"
                    )));
                }
                *slot = true;
            }
        }

        if !self.layout.is_empty() && self.layout.len() != self.grid.reels as usize {
            return Err(ConfigError::InvalidLayout(format!(
                "{} layouts for {} reels",
                self.layout.len(),
                self.grid.reels
            )));
        }

        let t = &self.timing;
        for (field, value) in [
            ("reel_spin_duration_ms", t.reel_spin_duration_ms),
            ("reel_stop_interval_ms", t.reel_stop_interval_ms),
            ("reevaluation_spin_duration_ms", t.reevaluation_spin_duration_ms),
            ("reevaluation_stop_interval_ms", t.reevaluation_stop_interval_ms),
            ("mutation_transform_ms", t.mutation_transform_ms),
            ("mutation_stagger_ms", t.mutation_stagger_ms),
            ("relocation_flight_ms", t.relocation_flight_ms),
            ("bonus_transition_ms", t.bonus_transition_ms),
            ("external_wait_guard_ms", t.external_wait_guard_ms),
            ("slam_min_wait_ms", t.slam_min_wait_ms),
            ("watchdog_ms", t.watchdog_ms),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidTiming { field });
            }
        }

        Ok(())
    }

    /// Reel indices in stop order
    pub fn stop_order(&self) -> Vec<usize> {
        if self.stop_order.is_empty() {
            (0..self.grid.reels as usize).collect()
        } else {
            self.stop_order.iter().map(|&r| r as usize).collect()
        }
    }

    /// Layout for a reel, derived from the default spacing when not configured
    pub fn layout_for(&self, reel: usize) -> ReelLayout {
        self.layout.get(reel).cloned().unwrap_or_else(|| ReelLayout {
            root: Anchor::new(reel as f32 * self.default_spacing, 0.0),
            spacing: self.default_spacing,
            stop_sound: None,
        })
    }

    /// Presentation for a mutation type
    pub fn style_for(&self, kind: &str) -> MutationStyle {
        self.mutation_styles.get(kind).cloned().unwrap_or_default()
    }
}

impl Default for SpinConfig {
    fn default() -> Self {
        Self::new(default_game_id(), GridSpec::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::TimingProfile;

    #[test]
    fn test_grid_spec() {
        let grid = GridSpec::standard_5x3();
        assert_eq!(grid.total_positions(), 15);
        assert!(grid.has_overlay());
        assert!(grid.contains(4, 2));
        assert!(!grid.contains(5, 0));
    }

    #[test]
    fn test_minimal_json() {
        let config = SpinConfig::from_json(r#"{"grid": {"reels": 3, "rows": 3}}"#).unwrap();

        assert_eq!(config.game_id, "generic");
        assert_eq!(config.grid.layers, 2);
        assert_eq!(config.stop_order(), vec![0, 1, 2]);
        assert_eq!(config.timing.profile, TimingProfile::Normal);
        assert_eq!(config.filler_symbol, "BL");
    }

    #[test]
    fn test_yaml_with_styles() {
        let yaml = r#"
game_id: buffalo_gold
grid: { reels: 5, rows: 4 }
stop_order: [0, 2, 1, 3, 4]
await_reel_landing: true
timing:
  profile: turbo
mutation_styles:
  standard:
    effect: wild_burst
    cue: wild_land
"#;
        let config = SpinConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.stop_order(), vec![0, 2, 1, 3, 4]);
        assert!(config.await_reel_landing);
        assert_eq!(config.style_for("standard").effect.as_deref(), Some("wild_burst"));
        assert_eq!(config.style_for("unknown"), MutationStyle::default());
    }

    #[test]
    fn test_stop_order_must_be_permutation() {
        let twice = SpinConfig::new("t", GridSpec::new(3, 3)).with_stop_order(vec![0, 0, 1]);
        assert!(matches!(twice.validate(), Err(ConfigError::InvalidStopOrder(_))));

        let short = SpinConfig::new("t", GridSpec::new(3, 3)).with_stop_order(vec![0, 1]);
        assert!(matches!(short.validate(), Err(ConfigError::InvalidStopOrder(_))));

        let out = SpinConfig::new("t", GridSpec::new(3, 3)).with_stop_order(vec![0, 1, 3]);
        assert!(matches!(out.validate(), Err(ConfigError::InvalidStopOrder(_))));
    }

    #[test]
    fn test_empty_grid_rejected() {
        let config = SpinConfig::new("t", GridSpec::new(0, 3));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidGrid(_))));
    }

    #[test]
    fn test_negative_timing_rejected() {
        let mut config = SpinConfig::default();
        config.timing.mutation_stagger_ms = -1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTiming {
                field: "mutation_stagger_ms"
            })
        ));
    }

    #[test]
    fn test_derived_layout() {
        let config = SpinConfig::default();
        let layout = config.layout_for(2);
        assert_eq!(layout.root, Anchor::new(240.0, 0.0));
        assert_eq!(layout.spacing, 120.0);
    }
}
