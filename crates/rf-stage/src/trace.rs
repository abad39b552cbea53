//! StageTrace — The complete lifecycle record of one spin
//!
//! A trace captures every state entry, hook call and symbol change in the
//! order the controller produced them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::StageEvent;
use crate::stage::{Stage, StageCategory};
use crate::taxonomy::{CellPos, HookKind, LifecycleState};

/// A complete trace of stage events for one spin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTrace {
    /// Unique identifier for this trace
    pub trace_id: String,

    /// Title identifier (e.g., "buffalo_gold")
    pub game_id: String,

    /// Spin number within the owning session
    #[serde(default)]
    pub spin_id: Option<u64>,

    /// All events in recording order
    pub events: Vec<StageEvent>,

    /// When this trace was started
    pub recorded_at: DateTime<Utc>,

    /// Custom metadata
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl StageTrace {
    /// Create a new empty trace
    pub fn new(trace_id: impl Into<String>, game_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            game_id: game_id.into(),
            spin_id: None,
            events: Vec::new(),
            recorded_at: Utc::now(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Add an event to the trace
    pub fn push(&mut self, event: StageEvent) {
        self.events.push(event);
    }

    /// Set spin ID
    pub fn with_spin(mut self, spin_id: u64) -> Self {
        self.spin_id = Some(spin_id);
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Get total duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        let first = self.events.first().map(|e| e.timestamp_ms).unwrap_or(0.0);
        let last = self.events.last().map(|e| e.timestamp_ms).unwrap_or(0.0);
        last - first
    }

    /// Get events by category
    pub fn events_by_category(&self, category: StageCategory) -> Vec<&StageEvent> {
        self.events
            .iter()
            .filter(|e| e.stage.category() == category)
            .collect()
    }

    /// Get events by stage type name
    pub fn events_by_type(&self, type_name: &str) -> Vec<&StageEvent> {
        self.events
            .iter()
            .filter(|e| e.stage.type_name() == type_name)
            .collect()
    }

    /// Check if trace contains a specific stage type
    pub fn has_stage(&self, type_name: &str) -> bool {
        self.events.iter().any(|e| e.stage.type_name() == type_name)
    }

    /// Index of the first event matching a predicate
    pub fn position<F>(&self, predicate: F) -> Option<usize>
    where
        F: Fn(&Stage) -> bool,
    {
        self.events.iter().position(|e| predicate(&e.stage))
    }

    /// Sequence of lifecycle states entered, in order
    pub fn states(&self) -> Vec<LifecycleState> {
        self.events
            .iter()
            .filter_map(|e| match e.stage {
                Stage::StateEntered { state } => Some(state),
                _ => None,
            })
            .collect()
    }

    /// Number of times a state was entered
    pub fn state_entries(&self, state: LifecycleState) -> usize {
        self.states().into_iter().filter(|s| *s == state).count()
    }

    /// Sequence of hook invocations, in order
    pub fn hooks(&self) -> Vec<(HookKind, Option<u8>)> {
        self.events
            .iter()
            .filter_map(|e| match e.stage {
                Stage::Hook { hook, reel_index } => Some((hook, reel_index)),
                _ => None,
            })
            .collect()
    }

    /// Number of times a hook was invoked
    pub fn hook_count(&self, hook: HookKind) -> usize {
        self.hooks().into_iter().filter(|(h, _)| *h == hook).count()
    }

    /// Reels passed to a per-reel hook, in call order
    pub fn reels_for(&self, hook: HookKind) -> Vec<u8> {
        self.hooks()
            .into_iter()
            .filter(|(h, _)| *h == hook)
            .filter_map(|(_, reel)| reel)
            .collect()
    }

    /// Cells that changed identity, in application order
    pub fn mutated_cells(&self) -> Vec<(CellPos, String)> {
        self.events
            .iter()
            .filter_map(|e| match &e.stage {
                Stage::SymbolMutated { cell, to, .. } => Some((*cell, to.clone())),
                _ => None,
            })
            .collect()
    }

    /// Music keys switched, in order
    pub fn music_switches(&self) -> Vec<&str> {
        self.events
            .iter()
            .filter_map(|e| match &e.stage {
                Stage::MusicSwitched { key } => Some(key.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of terminal settle records
    pub fn settle_count(&self) -> usize {
        self.events_by_type("settled").len()
    }

    /// Displayed payout, if the base settle behaviour ran
    pub fn payout(&self) -> Option<f64> {
        self.events.iter().rev().find_map(|e| match e.stage {
            Stage::PayoutDisplayed { credits } => Some(credits),
            _ => None,
        })
    }

    /// Validate trace has the required lifecycle shape
    pub fn validate(&self) -> TraceValidation {
        let states = self.states();
        TraceValidation {
            starts_with_prespin: states.first() == Some(&LifecycleState::PreSpin),
            ends_settled: matches!(self.events.last().map(|e| &e.stage), Some(Stage::Settled)),
            settle_count: self.settle_count(),
            reels_stopped_callbacks: self.hook_count(HookKind::ReelsStoppedCallback),
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get summary of trace
    pub fn summary(&self) -> TraceSummary {
        TraceSummary {
            trace_id: self.trace_id.clone(),
            game_id: self.game_id.clone(),
            event_count: self.events.len(),
            duration_ms: self.duration_ms(),
            hook_calls: self.hooks().len(),
            mutated_cells: self.mutated_cells().len(),
            payout: self.payout(),
        }
    }
}

/// Validation result for a trace
#[derive(Debug, Clone, Default)]
pub struct TraceValidation {
    pub starts_with_prespin: bool,
    pub ends_settled: bool,
    pub settle_count: usize,
    pub reels_stopped_callbacks: usize,
}

impl TraceValidation {
    /// A complete spin starts in PreSpin and settles exactly once
    pub fn is_valid(&self) -> bool {
        self.starts_with_prespin
            && self.ends_settled
            && self.settle_count == 1
            && self.reels_stopped_callbacks == 1
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();

        if !self.starts_with_prespin {
            warnings.push("Spin did not start in PreSpin");
        }
        if !self.ends_settled {
            warnings.push("Trace does not end with SETTLED");
        }
        if self.settle_count > 1 {
            warnings.push("Spin settled more than once");
        }
        if self.reels_stopped_callbacks != 1 {
            warnings.push("reels_stopped_callback not invoked exactly once");
        }

        warnings
    }
}

/// Summary of a trace for quick overview
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceSummary {
    pub trace_id: String,
    pub game_id: String,
    pub event_count: usize,
    pub duration_ms: f64,
    pub hook_calls: usize,
    pub mutated_cells: usize,
    pub payout: Option<f64>,
}
