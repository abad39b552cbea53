//! StageEvent — A stage occurrence with timing
//!
//! Wraps a Stage with the spin clock and the tick it was recorded on.

use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// A stage event with timing metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// The recorded stage
    pub stage: Stage,

    /// Spin clock in milliseconds (from spin request)
    pub timestamp_ms: f64,

    /// Controller tick the stage was recorded on
    #[serde(default)]
    pub tick: u64,

    /// Custom tags for filtering/routing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl StageEvent {
    /// Create a new stage event
    pub fn new(stage: Stage, timestamp_ms: f64) -> Self {
        Self {
            stage,
            timestamp_ms,
            tick: 0,
            tags: Vec::new(),
        }
    }

    /// Set the tick
    pub fn at_tick(mut self, tick: u64) -> Self {
        self.tick = tick;
        self
    }

    /// Add a tag
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Get stage type name
    pub fn type_name(&self) -> &'static str {
        self.stage.type_name()
    }
}
