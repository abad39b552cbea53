//! Server spin outcome payload
//!
//! The outcome arrives as camelCase JSON and is read-only for the rest of
//! the spin. Only the fields the lifecycle consumes are modelled; nested
//! reevaluation `outcomes` stay opaque.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome payload errors
#[derive(Debug, Error)]
pub enum OutcomeError {
    #[error("Outcome parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result of one spin as decided by the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Outcome {
    pub is_bonus: bool,
    pub is_credit: bool,
    pub is_gifting: bool,
    pub is_challenge: bool,
    pub sub_outcomes: Vec<SubOutcome>,
    /// Consumed strictly in order
    pub mutations: Vec<Mutation>,
    /// One entry per respin of a respin-class feature
    pub reevaluations: Vec<Reevaluation>,
    /// Final identities per reel, top row first
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reel_matrix: Option<Vec<Vec<String>>>,
}

/// One paying combination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubOutcome {
    pub win_id: u32,
    pub credits: f64,
    pub symbol_match_count: u32,
}

/// Server-declared symbol transformation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    /// Presentation key, e.g. "standard" or "relocation"
    #[serde(rename = "type", default = "default_mutation_type")]
    pub kind: String,

    /// `[reel][row]` target identity; null or empty means no change
    #[serde(default)]
    pub trigger_symbol_names: Option<Vec<Vec<Option<String>>>>,

    /// Relocation sources, paired index-wise with `to_mutations`
    #[serde(default)]
    pub from_mutations: Vec<ReelPosition>,

    #[serde(default)]
    pub to_mutations: Vec<ReelPosition>,
}

fn default_mutation_type() -> String {
    "standard".into()
}

/// Cell address as sent by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReelPosition {
    pub reel: u32,
    pub position: u32,
}

/// One respin of a reevaluation chain
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Reevaluation {
    /// Identities landed by this respin, per reel
    pub reevaluated_matrix: Vec<Vec<String>>,
    /// Win data of the respin, passed through untouched
    pub outcomes: serde_json::Value,
    pub mutations: Vec<Mutation>,
    /// Symbols locked for the remainder of the chain
    pub sticky_symbols: Vec<StickySymbol>,
}

/// A symbol locked in place by a reevaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickySymbol {
    pub reel: u32,
    pub position: u32,
    pub name: String,
}

/// Kind of bonus an outcome awards
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BonusKind {
    Gifting,
    Challenge,
    Credit,
    Generic,
}

impl Outcome {
    pub fn from_json(json: &str) -> Result<Self, OutcomeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, OutcomeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Sum of all sub-outcome credits
    pub fn total_credits(&self) -> f64 {
        self.sub_outcomes.iter().map(|s| s.credits).sum()
    }

    pub fn bonus_kind(&self) -> Option<BonusKind> {
        if !self.is_bonus {
            return None;
        }
        Some(if self.is_gifting {
            BonusKind::Gifting
        } else if self.is_challenge {
            BonusKind::Challenge
        } else if self.is_credit {
            BonusKind::Credit
        } else {
            BonusKind::Generic
        })
    }

    pub fn has_reevaluations(&self) -> bool {
        !self.reevaluations.is_empty()
    }

    pub fn with_mutation(mut self, mutation: Mutation) -> Self {
        self.mutations.push(mutation);
        self
    }

    pub fn with_reevaluation(mut self, reevaluation: Reevaluation) -> Self {
        self.reevaluations.push(reevaluation);
        self
    }

    pub fn with_win(mut self, win_id: u32, credits: f64) -> Self {
        self.sub_outcomes.push(SubOutcome {
            win_id,
            credits,
            symbol_match_count: 0,
        });
        self
    }
}

impl Mutation {
    /// Grid-only mutation; empty strings mean "no change"
    pub fn standard(grid: &[&[&str]]) -> Self {
        let names = grid
            .iter()
            .map(|reel| {
                reel.iter()
                    .map(|name| (!name.is_empty()).then(|| name.to_string()))
                    .collect()
            })
            .collect();
        Self {
            kind: default_mutation_type(),
            trigger_symbol_names: Some(names),
            from_mutations: Vec::new(),
            to_mutations: Vec::new(),
        }
    }

    /// Add a relocation from one cell to another
    pub fn with_relocation(mut self, from: (u32, u32), to: (u32, u32)) -> Self {
        self.kind = "relocation".into();
        self.from_mutations.push(ReelPosition {
            reel: from.0,
            position: from.1,
        });
        self.to_mutations.push(ReelPosition {
            reel: to.0,
            position: to.1,
        });
        self
    }

    pub fn is_relocation(&self) -> bool {
        !self.from_mutations.is_empty() || !self.to_mutations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_server_payload() {
        let payload = json!({
            "isBonus": false,
            "subOutcomes": [{"winId": 3, "credits": 12.5, "symbolMatchCount": 4}],
            "mutations": [{
                "type": "standard",
                "triggerSymbolNames": [[null, "TW"], ["", null]]
            }],
            "reevaluations": [{
                "reevaluatedMatrix": [["M1", "M2"], ["M3", "M4"]],
                "outcomes": {"credits": 4},
                "stickySymbols": [{"reel": 1, "position": 0, "name": "WD"}]
            }]
        });
        let outcome = Outcome::from_json(&payload.to_string()).unwrap();

        assert_eq!(outcome.total_credits(), 12.5);
        assert_eq!(outcome.mutations.len(), 1);
        let names = outcome.mutations[0].trigger_symbol_names.as_ref().unwrap();
        assert_eq!(names[0][1].as_deref(), Some("TW"));
        assert_eq!(names[1][0].as_deref(), Some(""));
        assert!(outcome.reevaluations[0].mutations.is_empty());
        assert_eq!(outcome.reevaluations[0].sticky_symbols[0].name, "WD");
        assert_eq!(outcome.bonus_kind(), None);
    }

    #[test]
    fn test_null_trigger_grid_parses() {
        let outcome =
            Outcome::from_json(r#"{"mutations": [{"type": "standard", "triggerSymbolNames": null}]}"#)
                .unwrap();
        assert!(outcome.mutations[0].trigger_symbol_names.is_none());
    }

    #[test]
    fn test_bonus_kind() {
        let outcome = Outcome {
            is_bonus: true,
            is_gifting: true,
            ..Default::default()
        };
        assert_eq!(outcome.bonus_kind(), Some(BonusKind::Gifting));
    }

    #[test]
    fn test_mutation_builders() {
        let mutation = Mutation::standard(&[&["", "TW"], &["", ""]]);
        let names = mutation.trigger_symbol_names.as_ref().unwrap();
        assert_eq!(names[0], vec![None, Some("TW".to_string())]);
        assert!(!mutation.is_relocation());

        let relocation = mutation.with_relocation((0, 1), (1, 0));
        assert!(relocation.is_relocation());
        assert_eq!(relocation.kind, "relocation");
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            Outcome::from_json("{\"mutations\": 3}"),
            Err(OutcomeError::Parse(_))
        ));
    }
}
