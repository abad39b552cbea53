//! Reevaluation chain — respin countdown of a respin-class feature

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("A reevaluation chain is already running ({spins_remaining} spins left)")]
    AlreadyActive { spins_remaining: u32 },
}

/// State of the current respin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReevaluationSpin {
    pub spins_remaining: u32,
    /// The current respin locked at least one sticky symbol
    pub produced_sticky: bool,
}

/// Result of starting the next respin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainStep {
    /// More respins follow this one
    pub is_continuing: bool,
    pub spins_remaining: u32,
}

/// Countdown of respins; only a title's completion hook may extend it
#[derive(Debug, Clone, Default)]
pub struct ReevaluationChain {
    spin: Option<ReevaluationSpin>,
    spins_played: u32,
    granted: u32,
}

impl ReevaluationChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a chain of `spins` respins; zero starts nothing
    pub fn begin(&mut self, spins: u32) -> Result<(), ChainError> {
        if let Some(spin) = self.spin {
            return Err(ChainError::AlreadyActive {
                spins_remaining: spin.spins_remaining,
            });
        }
        self.spins_played = 0;
        self.granted = spins;
        if spins > 0 {
            self.spin = Some(ReevaluationSpin {
                spins_remaining: spins,
                produced_sticky: false,
            });
        }
        Ok(())
    }

    /// Consume one respin
    pub fn advance(&mut self) -> ChainStep {
        let Some(spin) = self.spin.as_mut() else {
            return ChainStep {
                is_continuing: false,
                spins_remaining: 0,
            };
        };
        spin.spins_remaining = spin.spins_remaining.saturating_sub(1);
        spin.produced_sticky = false;
        self.spins_played += 1;
        ChainStep {
            is_continuing: spin.spins_remaining > 0,
            spins_remaining: spin.spins_remaining,
        }
    }

    /// Grant extra respins
    pub fn extend(&mut self, spins: u32) {
        if let Some(spin) = self.spin.as_mut() {
            spin.spins_remaining += spins;
            self.granted += spins;
        }
    }

    pub fn mark_sticky(&mut self) {
        if let Some(spin) = self.spin.as_mut() {
            spin.produced_sticky = true;
        }
    }

    /// End the chain, returning how many respins were played
    pub fn finish(&mut self) -> u32 {
        self.spin = None;
        self.spins_played
    }

    pub fn is_active(&self) -> bool {
        self.spin.is_some()
    }

    /// Another respin is owed after the current one
    pub fn should_continue(&self) -> bool {
        self.spin.is_some_and(|s| s.spins_remaining > 0)
    }

    pub fn current(&self) -> Option<ReevaluationSpin> {
        self.spin
    }

    pub fn spins_remaining(&self) -> u32 {
        self.spin.map_or(0, |s| s.spins_remaining)
    }

    pub fn spins_played(&self) -> u32 {
        self.spins_played
    }

    /// Respins granted including extensions
    pub fn spins_granted(&self) -> u32 {
        self.granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_continues_until_last_spin() {
        let mut chain = ReevaluationChain::new();
        chain.begin(3).unwrap();

        let steps: Vec<bool> = (0..3).map(|_| chain.advance().is_continuing).collect();
        assert_eq!(steps, vec![true, true, false]);
        assert!(!chain.should_continue());
        assert_eq!(chain.finish(), 3);
        assert!(!chain.is_active());
    }

    #[test]
    fn test_zero_spins_starts_nothing() {
        let mut chain = ReevaluationChain::new();
        chain.begin(0).unwrap();
        assert!(!chain.is_active());
        assert!(!chain.advance().is_continuing);
    }

    #[test]
    fn test_cannot_begin_twice() {
        let mut chain = ReevaluationChain::new();
        chain.begin(2).unwrap();
        assert_eq!(
            chain.begin(1),
            Err(ChainError::AlreadyActive { spins_remaining: 2 })
        );
    }

    #[test]
    fn test_extend_and_sticky() {
        let mut chain = ReevaluationChain::new();
        chain.begin(1).unwrap();

        let step = chain.advance();
        assert!(!step.is_continuing);
        chain.mark_sticky();
        assert!(chain.current().unwrap().produced_sticky);

        chain.extend(2);
        assert!(chain.should_continue());
        assert_eq!(chain.spins_granted(), 3);

        let step = chain.advance();
        assert_eq!(step.spins_remaining, 1);
        assert!(!chain.current().unwrap().produced_sticky);
    }
}
