//! # rf-spin — Reel Spin Lifecycle Engine
//!
//! Drives one spin at a time from request to settle: reels stop in a
//! configured order, server mutations play cell by cell with pooled
//! effects, bonus games take over and hand back, and reevaluation chains
//! respin the grid with sticky symbols locked in place.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  request_spin   ┌──────────────────────────┐
//! │  Outcome  │ ──────────────▶ │ SpinLifecycleController  │
//! └───────────┘                 │  phase program + watchdog│
//!                               └──────┬─────────┬─────────┘
//!                   PresentationHooks  │         │  tick(dt)
//!                   ┌──────────────────┘         └──────────────┐
//!                   ▼                                           ▼
//!        ┌────────────────────┐  ┌───────────────┐   ┌───────────────────┐
//!        │ ReelGrid (strip +  │  │ MutationQueue │   │ Runtime (signals, │
//!        │ sticky overlay)    │  │ + Playback    │   │ audio, routines)  │
//!        └────────────────────┘  └───────┬───────┘   └───────────────────┘
//!                                        ▼
//!                               ┌────────────────┐
//!                               │ SessionContext │
//!                               │ (effect pools) │
//!                               └────────────────┘
//! ```
//!
//! Everything is single-threaded and cooperative: waits are suspensions
//! polled by `tick`, never blocking sleeps.
//!
//! ## Example
//!
//! ```
//! use rf_spin::{
//!     DefaultHooks, GridSpec, Outcome, Runtime, SessionContext, SessionId, SpinConfig,
//!     SpinLifecycleController,
//! };
//!
//! let config = SpinConfig::new("demo", GridSpec::standard_5x3());
//! let session = SessionContext::new(SessionId::BASE);
//! let mut controller =
//!     SpinLifecycleController::new(config, Box::new(DefaultHooks), session).unwrap();
//! let mut runtime = Runtime::silent();
//!
//! controller.request_spin(Outcome::default().with_win(1, 2.5)).unwrap();
//! let summary = controller.run_to_settle(&mut runtime, 16.0).unwrap();
//! assert_eq!(summary.payout, 2.5);
//! ```

pub mod audio;
pub mod config;
pub mod controller;
pub mod error;
pub mod grid;
pub mod hooks;
pub mod mutation;
pub mod outcome;
pub mod pool;
pub mod reevaluation;
pub mod schedule;
pub mod symbol;
pub mod timing;

pub use audio::{AudioCue, AudioLog, AudioSink, NullAudio};
pub use config::{Anchor, AudioKeys, ConfigError, GridSpec, MutationStyle, ReelLayout, SpinConfig};
pub use controller::{SpinLifecycleController, SpinStatus, SpinSummary};
pub use error::{Result, SpinError};
pub use grid::{GridError, MAIN_LAYER, ReelGrid, STICKY_LAYER};
pub use hooks::{DefaultHooks, HookContext, HookFlow, PresentationHooks, SettleHandle};
pub use mutation::{MutationError, MutationPlan, MutationPlayback, MutationQueue, MutationReport};
pub use outcome::{
    BonusKind, Mutation, Outcome, OutcomeError, Reevaluation, StickySymbol, SubOutcome,
};
pub use pool::{EffectInstance, EffectLease, EffectPool, PoolError, SessionContext, SessionId};
pub use reevaluation::{ChainError, ReevaluationChain};
pub use schedule::{Runtime, Sequence, Signals, Wait};
pub use symbol::{Symbol, SymbolHandle, Transition};
pub use timing::{TimingConfig, TimingProfile};

pub use rf_stage::{CellPos, HookKind, LifecycleState, Stage, StageEvent, StageTrace};
