//! # rf-stage — Spin Lifecycle Stage Vocabulary
//!
//! Defines the lifecycle states, presentation hook identifiers and the
//! recorded trace that every slot title shares.
//!
//! ## Philosophy
//!
//! All titles, regardless of skin, pass through the same lifecycle:
//! - Pre-spin → Reels stop → Mutations → Bonus → Reevaluation → Settled
//!
//! This crate names those phases and records what the controller did in them.

pub mod event;
pub mod stage;
pub mod taxonomy;
pub mod trace;

pub use event::*;
pub use stage::*;
pub use taxonomy::*;
pub use trace::*;
