//! Cooperative scheduling
//!
//! Everything runs on one thread and advances only when `tick(dt_ms)` is
//! called. Work that has to wait returns a [`Wait`]; the caller keeps the
//! resulting [`Suspension`] and polls it on later ticks.
//!
//! ```text
//! ┌────────────┐  tick(dt)  ┌───────────────┐  resume  ┌──────────┐
//! │  Runtime   │ ─────────▶ │ RoutineRunner │ ───────▶ │ Routine  │
//! │ (signals,  │            └───────────────┘          └────┬─────┘
//! │  audio)    │                                           │ Suspend(Wait)
//! └────────────┘ ◀──────────── Suspension::advance ◀───────┘
//! ```

mod routine;
mod runtime;
mod wait;

pub use routine::{Routine, RoutineEnv, RoutineId, RoutineRunner, RoutineStep, Sequence};
pub use runtime::Runtime;
pub use wait::{HANDOFF_FLAG, Signals, Suspension, Wait, WaitPolicy, WaitStatus};

pub(crate) use routine::{Drive, MAX_STEPS_PER_TICK, drive};
pub(crate) use runtime::RuntimeParts;
