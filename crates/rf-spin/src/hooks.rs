//! Presentation hooks — the seams where a title customises the lifecycle
//!
//! The controller calls each hook at a fixed lifecycle point. Every method
//! has a default; titles override what they need and call into [`base`]
//! when they want the stock behaviour as well.
//!
//! A hook returns a [`HookFlow`]: continue at once, suspend the lifecycle on
//! a [`Wait`], or play a [`Sequence`] inline before continuing. Work the
//! lifecycle must not wait for goes to `ctx.start_routine`.

use std::cell::Cell;
use std::rc::Rc;

use crate::audio::AudioSink;
use crate::config::SpinConfig;
use crate::grid::{GridError, ReelGrid};
use crate::mutation::MutationQueue;
use crate::outcome::{Mutation, Outcome};
use crate::pool::SessionContext;
use crate::reevaluation::ReevaluationChain;
use crate::schedule::{Routine, RoutineId, RoutineRunner, Sequence, Signals, Wait};
use crate::symbol::SymbolHandle;

/// What the lifecycle does after a hook returns
#[derive(Debug)]
pub enum HookFlow {
    Continue,
    Wait(Wait),
    Play(Sequence),
}

/// Completion signal of the settle step
///
/// Cloned handles share state; a title may keep one and complete it later
/// (after a win presentation, for example).
#[derive(Debug, Clone, Default)]
pub struct SettleHandle(Rc<Cell<Option<f64>>>);

impl SettleHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the payout as displayed
    pub fn complete(&self, credits: f64) {
        self.0.set(Some(credits));
    }

    pub fn is_complete(&self) -> bool {
        self.0.get().is_some()
    }

    pub fn credits(&self) -> Option<f64> {
        self.0.get()
    }
}

/// Everything a hook may touch
pub struct HookContext<'a> {
    pub grid: &'a mut ReelGrid,
    pub effects: &'a mut SessionContext,
    pub audio: &'a mut dyn AudioSink,
    pub signals: &'a mut Signals,
    pub routines: &'a mut RoutineRunner,
    pub(crate) outcome: &'a Outcome,
    pub(crate) mutations: &'a MutationQueue,
    pub(crate) chain: &'a ReevaluationChain,
    pub(crate) settle: &'a SettleHandle,
    pub(crate) config: &'a SpinConfig,
}

impl<'a> HookContext<'a> {
    pub fn outcome(&self) -> &Outcome {
        self.outcome
    }

    /// Read-only view of the mutation queue
    pub fn mutations(&self) -> &MutationQueue {
        self.mutations
    }

    pub fn chain(&self) -> &ReevaluationChain {
        self.chain
    }

    pub fn config(&self) -> &SpinConfig {
        self.config
    }

    pub fn slam_stop_requested(&self) -> bool {
        self.signals.slam_stop_requested()
    }

    /// Show the outcome's total payout and let the spin settle
    pub fn display_payout(&mut self) {
        let credits = self.outcome.total_credits();
        log::debug!("payout displayed: {credits:.2}");
        self.settle.complete(credits);
    }

    /// Handle for completing the settle step later
    pub fn settle_handle(&self) -> SettleHandle {
        self.settle.clone()
    }

    pub fn create_sticky_symbol(
        &mut self,
        name: &str,
        row: usize,
        reel: usize,
    ) -> Result<SymbolHandle, GridError> {
        self.grid.create_sticky_symbol(name, row, reel)
    }

    pub fn release_symbol_instance(&mut self, handle: SymbolHandle) -> Result<(), GridError> {
        self.grid.release_symbol_instance(handle)
    }

    /// Fire-and-forget work that outlives the hook
    pub fn start_routine(&mut self, routine: impl Routine + 'static) -> RoutineId {
        self.routines.start(Box::new(routine))
    }
}

/// Title customisation points, called in lifecycle order
pub trait PresentationHooks {
    /// Title name for logs
    fn title(&self) -> &str {
        "generic"
    }

    fn prespin(&mut self, ctx: &mut HookContext<'_>) -> HookFlow {
        base::prespin(ctx)
    }

    fn handle_specific_reel_stop(&mut self, ctx: &mut HookContext<'_>, reel: usize) -> HookFlow {
        base::handle_specific_reel_stop(ctx, reel)
    }

    /// Called once per mutation before its cells are played
    fn play_mutations(&mut self, _ctx: &mut HookContext<'_>, _mutation: &Mutation) -> HookFlow {
        HookFlow::Continue
    }

    fn play_bonus_acquired_effects(&mut self, ctx: &mut HookContext<'_>) -> HookFlow {
        base::play_bonus_acquired_effects(ctx)
    }

    /// Return [`Wait::Handoff`] to park until the bonus game hands back
    fn start_bonus_game(&mut self, _ctx: &mut HookContext<'_>) -> HookFlow {
        HookFlow::Continue
    }

    fn on_bonus_game_ended(&mut self, _ctx: &mut HookContext<'_>) -> HookFlow {
        HookFlow::Continue
    }

    fn start_next_reevaluation_spin(
        &mut self,
        _ctx: &mut HookContext<'_>,
        _spins_remaining: u32,
    ) -> HookFlow {
        HookFlow::Continue
    }

    fn handle_reevaluation_reel_stop(&mut self, ctx: &mut HookContext<'_>, reel: usize) -> HookFlow {
        base::handle_specific_reel_stop(ctx, reel)
    }

    /// Extra respins granted after this one
    fn on_reevaluation_spin_complete(&mut self, _ctx: &mut HookContext<'_>) -> u32 {
        0
    }

    /// Must reach `display_payout`, directly or through a settle handle
    fn reels_stopped_callback(&mut self, ctx: &mut HookContext<'_>) -> HookFlow {
        base::reels_stopped_callback(ctx)
    }
}

/// Stock behaviour with no title customisation
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl PresentationHooks for DefaultHooks {}

/// Stock hook behaviour, callable from overrides
pub mod base {
    use super::{HookContext, HookFlow};

    /// Drop stickies left by a previous chain
    pub fn prespin(ctx: &mut HookContext<'_>) -> HookFlow {
        if !ctx.chain.is_active() {
            let cleared = ctx.grid.clear_stickies();
            if cleared > 0 {
                log::debug!("prespin cleared {cleared} sticky symbols");
            }
        }
        HookFlow::Continue
    }

    /// Play the reel's stop sound, or the title-wide one
    pub fn handle_specific_reel_stop(ctx: &mut HookContext<'_>, reel: usize) -> HookFlow {
        let sound = ctx
            .grid
            .reel(reel)
            .ok()
            .and_then(|r| r.stop_sound())
            .unwrap_or(ctx.config.audio.reel_stop.as_str())
            .to_string();
        ctx.audio.play(&sound);
        HookFlow::Continue
    }

    pub fn play_bonus_acquired_effects(ctx: &mut HookContext<'_>) -> HookFlow {
        ctx.audio.play(&ctx.config.audio.bonus_acquired);
        HookFlow::Continue
    }

    pub fn reels_stopped_callback(ctx: &mut HookContext<'_>) -> HookFlow {
        ctx.display_payout();
        HookFlow::Continue
    }
}
