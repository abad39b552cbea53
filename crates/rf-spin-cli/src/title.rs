//! Title that logs every hook and otherwise behaves like the stock one

use rf_spin::hooks::base;
use rf_spin::{HookContext, HookFlow, Mutation, PresentationHooks};

pub struct LoggingTitle {
    name: String,
}

impl LoggingTitle {
    pub fn new(name: &str) -> Self {
        Self {
            name: format!("{name} (logging)"),
        }
    }
}

impl PresentationHooks for LoggingTitle {
    fn title(&self) -> &str {
        &self.name
    }

    fn prespin(&mut self, ctx: &mut HookContext<'_>) -> HookFlow {
        log::info!("prespin, {} stickies on the grid", ctx.grid.sticky_count());
        base::prespin(ctx)
    }

    fn handle_specific_reel_stop(&mut self, ctx: &mut HookContext<'_>, reel: usize) -> HookFlow {
        log::info!("reel {reel} stopped");
        base::handle_specific_reel_stop(ctx, reel)
    }

    fn play_mutations(&mut self, _ctx: &mut HookContext<'_>, mutation: &Mutation) -> HookFlow {
        log::info!("playing '{}' mutation", mutation.kind);
        HookFlow::Continue
    }

    fn play_bonus_acquired_effects(&mut self, ctx: &mut HookContext<'_>) -> HookFlow {
        log::info!("bonus acquired ({:?})", ctx.outcome().bonus_kind());
        base::play_bonus_acquired_effects(ctx)
    }

    fn start_next_reevaluation_spin(
        &mut self,
        _ctx: &mut HookContext<'_>,
        spins_remaining: u32,
    ) -> HookFlow {
        log::info!("respin, {spins_remaining} left after this one");
        HookFlow::Continue
    }

    fn handle_reevaluation_reel_stop(&mut self, ctx: &mut HookContext<'_>, reel: usize) -> HookFlow {
        log::info!("respin reel {reel} stopped");
        base::handle_specific_reel_stop(ctx, reel)
    }

    fn reels_stopped_callback(&mut self, ctx: &mut HookContext<'_>) -> HookFlow {
        log::info!("settling, payout {:.2}", ctx.outcome().total_credits());
        base::reels_stopped_callback(ctx)
    }
}
