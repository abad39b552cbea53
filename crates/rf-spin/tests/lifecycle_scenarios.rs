//! Lifecycle scenarios for rf-spin
//!
//! Drives whole spins through the controller and checks the recorded trace:
//! - Mutation placement and ordering
//! - Bonus handoff and return
//! - Reevaluation chains, stickies and music switching
//! - Slam stop, watchdog and guarded waits
//! - Effect pool reuse across spins and sessions

use std::cell::RefCell;
use std::rc::Rc;

use rf_spin::schedule::HANDOFF_FLAG;
use rf_spin::{
    AudioLog, CellPos, DefaultHooks, GridSpec, HookContext, HookFlow, HookKind, LifecycleState,
    Mutation, MutationStyle, Outcome, PresentationHooks, Reevaluation, Runtime, Sequence,
    SessionContext, SessionId, SpinConfig, SpinError, SpinLifecycleController, SpinStatus,
    SpinSummary, Stage, TimingConfig,
};
use serde_json::json;

const FRAME_MS: f64 = 16.0;

// ═══════════════════════════════════════════════════════════════════════════════
// FIXTURES
// ═══════════════════════════════════════════════════════════════════════════════

fn config(reels: u8, rows: u8) -> SpinConfig {
    SpinConfig::new("scenario", GridSpec::new(reels, rows)).with_style(
        "standard",
        MutationStyle {
            effect: Some("burst".into()),
            cue: Some("wild_land".into()),
            ..MutationStyle::default()
        },
    )
}

fn controller(config: SpinConfig, hooks: Box<dyn PresentationHooks>) -> SpinLifecycleController {
    let session = SessionContext::with_kinds(SessionId::BASE, ["burst", "trail"]);
    SpinLifecycleController::new(config, hooks, session).unwrap()
}

fn outcome(value: serde_json::Value) -> Outcome {
    Outcome::from_json(&value.to_string()).unwrap()
}

fn respin_outcome() -> Outcome {
    outcome(json!({
        "subOutcomes": [{ "winId": 1, "credits": 40.0, "symbolMatchCount": 3 }],
        "reevaluations": [
            {
                "reevaluatedMatrix": [["A", "B", "C"], ["D", "CO", "F"], ["G", "H", "I"]],
                "stickySymbols": [{ "reel": 1, "position": 1, "name": "CO" }]
            },
            {
                "reevaluatedMatrix": [["CO", "B", "C"], ["D", "CO", "F"], ["G", "H", "I"]],
                "stickySymbols": [{ "reel": 0, "position": 0, "name": "CO" }]
            },
            {
                "reevaluatedMatrix": [["CO", "B", "C"], ["D", "CO", "F"], ["G", "H", "I"]],
                "mutations": [{ "triggerSymbolNames": [["", "", ""], ["", "", ""], ["", "", "TW"]] }]
            }
        ]
    }))
}

fn settle(ctrl: &mut SpinLifecycleController, rt: &mut Runtime) -> SpinSummary {
    ctrl.run_to_settle(rt, FRAME_MS).unwrap()
}

/// Records the hooks a title saw, and delegates everything to the base
#[derive(Default)]
struct Recorder {
    calls: Rc<RefCell<Vec<String>>>,
}

impl Recorder {
    fn note(&self, call: impl Into<String>) {
        self.calls.borrow_mut().push(call.into());
    }
}

impl PresentationHooks for Recorder {
    fn title(&self) -> &str {
        "recorder"
    }

    fn prespin(&mut self, ctx: &mut HookContext<'_>) -> HookFlow {
        self.note("prespin");
        rf_spin::hooks::base::prespin(ctx)
    }

    fn play_bonus_acquired_effects(&mut self, ctx: &mut HookContext<'_>) -> HookFlow {
        self.note("bonus_acquired");
        rf_spin::hooks::base::play_bonus_acquired_effects(ctx)
    }

    fn start_bonus_game(&mut self, _ctx: &mut HookContext<'_>) -> HookFlow {
        self.note("start_bonus_game");
        HookFlow::Continue
    }

    fn start_next_reevaluation_spin(
        &mut self,
        _ctx: &mut HookContext<'_>,
        spins_remaining: u32,
    ) -> HookFlow {
        self.note(format!("respin {spins_remaining}"));
        HookFlow::Continue
    }

    fn reels_stopped_callback(&mut self, ctx: &mut HookContext<'_>) -> HookFlow {
        self.note("settle");
        rf_spin::hooks::base::reels_stopped_callback(ctx)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MUTATIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_single_cell_mutation_on_2x2() {
    let mut rt = Runtime::silent();
    let mut ctrl = controller(config(2, 2), Box::new(DefaultHooks));
    ctrl.request_spin(outcome(json!({
        "mutations": [{ "triggerSymbolNames": [["", "TW"], ["", ""]] }]
    })))
    .unwrap();

    let summary = settle(&mut ctrl, &mut rt);
    assert_eq!(summary.mutated_cells, 1);
    assert_eq!(
        ctrl.trace().mutated_cells(),
        vec![(CellPos::new(0, 1), "TW".to_string())]
    );
    assert_eq!(
        ctrl.grid().snapshot(),
        vec![vec!["BL", "TW"], vec!["BL", "BL"]]
    );
}

#[test]
fn test_mutation_visits_cells_reel_major() {
    let mut rt = Runtime::silent();
    let mut ctrl = controller(config(3, 3), Box::new(DefaultHooks));
    ctrl.request_spin(Outcome::default().with_mutation(Mutation::standard(&[
        &["WD", "", "WD"],
        &["", "WD", ""],
        &["WD", "WD", "WD"],
    ])))
    .unwrap();
    settle(&mut ctrl, &mut rt);

    let visited: Vec<CellPos> = ctrl.trace().mutated_cells().into_iter().map(|(c, _)| c).collect();
    assert_eq!(
        visited,
        vec![
            CellPos::new(0, 0),
            CellPos::new(0, 2),
            CellPos::new(1, 1),
            CellPos::new(2, 0),
            CellPos::new(2, 1),
            CellPos::new(2, 2),
        ]
    );
}

#[test]
fn test_effects_are_reused_across_spins() {
    let mut rt = Runtime::silent();
    let mut ctrl = controller(config(3, 3), Box::new(DefaultHooks));
    let mutated = Outcome::default().with_mutation(Mutation::standard(&[
        &["TW", "TW", ""],
        &["", "", ""],
        &["", "TW", "TW"],
    ]));

    for _ in 0..3 {
        ctrl.request_spin(mutated.clone()).unwrap();
        settle(&mut ctrl, &mut rt);
    }

    let pool = ctrl.session().pool("burst").unwrap();
    assert_eq!(pool.constructed(), 1);
    assert_eq!(pool.in_use(), 0);
    assert!(pool.is_consistent());
}

#[test]
fn test_missing_effect_template_still_mutates() {
    let mut rt = Runtime::silent();
    let config = config(2, 2).with_style(
        "standard",
        MutationStyle {
            effect: Some("unregistered".into()),
            ..MutationStyle::default()
        },
    );
    let mut ctrl = controller(config, Box::new(DefaultHooks));
    ctrl.request_spin(Outcome::default().with_mutation(Mutation::standard(&[
        &["TW", ""],
        &["", "TW"],
    ])))
    .unwrap();

    let summary = settle(&mut ctrl, &mut rt);
    assert_eq!(summary.mutated_cells, 2);
    assert_eq!(ctrl.trace().events_by_type("effect_skipped").len(), 2);
}

#[test]
fn test_malformed_mutation_is_abandoned() {
    let mut rt = Runtime::silent();
    let mut ctrl = controller(config(2, 2), Box::new(DefaultHooks));
    ctrl.request_spin(outcome(json!({
        "mutations": [
            { "triggerSymbolNames": null },
            { "triggerSymbolNames": [["TW"]] },
            { "triggerSymbolNames": [["", ""], ["WD", ""]] }
        ]
    })))
    .unwrap();

    let summary = settle(&mut ctrl, &mut rt);
    assert_eq!(ctrl.trace().events_by_type("mutation_rejected").len(), 2);
    assert_eq!(ctrl.mutations().rejected_count(), 2);
    assert_eq!(ctrl.mutations().applied_count(), 1);
    assert_eq!(summary.mutated_cells, 1);
    assert!(ctrl.trace().validate().is_valid());
}

#[test]
fn test_relocation_lands_source_symbol() {
    let mut rt = Runtime::silent();
    let config = config(3, 3).with_style(
        "relocation",
        MutationStyle {
            relocation_effect: Some("trail".into()),
            ..MutationStyle::default()
        },
    );
    let mut ctrl = controller(config, Box::new(DefaultHooks));
    let mut spin = Outcome::default()
        .with_mutation(Mutation::standard(&[&["", "", ""], &["", "", ""], &["", "", ""]]).with_relocation((0, 0), (2, 1)));
    spin.reel_matrix = Some(vec![
        vec!["WD".into(), "A".into(), "B".into()],
        vec!["C".into(), "D".into(), "E".into()],
        vec!["F".into(), "G".into(), "H".into()],
    ]);
    ctrl.request_spin(spin).unwrap();
    settle(&mut ctrl, &mut rt);

    let relocated = ctrl.trace().events.iter().find_map(|e| match &e.stage {
        Stage::SymbolMutated {
            cell,
            from,
            to,
            relocated_from,
        } => Some((*cell, from.clone(), to.clone(), *relocated_from)),
        _ => None,
    });
    assert_eq!(
        relocated,
        Some((
            CellPos::new(2, 1),
            "G".to_string(),
            "WD".to_string(),
            Some(CellPos::new(0, 0))
        ))
    );
    assert!(ctrl.grid().reel(2).unwrap().is_stopped());
    assert_eq!(ctrl.session().pool("trail").unwrap().in_use(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════════
// BONUS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_gifting_bonus_path() {
    let audio = AudioLog::new();
    let mut rt = Runtime::new(Box::new(audio.clone()));
    let recorder = Recorder::default();
    let calls = recorder.calls.clone();
    let mut ctrl = controller(config(5, 3), Box::new(recorder));
    ctrl.request_spin(outcome(json!({ "isBonus": true, "isGifting": true })))
        .unwrap();
    settle(&mut ctrl, &mut rt);

    assert_eq!(
        ctrl.trace().states(),
        vec![
            LifecycleState::PreSpin,
            LifecycleState::Spinning,
            LifecycleState::ReelStopping,
            LifecycleState::BonusTransition,
            LifecycleState::Settled,
        ]
    );
    assert_eq!(
        *calls.borrow(),
        vec!["prespin", "bonus_acquired", "start_bonus_game", "settle"]
    );
    assert_eq!(ctrl.trace().hook_count(HookKind::PlayBonusAcquiredEffects), 1);
    assert!(audio.played().contains(&"bonus_acquired".to_string()));
}

/// Hands off to an external bonus game and waits for it
struct ExternalBonus;

impl PresentationHooks for ExternalBonus {
    fn start_bonus_game(&mut self, _ctx: &mut HookContext<'_>) -> HookFlow {
        HookFlow::Wait(rf_spin::Wait::Handoff)
    }
}

#[test]
fn test_bonus_handoff_outlasts_watchdog() {
    let mut timing = TimingConfig::turbo();
    timing.watchdog_ms = 3_000.0;
    let mut rt = Runtime::silent();
    let mut ctrl = controller(config(5, 3).with_timing(timing), Box::new(ExternalBonus));
    ctrl.request_spin(Outcome {
        is_bonus: true,
        ..Outcome::default()
    })
    .unwrap();

    let mut parked_ticks = 0;
    for _ in 0..2_000 {
        rt.tick(FRAME_MS);
        ctrl.tick(&mut rt, FRAME_MS).unwrap();
        if ctrl.waiting_on().as_deref() == Some("bonus handoff") {
            parked_ticks += 1;
        }
    }
    assert!(parked_ticks as f64 * FRAME_MS > 3_000.0);
    assert_eq!(ctrl.state(), LifecycleState::BonusTransition);

    // The bonus session borrows the pools, then hands them back
    let bonus = ctrl.take_session(SessionId(2)).unwrap();
    assert_eq!(bonus.id(), SessionId(2));
    ctrl.adopt_session(bonus);
    ctrl.finish_bonus_game(&mut rt);

    settle(&mut ctrl, &mut rt);
    assert_eq!(ctrl.session().pool("burst").unwrap().owner(), SessionId::BASE);
    assert!(!rt.signals().flag(HANDOFF_FLAG));
}

// ═══════════════════════════════════════════════════════════════════════════════
// REEVALUATION
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_three_respins_switch_music_once_each_way() {
    let audio = AudioLog::new();
    let mut rt = Runtime::new(Box::new(audio.clone()));
    let mut ctrl = controller(config(3, 3), Box::new(DefaultHooks));
    ctrl.request_spin(respin_outcome()).unwrap();

    let summary = settle(&mut ctrl, &mut rt);
    assert_eq!(summary.reevaluation_spins, 3);
    assert_eq!(summary.payout, 40.0);
    assert_eq!(ctrl.trace().state_entries(LifecycleState::ReelStopping), 4);
    assert_eq!(ctrl.trace().state_entries(LifecycleState::Reevaluating), 3);
    assert_eq!(audio.music_switches(), vec!["feature", "base_game"]);
    assert_eq!(ctrl.trace().music_switches(), vec!["feature", "base_game"]);
    assert_eq!(ctrl.trace().hook_count(HookKind::HandleReevaluationReelStop), 9);

    let last = ctrl.trace().states().last().copied();
    assert_eq!(last, Some(LifecycleState::Settled));
}

#[test]
fn test_respins_lock_stickies_until_next_spin() {
    let mut rt = Runtime::silent();
    let mut ctrl = controller(config(3, 3), Box::new(DefaultHooks));
    ctrl.request_spin(respin_outcome()).unwrap();
    settle(&mut ctrl, &mut rt);

    assert_eq!(ctrl.trace().events_by_type("sticky_locked").len(), 2);
    assert_eq!(ctrl.grid().sticky_count(), 2);
    assert_eq!(ctrl.grid().symbol_at(2, 2).unwrap().name(), "TW");

    ctrl.request_spin(Outcome::default()).unwrap();
    settle(&mut ctrl, &mut rt);
    assert_eq!(ctrl.grid().sticky_count(), 0);
}

/// Grants one extra respin the first time a respin completes
#[derive(Default)]
struct Extender {
    granted: bool,
}

impl PresentationHooks for Extender {
    fn on_reevaluation_spin_complete(&mut self, _ctx: &mut HookContext<'_>) -> u32 {
        if self.granted {
            0
        } else {
            self.granted = true;
            1
        }
    }
}

#[test]
fn test_completion_hook_extends_chain() {
    let mut rt = Runtime::silent();
    let mut ctrl = controller(config(3, 3), Box::new(Extender::default()));
    ctrl.request_spin(respin_outcome()).unwrap();

    let summary = settle(&mut ctrl, &mut rt);
    assert_eq!(summary.reevaluation_spins, 4);
    assert_eq!(ctrl.trace().state_entries(LifecycleState::ReelStopping), 5);
    assert!(!ctrl.chain().is_active());
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPLETENESS AND SLAM STOP
// ═══════════════════════════════════════════════════════════════════════════════

fn every_branch() -> Vec<Outcome> {
    let mutation = Mutation::standard(&[&["", "TW", ""], &["", "", ""], &["WD", "", ""]]);
    let mut all = respin_outcome().with_mutation(mutation.clone());
    all.is_bonus = true;
    vec![
        Outcome::default(),
        Outcome::default().with_mutation(mutation),
        Outcome {
            is_bonus: true,
            is_challenge: true,
            ..Outcome::default()
        },
        respin_outcome(),
        all,
    ]
}

#[test]
fn test_every_branch_settles_exactly_once() {
    for spin in every_branch() {
        let mut rt = Runtime::silent();
        let mut ctrl = controller(config(3, 3), Box::new(DefaultHooks));
        ctrl.request_spin(spin).unwrap();
        settle(&mut ctrl, &mut rt);

        let trace = ctrl.trace();
        assert!(trace.validate().is_valid(), "{:?}", trace.validate().warnings());
        assert_eq!(
            trace.hooks().last().map(|(hook, _)| *hook),
            Some(HookKind::ReelsStoppedCallback)
        );
    }
}

#[test]
fn test_slam_stop_at_any_point_keeps_hook_order() {
    for spin in every_branch() {
        let mut rt = Runtime::silent();
        let mut reference = controller(config(3, 3), Box::new(DefaultHooks));
        reference.request_spin(spin.clone()).unwrap();
        let full = settle(&mut reference, &mut rt);
        let total_ticks = full.ticks;

        for slam_at in [0, 1, total_ticks / 4, total_ticks / 2, total_ticks - 2] {
            let mut rt = Runtime::silent();
            let mut ctrl = controller(config(3, 3), Box::new(DefaultHooks));
            ctrl.request_spin(spin.clone()).unwrap();

            let mut summary = None;
            for tick in 0..total_ticks * 2 {
                rt.tick(FRAME_MS);
                if tick == slam_at {
                    ctrl.slam_stop(&mut rt);
                }
                if let SpinStatus::Settled(s) = ctrl.tick(&mut rt, FRAME_MS).unwrap() {
                    summary = Some(s);
                    break;
                }
            }

            let summary = summary.expect("slammed spin settles");
            assert!(summary.elapsed_ms <= full.elapsed_ms);
            assert_eq!(ctrl.trace().hooks(), reference.trace().hooks());
            assert_eq!(ctrl.trace().states(), reference.trace().states());
            assert_eq!(ctrl.trace().settle_count(), 1);
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WAITS, WATCHDOG AND ROUTINES
// ═══════════════════════════════════════════════════════════════════════════════

/// Overrides the settle hook and forgets to display the payout
struct BrokenSettle;

impl PresentationHooks for BrokenSettle {
    fn reels_stopped_callback(&mut self, _ctx: &mut HookContext<'_>) -> HookFlow {
        HookFlow::Continue
    }
}

#[test]
fn test_watchdog_catches_broken_settle_override() {
    let mut timing = TimingConfig::turbo();
    timing.watchdog_ms = 5_000.0;
    let mut rt = Runtime::silent();
    let mut ctrl = controller(config(5, 3).with_timing(timing), Box::new(BrokenSettle));
    ctrl.request_spin(Outcome::default().with_win(1, 3.0)).unwrap();

    match ctrl.run_to_settle(&mut rt, FRAME_MS) {
        Err(SpinError::SettleTimeout { elapsed_ms, .. }) => assert!(elapsed_ms > 5_000.0),
        other => panic!("expected settle timeout, got {other:?}"),
    }
    assert_eq!(ctrl.trace().settle_count(), 0);
}

#[test]
fn test_long_respin_chain_settles_under_normal_timing() {
    let mut rt = Runtime::silent();
    let mut ctrl = controller(
        config(5, 3).with_timing(TimingConfig::normal()),
        Box::new(DefaultHooks),
    );
    let chain = (0..50).fold(Outcome::default().with_win(1, 10.0), |outcome, _| {
        outcome.with_reevaluation(Reevaluation::default())
    });
    ctrl.request_spin(chain).unwrap();

    let summary = settle(&mut ctrl, &mut rt);
    assert_eq!(summary.reevaluation_spins, 50);
    // The whole chain outlasts the watchdog; no single stretch of it does
    assert!(summary.elapsed_ms > ctrl.config().timing.watchdog_ms);
    assert_eq!(ctrl.trace().settle_count(), 1);
}

#[test]
fn test_watchdog_measures_stall_not_total_time() {
    let mut timing = TimingConfig::turbo();
    timing.watchdog_ms = 5_000.0;
    let mut rt = Runtime::silent();
    let chain = (0..20).fold(Outcome::default().with_win(1, 3.0), |outcome, _| {
        outcome.with_reevaluation(Reevaluation::default())
    });
    let mut ctrl = controller(config(5, 3).with_timing(timing), Box::new(BrokenSettle));
    ctrl.request_spin(chain).unwrap();

    match ctrl.run_to_settle(&mut rt, FRAME_MS) {
        Err(SpinError::SettleTimeout { elapsed_ms, .. }) => {
            assert!(elapsed_ms > 5_000.0);
            assert!(elapsed_ms < 5_000.0 + 2.0 * FRAME_MS);
        }
        other => panic!("expected settle timeout, got {other:?}"),
    }
    // The chain itself ran past the watchdog before the settle stalled
    let last = ctrl.trace().events.last().map_or(0.0, |e| e.timestamp_ms);
    assert!(last > 5_000.0);
    assert_eq!(ctrl.trace().settle_count(), 0);
}

/// Holds the settle until a win presentation finishes
struct DelayedPayout;

impl PresentationHooks for DelayedPayout {
    fn reels_stopped_callback(&mut self, ctx: &mut HookContext<'_>) -> HookFlow {
        let settle = ctx.settle_handle();
        let credits = ctx.outcome().total_credits();
        HookFlow::Play(
            Sequence::new("win_presentation")
                .play("big_win")
                .wait_ms(1_500.0)
                .then(move |_| settle.complete(credits)),
        )
    }
}

#[test]
fn test_settle_waits_for_win_presentation() {
    let audio = AudioLog::new();
    let mut rt = Runtime::new(Box::new(audio.clone()));
    let mut ctrl = controller(config(5, 3), Box::new(DelayedPayout));
    ctrl.request_spin(Outcome::default().with_win(1, 250.0)).unwrap();

    let summary = settle(&mut ctrl, &mut rt);
    assert_eq!(summary.payout, 250.0);
    assert!(summary.elapsed_ms >= ctrl.config().timing.total_spin_duration(5) + 1_500.0);
    assert!(audio.played().contains(&"big_win".to_string()));
}

#[test]
fn test_reel_landing_wait_gives_up_after_guard() {
    let mut config = config(3, 3);
    config.await_reel_landing = true;
    let mut rt = Runtime::silent();
    let mut ctrl = controller(config, Box::new(DefaultHooks));
    ctrl.request_spin(Outcome::default()).unwrap();

    settle(&mut ctrl, &mut rt);
    assert_eq!(ctrl.trace().events_by_type("wait_timed_out").len(), 3);
}

#[test]
fn test_reel_landing_flags_release_stops() {
    let mut config = config(3, 3);
    config.await_reel_landing = true;
    let mut rt = Runtime::silent();
    for reel in 0..3 {
        rt.signals_mut()
            .set_flag(rf_spin::Signals::reel_landed_key(reel), true);
    }
    let mut ctrl = controller(config, Box::new(DefaultHooks));
    ctrl.request_spin(Outcome::default()).unwrap();

    settle(&mut ctrl, &mut rt);
    assert!(!ctrl.trace().has_stage("wait_timed_out"));
}

/// Starts cleanup work the lifecycle does not wait for
struct Cleanup;

impl PresentationHooks for Cleanup {
    fn prespin(&mut self, ctx: &mut HookContext<'_>) -> HookFlow {
        ctx.start_routine(
            Sequence::new("cleanup")
                .wait_ms(5_000.0)
                .set_flag("cleanup.done", true),
        );
        HookFlow::Continue
    }
}

#[test]
fn test_routine_outlives_session_shutdown() {
    let mut rt = Runtime::silent();
    let mut ctrl = controller(config(3, 3), Box::new(Cleanup));
    ctrl.request_spin(Outcome::default()).unwrap();
    for _ in 0..10 {
        rt.tick(FRAME_MS);
        ctrl.tick(&mut rt, FRAME_MS).unwrap();
    }

    ctrl.shutdown(&mut rt);
    assert_eq!(ctrl.tick(&mut rt, FRAME_MS).unwrap(), SpinStatus::Idle);
    assert_eq!(rt.routines().active_count(), 1);

    for _ in 0..400 {
        rt.tick(FRAME_MS);
    }
    assert!(rt.signals().flag("cleanup.done"));
    assert_eq!(rt.routines().active_count(), 0);
}
