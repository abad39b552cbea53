//! SpinLifecycleController — one spin from request to settle
//!
//! The controller owns the grid, the session's effect pools, the mutation
//! queue and the reevaluation chain, and drives them through a fixed phase
//! program. Titles customise it only through [`PresentationHooks`].
//!
//! ```text
//! Idle → PreSpin → Spinning → ReelStopping ─┬─────────────────────────┐
//!                                           ├→ MutationPlayback ──────┤
//!                                           ├→ BonusTransition ───────┤
//!                                           └→ Reevaluating ⟲ ────────┴→ Settled → Idle
//! ```
//!
//! The three middle branches run in that order and never overlap. Every
//! wait is a suspension polled by [`SpinLifecycleController::tick`].

use rf_stage::{CellPos, HookKind, LifecycleState, Stage, StageEvent, StageTrace};
use serde::Serialize;

use crate::config::SpinConfig;
use crate::error::{Result, SpinError};
use crate::grid::ReelGrid;
use crate::hooks::{HookContext, HookFlow, PresentationHooks, SettleHandle};
use crate::mutation::{MutationPlan, MutationPlayback, MutationQueue, PlaybackEnv};
use crate::outcome::Outcome;
use crate::pool::{SessionContext, SessionId};
use crate::reevaluation::ReevaluationChain;
use crate::schedule::{
    Drive, HANDOFF_FLAG, MAX_STEPS_PER_TICK, Routine, RoutineEnv, RoutineStep, Runtime, Sequence,
    Signals, Suspension, Wait, WaitPolicy, WaitStatus, drive,
};

/// Result of one controller tick
#[derive(Debug, Clone, PartialEq)]
pub enum SpinStatus {
    Idle,
    Running(LifecycleState),
    /// Returned exactly once per spin
    Settled(SpinSummary),
}

/// What a settled spin amounted to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpinSummary {
    pub spin_id: u64,
    pub payout: f64,
    pub elapsed_ms: f64,
    pub ticks: u64,
    pub mutated_cells: usize,
    pub reevaluation_spins: u32,
    pub slam_stopped: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    PreSpin,
    SpinUp,
    StopReel { order: usize, reevaluation: bool },
    ReelLanded { order: usize, reevaluation: bool },
    ReelInterval { next: usize, reevaluation: bool },
    Mutations { reevaluation: bool },
    BonusAcquired,
    BonusAnimation,
    BonusHandoff,
    BonusReturn,
    ChainBegin,
    ChainSpin,
    ChainSpinUp,
    ChainSpinComplete,
    Settle,
    AwaitPayout,
}

enum Blocker {
    Wait(Suspension),
    Script {
        sequence: Sequence,
        suspension: Option<Suspension>,
    },
}

enum Flow {
    Next,
    Block(Blocker),
    Settled(SpinSummary),
}

impl From<HookFlow> for Flow {
    fn from(flow: HookFlow) -> Self {
        match flow {
            HookFlow::Continue => Flow::Next,
            HookFlow::Wait(wait) => Flow::Block(Blocker::Wait(Suspension::new(wait))),
            HookFlow::Play(sequence) => Flow::Block(Blocker::Script {
                sequence,
                suspension: None,
            }),
        }
    }
}

/// Drives spins for one session
pub struct SpinLifecycleController {
    config: SpinConfig,
    stop_order: Vec<usize>,
    hooks: Box<dyn PresentationHooks>,
    grid: ReelGrid,
    session: SessionContext,
    queue: MutationQueue,
    chain: ReevaluationChain,
    outcome: Outcome,
    settle: SettleHandle,

    state: LifecycleState,
    phase: Phase,
    blocker: Option<Blocker>,
    playback: Option<MutationPlayback>,
    reevaluation_index: Option<usize>,
    feature_music: bool,

    trace: StageTrace,
    spin_count: u64,
    clock_ms: f64,
    watchdog_ms: f64,
    ticks: u64,
    mutated_cells: usize,
    respins_played: u32,
    slammed: bool,
}

impl SpinLifecycleController {
    pub fn new(
        config: SpinConfig,
        hooks: Box<dyn PresentationHooks>,
        session: SessionContext,
    ) -> Result<Self> {
        config.validate()?;
        let grid = ReelGrid::new(&config);
        let stop_order = config.stop_order();
        let trace = StageTrace::new(format!("{}-0", config.game_id), config.game_id.clone());
        log::info!(
            "{}: controller ready ({}x{}, title '{}', {})",
            config.game_id,
            config.grid.reels,
            config.grid.rows,
            hooks.title(),
            session.id()
        );

        Ok(Self {
            config,
            stop_order,
            hooks,
            grid,
            session,
            queue: MutationQueue::new(),
            chain: ReevaluationChain::new(),
            outcome: Outcome::default(),
            settle: SettleHandle::new(),
            state: LifecycleState::Idle,
            phase: Phase::Idle,
            blocker: None,
            playback: None,
            reevaluation_index: None,
            feature_music: false,
            trace,
            spin_count: 0,
            clock_ms: 0.0,
            watchdog_ms: 0.0,
            ticks: 0,
            mutated_cells: 0,
            respins_played: 0,
            slammed: false,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ACCESSORS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_spinning(&self) -> bool {
        self.phase != Phase::Idle
    }

    pub fn config(&self) -> &SpinConfig {
        &self.config
    }

    pub fn grid(&self) -> &ReelGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut ReelGrid {
        &mut self.grid
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn mutations(&self) -> &MutationQueue {
        &self.queue
    }

    pub fn chain(&self) -> &ReevaluationChain {
        &self.chain
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// Trace of the current (or last) spin
    pub fn trace(&self) -> &StageTrace {
        &self.trace
    }

    pub fn spin_count(&self) -> u64 {
        self.spin_count
    }

    /// What the lifecycle is currently suspended on
    pub fn waiting_on(&self) -> Option<String> {
        match &self.blocker {
            Some(Blocker::Wait(s)) => Some(s.wait().describe()),
            Some(Blocker::Script {
                suspension: Some(s),
                ..
            }) => Some(s.wait().describe()),
            Some(Blocker::Script { sequence, .. }) => Some(format!("routine {}", sequence.name())),
            None => None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // COMMANDS
    // ═══════════════════════════════════════════════════════════════════════

    /// Accept a new spin; the lifecycle starts on the next tick
    pub fn request_spin(&mut self, outcome: Outcome) -> Result<u64> {
        if self.state.is_busy() || self.queue.is_active() || self.chain.is_active() {
            return Err(SpinError::SpinInProgress { state: self.state });
        }

        self.spin_count += 1;
        let spin_id = self.spin_count;
        self.trace = StageTrace::new(
            format!("{}-{}", self.config.game_id, spin_id),
            self.config.game_id.clone(),
        )
        .with_spin(spin_id);

        self.queue.clear();
        self.queue.load(&outcome.mutations);
        self.outcome = outcome;
        self.settle = SettleHandle::new();
        self.blocker = None;
        self.playback = None;
        self.reevaluation_index = None;
        self.clock_ms = 0.0;
        self.watchdog_ms = 0.0;
        self.ticks = 0;
        self.mutated_cells = 0;
        self.respins_played = 0;
        self.slammed = false;

        log::info!(
            "{}: spin {} requested ({} mutations, {} reevaluations, bonus: {})",
            self.config.game_id,
            spin_id,
            self.outcome.mutations.len(),
            self.outcome.reevaluations.len(),
            self.outcome.is_bonus
        );
        self.record(Stage::SpinRequested { spin_id });
        self.enter(LifecycleState::PreSpin);
        self.phase = Phase::PreSpin;
        Ok(spin_id)
    }

    /// Shorten the remaining timed waits; hooks and states still all run
    pub fn slam_stop(&mut self, rt: &mut Runtime) -> bool {
        if !self.state.is_busy() {
            return false;
        }
        rt.signals_mut().request_slam_stop();
        if !self.slammed {
            self.slammed = true;
            log::debug!("{}: slam stop in {}", self.config.game_id, self.state);
            self.record(Stage::SlamStop);
        }
        true
    }

    /// The bonus game has handed control back
    pub fn finish_bonus_game(&mut self, rt: &mut Runtime) {
        rt.signals_mut().set_flag(HANDOFF_FLAG, true);
    }

    /// Advance the lifecycle by one tick
    ///
    /// The watchdog measures time since the phase program last moved on, so
    /// long chains never trip it; only a spin stuck in one place does.
    pub fn tick(&mut self, rt: &mut Runtime, dt_ms: f64) -> Result<SpinStatus> {
        if self.phase == Phase::Idle {
            return Ok(SpinStatus::Idle);
        }

        let dt_ms = dt_ms.max(0.0);
        self.ticks += 1;
        self.clock_ms += dt_ms;
        if !self.is_parked() {
            self.watchdog_ms += dt_ms;
        }
        if self.watchdog_ms > self.config.timing.watchdog_ms {
            log::error!(
                "{}: spin {} made no progress for {:.0}ms (stuck in {}, waiting on {})",
                self.config.game_id,
                self.spin_count,
                self.config.timing.watchdog_ms,
                self.state,
                self.waiting_on().unwrap_or_else(|| "nothing".into())
            );
            return Err(SpinError::SettleTimeout {
                state: self.state,
                elapsed_ms: self.watchdog_ms,
            });
        }

        if let Some(mut blocker) = self.blocker.take() {
            if !self.poll_blocker(&mut blocker, rt, dt_ms, false) {
                self.blocker = Some(blocker);
                return Ok(SpinStatus::Running(self.state));
            }
        }

        for _ in 0..MAX_STEPS_PER_TICK {
            let phase = self.phase;
            let flow = self.step(rt)?;
            if self.phase != phase {
                self.watchdog_ms = 0.0;
            }
            match flow {
                Flow::Next => {}
                Flow::Block(mut blocker) => {
                    if !self.poll_blocker(&mut blocker, rt, 0.0, true) {
                        self.blocker = Some(blocker);
                        return Ok(SpinStatus::Running(self.state));
                    }
                }
                Flow::Settled(summary) => return Ok(SpinStatus::Settled(summary)),
            }
        }
        Ok(SpinStatus::Running(self.state))
    }

    /// Tick the runtime and the controller until the spin settles
    pub fn run_to_settle(&mut self, rt: &mut Runtime, dt_ms: f64) -> Result<SpinSummary> {
        if !(dt_ms > 0.0) {
            return Err(SpinError::InvalidTick(dt_ms));
        }
        loop {
            rt.tick(dt_ms);
            match self.tick(rt, dt_ms)? {
                SpinStatus::Settled(summary) => return Ok(summary),
                SpinStatus::Idle => return Err(SpinError::NotSpinning),
                SpinStatus::Running(_) => {}
            }
        }
    }

    /// Hand the effect pools to another session, keeping an empty set
    pub fn take_session(&mut self, to: SessionId) -> Result<SessionContext> {
        if self.playback.is_some() || self.session.in_use() > 0 {
            return Err(SpinError::EffectsInUse);
        }
        let own = self.session.id();
        let mut taken = std::mem::replace(&mut self.session, SessionContext::new(own));
        taken.transfer_to(to);
        Ok(taken)
    }

    /// Take pools back (or over) from another session
    pub fn adopt_session(&mut self, session: SessionContext) {
        self.session.absorb(session);
    }

    /// Tear the session down: abort playback, release leases, clear pools
    ///
    /// Routines in the runtime keep running. Returns the number of pooled
    /// instances dropped.
    pub fn shutdown(&mut self, rt: &mut Runtime) -> usize {
        if let Some(mut playback) = self.playback.take() {
            playback.abort(&mut self.grid, &mut self.session);
        }
        if self.feature_music {
            rt.audio_mut().switch_music_key(&self.config.audio.base_music);
            self.feature_music = false;
        }
        self.queue.clear();
        self.chain.finish();
        self.blocker = None;
        self.reevaluation_index = None;
        self.phase = Phase::Idle;
        self.state = LifecycleState::Idle;
        rt.signals_mut().clear_slam_stop();
        rt.signals_mut().clear_flag(HANDOFF_FLAG);

        let dropped = self.session.clear();
        log::info!(
            "{}: session {} shut down, {} pooled effects dropped",
            self.config.game_id,
            self.session.id(),
            dropped
        );
        dropped
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PHASE PROGRAM
    // ═══════════════════════════════════════════════════════════════════════

    fn step(&mut self, rt: &mut Runtime) -> Result<Flow> {
        let timing = &self.config.timing;
        match self.phase {
            Phase::Idle => Err(SpinError::NotSpinning),

            Phase::PreSpin => {
                self.phase = Phase::SpinUp;
                Ok(self.run_hook(rt, HookKind::PreSpin, None, |h, ctx| h.prespin(ctx)))
            }

            Phase::SpinUp => {
                let spin_ms = timing.reel_spin_duration_ms;
                self.enter(LifecycleState::Spinning);
                self.grid.begin_spin();
                rt.audio_mut().play(&self.config.audio.spin_start);
                self.phase = Phase::StopReel {
                    order: 0,
                    reevaluation: false,
                };
                Ok(wait(Wait::duration(spin_ms)))
            }

            Phase::StopReel {
                order,
                reevaluation,
            } => {
                let guard_ms = timing.external_wait_guard_ms;
                if order == 0 {
                    self.enter(LifecycleState::ReelStopping);
                }
                let reel = self.stop_order[order];
                self.land_reel(reel, reevaluation);
                self.grid.stop_reel(reel)?;
                self.record(Stage::ReelStopped {
                    reel_index: reel as u8,
                    reevaluation,
                });
                self.phase = Phase::ReelLanded {
                    order,
                    reevaluation,
                };
                if self.config.await_reel_landing {
                    Ok(wait(Wait::flag(
                        Signals::reel_landed_key(reel),
                        true,
                        guard_ms,
                    )))
                } else {
                    Ok(Flow::Next)
                }
            }

            Phase::ReelLanded {
                order,
                reevaluation,
            } => {
                let reel = self.stop_order[order];
                self.phase = if order + 1 < self.stop_order.len() {
                    Phase::ReelInterval {
                        next: order + 1,
                        reevaluation,
                    }
                } else {
                    Phase::Mutations { reevaluation }
                };
                Ok(if reevaluation {
                    self.run_hook(rt, HookKind::HandleReevaluationReelStop, Some(reel), |h, ctx| {
                        h.handle_reevaluation_reel_stop(ctx, reel)
                    })
                } else {
                    self.run_hook(rt, HookKind::HandleSpecificReelStop, Some(reel), |h, ctx| {
                        h.handle_specific_reel_stop(ctx, reel)
                    })
                })
            }

            Phase::ReelInterval { next, reevaluation } => {
                let interval = if reevaluation {
                    timing.reevaluation_stop_interval_ms
                } else {
                    timing.reel_stop_interval_ms
                };
                self.phase = Phase::StopReel {
                    order: next,
                    reevaluation,
                };
                Ok(wait(Wait::duration(interval)))
            }

            Phase::Mutations { reevaluation } => self.step_mutations(rt, reevaluation),

            Phase::BonusAcquired => {
                self.enter(LifecycleState::BonusTransition);
                self.phase = Phase::BonusAnimation;
                Ok(self.run_hook(rt, HookKind::PlayBonusAcquiredEffects, None, |h, ctx| {
                    h.play_bonus_acquired_effects(ctx)
                }))
            }

            Phase::BonusAnimation => {
                let transition_ms = timing.bonus_transition_ms;
                self.phase = Phase::BonusHandoff;
                Ok(wait(Wait::duration(transition_ms)))
            }

            Phase::BonusHandoff => {
                rt.signals_mut().set_flag(HANDOFF_FLAG, false);
                self.phase = Phase::BonusReturn;
                Ok(self.run_hook(rt, HookKind::StartBonusGame, None, |h, ctx| {
                    h.start_bonus_game(ctx)
                }))
            }

            Phase::BonusReturn => {
                rt.signals_mut().clear_flag(HANDOFF_FLAG);
                self.phase = if self.outcome.has_reevaluations() {
                    Phase::ChainBegin
                } else {
                    Phase::Settle
                };
                Ok(self.run_hook(rt, HookKind::OnBonusGameEnded, None, |h, ctx| {
                    h.on_bonus_game_ended(ctx)
                }))
            }

            Phase::ChainBegin => {
                let spins = self.outcome.reevaluations.len() as u32;
                self.chain.begin(spins)?;
                self.record(Stage::ChainStarted { spins });
                let feature = self.config.audio.feature_music.clone();
                self.switch_music(rt, feature);
                self.feature_music = true;
                self.phase = Phase::ChainSpin;
                Ok(Flow::Next)
            }

            Phase::ChainSpin => {
                self.enter(LifecycleState::Reevaluating);
                let step = self.chain.advance();
                let index = self.chain.spins_played().saturating_sub(1) as usize;
                self.reevaluation_index = Some(index);
                match self.outcome.reevaluations.get(index) {
                    Some(entry) => self.queue.load(&entry.mutations),
                    None => log::warn!(
                        "{}: respin {} has no reevaluation data, replaying reels as they are",
                        self.config.game_id,
                        index + 1
                    ),
                }
                self.grid.begin_spin();
                self.phase = Phase::ChainSpinUp;
                Ok(self.run_hook(rt, HookKind::StartNextReevaluationSpin, None, |h, ctx| {
                    h.start_next_reevaluation_spin(ctx, step.spins_remaining)
                }))
            }

            Phase::ChainSpinUp => {
                let spin_ms = timing.reevaluation_spin_duration_ms;
                self.phase = Phase::StopReel {
                    order: 0,
                    reevaluation: true,
                };
                Ok(wait(Wait::duration(spin_ms)))
            }

            Phase::ChainSpinComplete => {
                self.lock_sticky_symbols();
                let extra = self.call_hook(rt, HookKind::OnReevaluationSpinComplete, None, |h, ctx| {
                    h.on_reevaluation_spin_complete(ctx)
                });
                if extra > 0 {
                    log::debug!("{}: chain extended by {extra}", self.config.game_id);
                    self.chain.extend(extra);
                }

                if self.chain.should_continue() {
                    self.phase = Phase::ChainSpin;
                } else {
                    let spins_played = self.chain.finish();
                    self.respins_played = spins_played;
                    self.reevaluation_index = None;
                    self.record(Stage::ChainFinished { spins_played });
                    let base = self.config.audio.base_music.clone();
                    self.switch_music(rt, base);
                    self.feature_music = false;
                    self.phase = Phase::Settle;
                }
                Ok(Flow::Next)
            }

            Phase::Settle => {
                self.phase = Phase::AwaitPayout;
                Ok(self.run_hook(rt, HookKind::ReelsStoppedCallback, None, |h, ctx| {
                    h.reels_stopped_callback(ctx)
                }))
            }

            Phase::AwaitPayout => match self.settle.credits() {
                Some(credits) => {
                    self.record(Stage::PayoutDisplayed { credits });
                    Ok(Flow::Settled(self.settle_spin(rt, credits)))
                }
                None => Ok(wait(Wait::Frame)),
            },
        }
    }

    fn step_mutations(&mut self, rt: &mut Runtime, reevaluation: bool) -> Result<Flow> {
        if let Some(mut playback) = self.playback.take() {
            let applied_before = playback.report().cells.len();
            let skipped_before = playback.report().skipped_effects.len();

            let parts = rt.parts();
            let mut env = PlaybackEnv {
                grid: &mut self.grid,
                effects: &mut self.session,
                audio: parts.audio,
                timing: &self.config.timing,
            };
            let step = playback.resume(&mut env);
            self.watchdog_ms = 0.0;

            self.trace_playback(&playback, applied_before, skipped_before);
            return Ok(match step {
                RoutineStep::Suspend(next) => {
                    self.playback = Some(playback);
                    wait(next)
                }
                RoutineStep::Done => {
                    self.queue.finish_active(true);
                    Flow::Next
                }
            });
        }

        let Some(mutation) = self.queue.activate_next().cloned() else {
            self.phase = if reevaluation {
                Phase::ChainSpinComplete
            } else if self.outcome.is_bonus {
                Phase::BonusAcquired
            } else if self.outcome.has_reevaluations() {
                Phase::ChainBegin
            } else {
                Phase::Settle
            };
            return Ok(Flow::Next);
        };

        match MutationPlan::build(&mutation, self.grid.reel_count(), self.grid.rows()) {
            Err(e) => {
                log::error!(
                    "{}: malformed '{}' mutation abandoned: {e}",
                    self.config.game_id,
                    mutation.kind
                );
                self.record(Stage::MutationRejected {
                    reason: e.to_string(),
                });
                self.queue.finish_active(false);
                Ok(Flow::Next)
            }
            Ok(plan) => {
                if self.state != LifecycleState::MutationPlayback {
                    self.enter(LifecycleState::MutationPlayback);
                }
                let style = self.config.style_for(&mutation.kind);
                self.playback = Some(MutationPlayback::new(mutation.kind.clone(), plan, style));
                Ok(self.run_hook(rt, HookKind::PlayMutations, None, |h, ctx| {
                    h.play_mutations(ctx, &mutation)
                }))
            }
        }
    }

    fn trace_playback(&mut self, playback: &MutationPlayback, applied_before: usize, skipped_before: usize) {
        let report = playback.report();
        for cell in &report.cells[applied_before..] {
            self.mutated_cells += 1;
            self.record(Stage::SymbolMutated {
                cell: cell.pos,
                from: cell.from.clone(),
                to: cell.to.clone(),
                relocated_from: cell.relocated_from,
            });
        }
        for kind in &report.skipped_effects[skipped_before..] {
            self.record(Stage::EffectSkipped { kind: kind.clone() });
        }
    }

    fn settle_spin(&mut self, rt: &mut Runtime, payout: f64) -> SpinSummary {
        self.enter(LifecycleState::Settled);
        self.record(Stage::Settled);
        rt.signals_mut().clear_slam_stop();

        let summary = SpinSummary {
            spin_id: self.spin_count,
            payout,
            elapsed_ms: self.clock_ms,
            ticks: self.ticks,
            mutated_cells: self.mutated_cells,
            reevaluation_spins: self.respins_played,
            slam_stopped: self.slammed,
        };
        log::info!(
            "{}: spin {} settled, payout {:.2} after {:.0}ms",
            self.config.game_id,
            summary.spin_id,
            payout,
            summary.elapsed_ms
        );

        self.state = LifecycleState::Idle;
        self.phase = Phase::Idle;
        summary
    }

    // ═══════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    fn call_hook<R>(
        &mut self,
        rt: &mut Runtime,
        hook: HookKind,
        reel: Option<usize>,
        f: impl FnOnce(&mut dyn PresentationHooks, &mut HookContext<'_>) -> R,
    ) -> R {
        log::debug!("{}: {} hook", self.hooks.title(), hook);
        self.record(match reel {
            Some(reel) => Stage::reel_hook(hook, reel),
            None => Stage::hook(hook),
        });

        let parts = rt.parts();
        let mut ctx = HookContext {
            grid: &mut self.grid,
            effects: &mut self.session,
            audio: parts.audio,
            signals: parts.signals,
            routines: parts.routines,
            outcome: &self.outcome,
            mutations: &self.queue,
            chain: &self.chain,
            settle: &self.settle,
            config: &self.config,
        };
        f(self.hooks.as_mut(), &mut ctx)
    }

    fn run_hook(
        &mut self,
        rt: &mut Runtime,
        hook: HookKind,
        reel: Option<usize>,
        f: impl FnOnce(&mut dyn PresentationHooks, &mut HookContext<'_>) -> HookFlow,
    ) -> Flow {
        self.call_hook(rt, hook, reel, f).into()
    }

    fn poll_blocker(&mut self, blocker: &mut Blocker, rt: &mut Runtime, dt_ms: f64, fresh: bool) -> bool {
        let policy = WaitPolicy {
            slam_stop: rt.signals().slam_stop_requested(),
            slam_min_wait_ms: self.config.timing.slam_min_wait_ms,
        };
        match blocker {
            Blocker::Wait(suspension) => {
                let status = if fresh {
                    suspension.check(rt.signals(), &policy)
                } else {
                    suspension.advance(dt_ms, rt.signals(), &policy)
                };
                match status {
                    WaitStatus::Pending => false,
                    WaitStatus::Ready => true,
                    WaitStatus::TimedOut => {
                        let waiting_on = suspension.wait().describe();
                        log::warn!(
                            "{}: gave up waiting on {} after {:.0}ms",
                            self.config.game_id,
                            waiting_on,
                            suspension.elapsed_ms()
                        );
                        self.record(Stage::WaitTimedOut { waiting_on });
                        true
                    }
                }
            }
            Blocker::Script {
                sequence,
                suspension,
            } => {
                let parts = rt.parts();
                let mut env = RoutineEnv {
                    signals: parts.signals,
                    audio: parts.audio,
                };
                let dt = if fresh { 0.0 } else { dt_ms };
                drive(sequence, suspension, dt, &mut env, &policy) == Drive::Done
            }
        }
    }

    fn is_parked(&self) -> bool {
        matches!(&self.blocker, Some(Blocker::Wait(s)) if *s.wait() == Wait::Handoff)
    }

    fn land_reel(&mut self, reel: usize, reevaluation: bool) {
        let matrix = if reevaluation {
            self.reevaluation_index
                .and_then(|i| self.outcome.reevaluations.get(i))
                .map(|r| &r.reevaluated_matrix)
        } else {
            self.outcome.reel_matrix.as_ref()
        };
        let Some(matrix) = matrix.filter(|m| !m.is_empty()) else {
            return;
        };
        let Some(symbols) = matrix.get(reel).cloned() else {
            log::warn!(
                "{}: no symbols for reel {reel} in outcome matrix, keeping current",
                self.config.game_id
            );
            return;
        };
        if let Err(e) = self.grid.land_symbols(reel, &symbols) {
            log::warn!("{}: {e}, keeping current symbols", self.config.game_id);
        }
    }

    fn lock_sticky_symbols(&mut self) {
        let Some(entry) = self
            .reevaluation_index
            .and_then(|i| self.outcome.reevaluations.get(i))
        else {
            return;
        };
        let stickies = entry.sticky_symbols.clone();
        for sticky in stickies {
            let (reel, row) = (sticky.reel as usize, sticky.position as usize);
            match self.grid.create_sticky_symbol(&sticky.name, row, reel) {
                Ok(_) => {
                    self.chain.mark_sticky();
                    self.record(Stage::StickyLocked {
                        cell: CellPos::new(reel, row),
                        symbol: sticky.name,
                    });
                }
                Err(e) => log::warn!(
                    "{}: sticky '{}' at reel {reel} row {row} skipped: {e}",
                    self.config.game_id,
                    sticky.name
                ),
            }
        }
    }

    fn switch_music(&mut self, rt: &mut Runtime, key: String) {
        rt.audio_mut().switch_music_key(&key);
        self.record(Stage::MusicSwitched { key });
    }

    fn enter(&mut self, state: LifecycleState) {
        log::debug!("{}: -> {}", self.config.game_id, state);
        self.state = state;
        self.record(Stage::StateEntered { state });
    }

    fn record(&mut self, stage: Stage) {
        self.trace
            .push(StageEvent::new(stage, self.clock_ms).at_tick(self.ticks));
    }
}

fn wait(wait: Wait) -> Flow {
    Flow::Block(Blocker::Wait(Suspension::new(wait)))
}

impl std::fmt::Debug for SpinLifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpinLifecycleController")
            .field("game_id", &self.config.game_id)
            .field("title", &self.hooks.title())
            .field("state", &self.state)
            .field("spin", &self.spin_count)
            .field("waiting_on", &self.waiting_on())
            .finish()
    }
}
