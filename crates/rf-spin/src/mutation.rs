//! Mutation queue and playback
//!
//! Mutations are consumed one at a time in server order. A mutation is
//! first validated into a [`MutationPlan`]; malformed data never reaches
//! the grid. [`MutationPlayback`] then applies the plan step by step,
//! suspending on every transform, flight and stagger.
//!
//! Relocations play first. Their destination cells are left out of the
//! grid pass, so every cell changes at most once per mutation.

use std::collections::{BTreeSet, VecDeque};

use rf_stage::CellPos;
use thiserror::Error;

use crate::audio::AudioSink;
use crate::config::{Anchor, MutationStyle};
use crate::grid::ReelGrid;
use crate::outcome::{Mutation, ReelPosition};
use crate::pool::{EffectLease, SessionContext};
use crate::schedule::{RoutineStep, Wait};
use crate::symbol::Transition;
use crate::timing::TimingConfig;

/// Malformed mutation data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationError {
    #[error("Mutation has no trigger symbol grid")]
    MissingTriggerGrid,

    #[error("Trigger grid has {found} reels, expected {expected}")]
    ReelCountMismatch { expected: usize, found: usize },

    #[error("Trigger grid reel {reel} has {found} rows, expected {expected}")]
    RowCountMismatch {
        reel: usize,
        expected: usize,
        found: usize,
    },

    #[error("Relocation lists differ in length ({from} sources, {to} destinations)")]
    RelocationLengthMismatch { from: usize, to: usize },

    #[error("Relocation position reel {reel} row {position} is outside the grid")]
    RelocationOutOfRange { reel: u32, position: u32 },
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLAN
// ═══════════════════════════════════════════════════════════════════════════════

/// A symbol flown from one cell to another
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relocation {
    pub from: CellPos,
    pub to: CellPos,
    /// Identity landed on `to`; the source identity when the grid names none
    pub target: Option<String>,
}

/// One cell changed by the grid pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCell {
    pub pos: CellPos,
    pub target: String,
}

/// Validated, ordered work of one mutation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MutationPlan {
    pub relocations: Vec<Relocation>,
    /// Reel-major, then row
    pub cells: Vec<PlannedCell>,
}

impl MutationPlan {
    /// Validate a mutation against the grid dimensions
    pub fn build(mutation: &Mutation, reels: usize, rows: usize) -> Result<Self, MutationError> {
        let names = mutation
            .trigger_symbol_names
            .as_ref()
            .ok_or(MutationError::MissingTriggerGrid)?;

        if names.len() != reels {
            return Err(MutationError::ReelCountMismatch {
                expected: reels,
                found: names.len(),
            });
        }
        for (reel, column) in names.iter().enumerate() {
            if column.len() != rows {
                return Err(MutationError::RowCountMismatch {
                    reel,
                    expected: rows,
                    found: column.len(),
                });
            }
        }

        if mutation.from_mutations.len() != mutation.to_mutations.len() {
            return Err(MutationError::RelocationLengthMismatch {
                from: mutation.from_mutations.len(),
                to: mutation.to_mutations.len(),
            });
        }

        let cell = |p: &ReelPosition| -> Result<CellPos, MutationError> {
            if (p.reel as usize) < reels && (p.position as usize) < rows {
                Ok(CellPos::new(p.reel as usize, p.position as usize))
            } else {
                Err(MutationError::RelocationOutOfRange {
                    reel: p.reel,
                    position: p.position,
                })
            }
        };

        let mut relocations = Vec::with_capacity(mutation.to_mutations.len());
        let mut destinations = BTreeSet::new();
        for (from, to) in mutation.from_mutations.iter().zip(&mutation.to_mutations) {
            let (from, to) = (cell(from)?, cell(to)?);
            let target = target_name(names, to.reel as usize, to.row as usize);
            destinations.insert(to);
            relocations.push(Relocation { from, to, target });
        }

        let mut cells = Vec::new();
        for (reel, column) in names.iter().enumerate() {
            for row in 0..column.len() {
                let pos = CellPos::new(reel, row);
                if destinations.contains(&pos) {
                    continue;
                }
                if let Some(target) = target_name(names, reel, row) {
                    cells.push(PlannedCell { pos, target });
                }
            }
        }

        Ok(Self { relocations, cells })
    }

    pub fn is_empty(&self) -> bool {
        self.relocations.is_empty() && self.cells.is_empty()
    }

    /// Number of cells that change identity
    pub fn len(&self) -> usize {
        self.relocations.len() + self.cells.len()
    }
}

fn target_name(names: &[Vec<Option<String>>], reel: usize, row: usize) -> Option<String> {
    names
        .get(reel)
        .and_then(|c| c.get(row))
        .and_then(|n| n.as_deref())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// A cell whose identity changed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedCell {
    pub pos: CellPos,
    /// Previous identity; empty when the cell was empty
    pub from: String,
    pub to: String,
    pub relocated_from: Option<CellPos>,
    /// Whether a pooled effect accompanied the change
    pub with_effect: bool,
}

/// What one mutation did
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MutationReport {
    pub kind: String,
    pub cells: Vec<AppliedCell>,
    /// Effect kinds that could not be acquired
    pub skipped_effects: Vec<String>,
    /// Every suspension in playback order
    pub waits: Vec<Wait>,
    /// Validation failure; nothing was applied
    pub rejected: Option<MutationError>,
}

impl MutationReport {
    fn rejected(kind: &str, error: MutationError) -> Self {
        Self {
            kind: kind.to_string(),
            rejected: Some(error),
            ..Default::default()
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected.is_some()
    }

    /// Positions in application order
    pub fn positions(&self) -> Vec<CellPos> {
        self.cells.iter().map(|c| c.pos).collect()
    }

    /// Total duration of timed waits
    pub fn waited_ms(&self) -> f64 {
        self.waits
            .iter()
            .map(|w| match w {
                Wait::Duration { ms } => *ms,
                _ => 0.0,
            })
            .sum()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PLAYBACK
// ═══════════════════════════════════════════════════════════════════════════════

/// Services a playback step needs
pub struct PlaybackEnv<'a> {
    pub grid: &'a mut ReelGrid,
    pub effects: &'a mut SessionContext,
    pub audio: &'a mut dyn AudioSink,
    pub timing: &'a TimingConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Launch(usize),
    Land(usize),
    Begin(usize),
    Apply(usize),
    Done,
}

/// Incremental application of one validated mutation
#[derive(Debug)]
pub struct MutationPlayback {
    plan: MutationPlan,
    style: MutationStyle,
    cursor: Cursor,
    lease: Option<EffectLease>,
    /// Reel stopped early for the current flight
    provisional_reel: Option<usize>,
    report: MutationReport,
}

impl MutationPlayback {
    pub fn new(kind: impl Into<String>, plan: MutationPlan, style: MutationStyle) -> Self {
        Self {
            plan,
            style,
            cursor: Cursor::Launch(0),
            lease: None,
            provisional_reel: None,
            report: MutationReport {
                kind: kind.into(),
                ..Default::default()
            },
        }
    }

    pub fn report(&self) -> &MutationReport {
        &self.report
    }

    pub fn into_report(self) -> MutationReport {
        self.report
    }

    pub fn is_done(&self) -> bool {
        self.cursor == Cursor::Done
    }

    /// Run until the next suspension point or the end of the mutation
    pub fn resume(&mut self, env: &mut PlaybackEnv<'_>) -> RoutineStep {
        loop {
            match self.cursor {
                Cursor::Launch(i) => {
                    let Some(relocation) = self.plan.relocations.get(i).cloned() else {
                        self.cursor = Cursor::Begin(0);
                        continue;
                    };
                    self.launch(env, &relocation);
                    self.cursor = Cursor::Land(i);
                    return self.suspend(Wait::duration(env.timing.relocation_flight_ms));
                }
                Cursor::Land(i) => {
                    if let Some(relocation) = self.plan.relocations.get(i).cloned() {
                        self.land(env, &relocation);
                    }
                    self.cursor = Cursor::Launch(i + 1);
                    if i + 1 < self.plan.relocations.len() || !self.plan.cells.is_empty() {
                        return self.suspend(Wait::duration(env.timing.mutation_stagger_ms));
                    }
                }
                Cursor::Begin(i) => {
                    let Some(cell) = self.plan.cells.get(i) else {
                        self.cursor = Cursor::Done;
                        continue;
                    };
                    let pos = cell.pos;
                    if let Some(kind) = self.style.effect.clone() {
                        let anchor = env.grid.cell_anchor(pos.reel as usize, pos.row as usize);
                        self.lease = self.acquire_effect(env, &kind, anchor.ok(), None);
                    }
                    if let Some(cue) = &self.style.cue {
                        env.audio.play(cue);
                    }
                    self.cursor = Cursor::Apply(i);
                    return self.suspend(Wait::duration(env.timing.mutation_transform_ms));
                }
                Cursor::Apply(i) => {
                    if let Some(cell) = self.plan.cells.get(i).cloned() {
                        self.apply_cell(env, cell.pos, &cell.target, None);
                    }
                    self.release_effect(env);
                    self.cursor = Cursor::Begin(i + 1);
                    if i + 1 < self.plan.cells.len() {
                        return self.suspend(Wait::duration(env.timing.mutation_stagger_ms));
                    }
                }
                Cursor::Done => return RoutineStep::Done,
            }
        }
    }

    /// Stop mid-flight: release the effect and undo any provisional stop
    pub fn abort(&mut self, grid: &mut ReelGrid, effects: &mut SessionContext) {
        if let Some(lease) = self.lease.take() {
            if let Err(e) = effects.release(lease) {
                log::warn!("Mutation abort: {e}");
            }
        }
        if let Some(reel) = self.provisional_reel.take() {
            if let Err(e) = grid.restore_provisional(reel) {
                log::error!("Restoring reel {reel} on abort: {e}");
            }
        }
        self.cursor = Cursor::Done;
    }

    fn suspend(&mut self, wait: Wait) -> RoutineStep {
        self.report.waits.push(wait.clone());
        RoutineStep::Suspend(wait)
    }

    fn launch(&mut self, env: &mut PlaybackEnv<'_>, relocation: &Relocation) {
        let to_reel = relocation.to.reel as usize;
        match env.grid.provisionally_stop(to_reel) {
            Ok(true) => self.provisional_reel = Some(to_reel),
            Ok(false) => {}
            Err(e) => log::error!("Relocation to reel {to_reel}: {e}"),
        }

        if let Some(kind) = self.style.relocation_effect.clone() {
            let from = env
                .grid
                .cell_anchor(relocation.from.reel as usize, relocation.from.row as usize)
                .ok();
            let to = env
                .grid
                .cell_anchor(to_reel, relocation.to.row as usize)
                .ok();
            self.lease = self.acquire_effect(env, &kind, from, to);
        }
        if let Some(cue) = &self.style.cue {
            env.audio.play(cue);
        }
    }

    fn land(&mut self, env: &mut PlaybackEnv<'_>, relocation: &Relocation) {
        let target = relocation.target.clone().or_else(|| {
            env.grid
                .symbol_at(relocation.from.reel as usize, relocation.from.row as usize)
                .map(|s| s.name().to_string())
        });
        match target {
            Some(target) => self.apply_cell(env, relocation.to, &target, Some(relocation.from)),
            None => log::warn!(
                "Relocation from {:?} has no identity to land, skipped",
                relocation.from
            ),
        }
        self.release_effect(env);
        if let Some(reel) = self.provisional_reel.take() {
            if let Err(e) = env.grid.restore_provisional(reel) {
                log::error!("Restoring reel {reel}: {e}");
            }
        }
    }

    fn apply_cell(
        &mut self,
        env: &mut PlaybackEnv<'_>,
        pos: CellPos,
        target: &str,
        relocated_from: Option<CellPos>,
    ) {
        let transition = Transition::from_clip(self.style.transition.as_deref());
        match env
            .grid
            .mutate_at(pos.reel as usize, pos.row as usize, target, transition)
        {
            Ok(change) => {
                log::debug!(
                    "mutated ({}, {}) {} -> {}",
                    pos.reel,
                    pos.row,
                    change.from.as_deref().unwrap_or("<empty>"),
                    target
                );
                self.report.cells.push(AppliedCell {
                    pos,
                    from: change.from.unwrap_or_default(),
                    to: change.to,
                    relocated_from,
                    with_effect: self.lease.is_some(),
                });
            }
            Err(e) => log::error!("Mutating ({}, {}): {e}", pos.reel, pos.row),
        }
    }

    fn acquire_effect(
        &mut self,
        env: &mut PlaybackEnv<'_>,
        kind: &str,
        from: Option<Anchor>,
        to: Option<Anchor>,
    ) -> Option<EffectLease> {
        let Some(lease) = env.effects.acquire(kind) else {
            log::debug!("No '{kind}' effect available, mutating without it");
            self.report.skipped_effects.push(kind.to_string());
            return None;
        };
        if let Some(effect) = env.effects.get_mut(&lease) {
            effect.place(from.unwrap_or_default(), to);
        }
        Some(lease)
    }

    fn release_effect(&mut self, env: &mut PlaybackEnv<'_>) {
        if let Some(lease) = self.lease.take() {
            if let Err(e) = env.effects.release(lease) {
                log::warn!("Releasing mutation effect: {e}");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// QUEUE
// ═══════════════════════════════════════════════════════════════════════════════

/// Pending mutations of the current spin, in server order
#[derive(Debug, Default, Clone)]
pub struct MutationQueue {
    pending: VecDeque<Mutation>,
    active: Option<Mutation>,
    applied: usize,
    rejected: usize,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append mutations behind anything already pending
    pub fn load(&mut self, mutations: &[Mutation]) {
        self.pending.extend(mutations.iter().cloned());
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.active.is_none()
    }

    /// Read-only view of what is still queued
    pub fn pending(&self) -> impl Iterator<Item = &Mutation> {
        self.pending.iter()
    }

    pub fn active(&self) -> Option<&Mutation> {
        self.active.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Make the first pending mutation active
    ///
    /// Returns `None` if nothing is pending or one is already active.
    pub fn activate_next(&mut self) -> Option<&Mutation> {
        if self.active.is_some() {
            return None;
        }
        self.active = self.pending.pop_front();
        self.active.as_ref()
    }

    /// Retire the active mutation
    pub fn finish_active(&mut self, applied: bool) {
        if self.active.take().is_some() {
            if applied {
                self.applied += 1;
            } else {
                self.rejected += 1;
            }
        }
    }

    /// Mutations applied since the queue was created
    pub fn applied_count(&self) -> usize {
        self.applied
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.active = None;
    }

    /// Apply the next mutation to completion without suspending
    ///
    /// Waits are still recorded in the report. Malformed data is logged and
    /// reported as rejected; the grid is left untouched.
    pub fn apply_next(
        &mut self,
        env: &mut PlaybackEnv<'_>,
        style: &MutationStyle,
    ) -> Option<MutationReport> {
        let mutation = self.activate_next()?.clone();

        let plan = match MutationPlan::build(&mutation, env.grid.reel_count(), env.grid.rows()) {
            Ok(plan) => plan,
            Err(e) => {
                log::error!("Malformed '{}' mutation abandoned: {e}", mutation.kind);
                self.finish_active(false);
                return Some(MutationReport::rejected(&mutation.kind, e));
            }
        };

        let mut playback = MutationPlayback::new(mutation.kind.clone(), plan, style.clone());
        while let RoutineStep::Suspend(_) = playback.resume(env) {}
        self.finish_active(true);
        Some(playback.into_report())
    }
}
