//! Routines — resumable multi-step work driven by the tick

use std::collections::VecDeque;
use std::fmt;

use crate::audio::AudioSink;

use super::wait::{Signals, Suspension, Wait, WaitPolicy, WaitStatus};

/// Upper bound on ready steps run back to back in one tick
pub(crate) const MAX_STEPS_PER_TICK: usize = 1024;

/// What a routine did when resumed
#[derive(Debug, Clone, PartialEq)]
pub enum RoutineStep {
    Suspend(Wait),
    Done,
}

/// Services available to a running routine
pub struct RoutineEnv<'a> {
    pub signals: &'a mut Signals,
    pub audio: &'a mut dyn AudioSink,
}

/// Resumable work item
///
/// `resume` runs until the next suspension point or completion.
pub trait Routine {
    fn name(&self) -> &str;
    fn resume(&mut self, env: &mut RoutineEnv<'_>) -> RoutineStep;
}

/// Outcome of driving a routine for one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Drive {
    Pending,
    Done,
}

/// Advance a suspended routine and resume it while its waits are already met
pub(crate) fn drive<R: Routine + ?Sized>(
    routine: &mut R,
    suspension: &mut Option<Suspension>,
    dt_ms: f64,
    env: &mut RoutineEnv<'_>,
    policy: &WaitPolicy,
) -> Drive {
    if let Some(current) = suspension.as_mut() {
        match current.advance(dt_ms, env.signals, policy) {
            WaitStatus::Pending => return Drive::Pending,
            WaitStatus::TimedOut => {
                log::warn!("{}: gave up waiting on {}", routine.name(), current.wait());
            }
            WaitStatus::Ready => {}
        }
        *suspension = None;
    }

    for _ in 0..MAX_STEPS_PER_TICK {
        match routine.resume(env) {
            RoutineStep::Done => return Drive::Done,
            RoutineStep::Suspend(wait) => {
                let mut next = Suspension::new(wait);
                match next.check(env.signals, policy) {
                    WaitStatus::Pending => {
                        *suspension = Some(next);
                        return Drive::Pending;
                    }
                    WaitStatus::TimedOut => {
                        log::warn!("{}: gave up waiting on {}", routine.name(), next.wait());
                    }
                    WaitStatus::Ready => {}
                }
            }
        }
    }
    Drive::Pending
}

// ═══════════════════════════════════════════════════════════════════════════════
// SEQUENCE
// ═══════════════════════════════════════════════════════════════════════════════

type Action = Box<dyn FnMut(&mut RoutineEnv<'_>)>;

enum SequenceStep {
    Wait(Wait),
    Action(Action),
}

/// Scripted routine: waits and actions run in declaration order
///
/// ```
/// use rf_spin::schedule::{Sequence, Wait};
///
/// let intro = Sequence::new("bonus_intro")
///     .play("bonus_acquired")
///     .wait_ms(1200.0)
///     .wait(Wait::animation("bonus_banner", 500.0))
///     .switch_music("bonus");
/// assert_eq!(intro.len(), 4);
/// ```
pub struct Sequence {
    name: String,
    steps: VecDeque<SequenceStep>,
}

impl Sequence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            steps: VecDeque::new(),
        }
    }

    pub fn wait(mut self, wait: Wait) -> Self {
        self.steps.push_back(SequenceStep::Wait(wait));
        self
    }

    pub fn wait_ms(self, ms: f64) -> Self {
        self.wait(Wait::duration(ms))
    }

    pub fn then<F>(mut self, action: F) -> Self
    where
        F: FnMut(&mut RoutineEnv<'_>) + 'static,
    {
        self.steps.push_back(SequenceStep::Action(Box::new(action)));
        self
    }

    pub fn play(self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.then(move |env| env.audio.play(&key))
    }

    pub fn play_with_delay(self, key: impl Into<String>, delay_ms: f64) -> Self {
        let key = key.into();
        self.then(move |env| env.audio.play_with_delay(&key, delay_ms))
    }

    pub fn switch_music(self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.then(move |env| env.audio.switch_music_key(&key))
    }

    pub fn set_flag(self, name: impl Into<String>, value: bool) -> Self {
        let name = name.into();
        self.then(move |env| env.signals.set_flag(name.clone(), value))
    }

    /// Remaining steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Routine for Sequence {
    fn name(&self) -> &str {
        &self.name
    }

    fn resume(&mut self, env: &mut RoutineEnv<'_>) -> RoutineStep {
        while let Some(step) = self.steps.pop_front() {
            match step {
                SequenceStep::Action(mut action) => action(env),
                SequenceStep::Wait(wait) => return RoutineStep::Suspend(wait),
            }
        }
        RoutineStep::Done
    }
}

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sequence")
            .field("name", &self.name)
            .field("remaining", &self.steps.len())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNNER
// ═══════════════════════════════════════════════════════════════════════════════

/// Identifier of a started routine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutineId(u64);

struct RoutineEntry {
    id: RoutineId,
    routine: Box<dyn Routine>,
    suspension: Option<Suspension>,
    started: bool,
}

/// Independent routines advanced once per tick
///
/// Routines started here are fire-and-forget: nothing in the lifecycle
/// waits on them unless a title waits on a flag they set.
#[derive(Default)]
pub struct RoutineRunner {
    next_id: u64,
    entries: Vec<RoutineEntry>,
    completed: u64,
}

impl RoutineRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a routine; it first runs on the next tick
    pub fn start(&mut self, routine: Box<dyn Routine>) -> RoutineId {
        self.next_id += 1;
        let id = RoutineId(self.next_id);
        log::debug!("routine {} started", routine.name());
        self.entries.push(RoutineEntry {
            id,
            routine,
            suspension: None,
            started: false,
        });
        id
    }

    pub fn is_running(&self, id: RoutineId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }

    pub fn completed_count(&self) -> u64 {
        self.completed
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.routine.name()).collect()
    }

    /// Stop a routine without running its remaining steps
    pub fn cancel(&mut self, id: RoutineId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    pub fn tick(&mut self, dt_ms: f64, env: &mut RoutineEnv<'_>, policy: &WaitPolicy) {
        let mut finished = 0;
        self.entries.retain_mut(|entry| {
            let dt = if entry.started { dt_ms } else { 0.0 };
            entry.started = true;
            match drive(entry.routine.as_mut(), &mut entry.suspension, dt, env, policy) {
                Drive::Pending => true,
                Drive::Done => {
                    log::debug!("routine {} finished", entry.routine.name());
                    finished += 1;
                    false
                }
            }
        });
        self.completed += finished;
    }
}

impl fmt::Debug for RoutineRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutineRunner")
            .field("active", &self.names())
            .field("completed", &self.completed)
            .finish()
    }
}
