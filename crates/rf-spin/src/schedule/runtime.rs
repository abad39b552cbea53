//! Runtime — process-wide services that outlive any single session

use crate::audio::{AudioSink, NullAudio};

use super::routine::{Routine, RoutineEnv, RoutineId, RoutineRunner};
use super::wait::{Signals, WaitPolicy};

/// Borrowed view of the runtime, split so each part can be lent separately
pub(crate) struct RuntimeParts<'a> {
    pub signals: &'a mut Signals,
    pub audio: &'a mut dyn AudioSink,
    pub routines: &'a mut RoutineRunner,
}

/// Owns the signals, the audio sink and the independent routines
///
/// Controllers borrow it on every tick; tearing a session down leaves the
/// runtime and its routines running.
pub struct Runtime {
    signals: Signals,
    audio: Box<dyn AudioSink>,
    routines: RoutineRunner,
    clock_ms: f64,
    ticks: u64,
    slam_min_wait_ms: f64,
}

impl Runtime {
    pub fn new(audio: Box<dyn AudioSink>) -> Self {
        Self {
            signals: Signals::new(),
            audio,
            routines: RoutineRunner::new(),
            clock_ms: 0.0,
            ticks: 0,
            slam_min_wait_ms: 0.0,
        }
    }

    /// Runtime whose audio goes nowhere
    pub fn silent() -> Self {
        Self::new(Box::new(NullAudio))
    }

    /// Floor for routine duration waits while slam-stop is requested
    pub fn with_slam_min_wait(mut self, ms: f64) -> Self {
        self.slam_min_wait_ms = ms.max(0.0);
        self
    }

    pub fn signals(&self) -> &Signals {
        &self.signals
    }

    pub fn signals_mut(&mut self) -> &mut Signals {
        &mut self.signals
    }

    pub fn audio_mut(&mut self) -> &mut dyn AudioSink {
        self.audio.as_mut()
    }

    pub fn routines(&self) -> &RoutineRunner {
        &self.routines
    }

    pub fn start_routine(&mut self, routine: Box<dyn Routine>) -> RoutineId {
        self.routines.start(routine)
    }

    /// Process clock in milliseconds
    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance the clock and every independent routine
    pub fn tick(&mut self, dt_ms: f64) {
        let dt_ms = dt_ms.max(0.0);
        self.clock_ms += dt_ms;
        self.ticks += 1;

        let policy = WaitPolicy {
            slam_stop: self.signals.slam_stop_requested(),
            slam_min_wait_ms: self.slam_min_wait_ms,
        };
        let mut env = RoutineEnv {
            signals: &mut self.signals,
            audio: self.audio.as_mut(),
        };
        self.routines.tick(dt_ms, &mut env, &policy);
    }

    pub(crate) fn parts(&mut self) -> RuntimeParts<'_> {
        RuntimeParts {
            signals: &mut self.signals,
            audio: self.audio.as_mut(),
            routines: &mut self.routines,
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::silent()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("clock_ms", &self.clock_ms)
            .field("ticks", &self.ticks)
            .field("routines", &self.routines)
            .finish()
    }
}
