//! Suspension points and the signals they observe

use std::collections::HashMap;
use std::fmt;

/// Flag raised by the session when a bonus game hands control back
pub const HANDOFF_FLAG: &str = "session.handoff_returned";

/// What a suspended step is waiting for
#[derive(Debug, Clone, PartialEq)]
pub enum Wait {
    /// Fixed amount of spin clock
    Duration { ms: f64 },
    /// External flag reaching a value, given up after `guard_ms`
    Flag {
        name: String,
        target: bool,
        guard_ms: f64,
    },
    /// Counter reaching zero, optionally guarded
    Counter { name: String, guard_ms: Option<f64> },
    /// Next tick
    Frame,
    /// Bonus game running elsewhere; resumes on [`HANDOFF_FLAG`]
    Handoff,
}

impl Wait {
    pub fn duration(ms: f64) -> Self {
        Wait::Duration { ms: ms.max(0.0) }
    }

    pub fn flag(name: impl Into<String>, target: bool, guard_ms: f64) -> Self {
        Wait::Flag {
            name: name.into(),
            target,
            guard_ms,
        }
    }

    /// Animation flag set by the presentation layer
    pub fn animation(name: &str, guard_ms: f64) -> Self {
        Wait::flag(Signals::animation_key(name), true, guard_ms)
    }

    pub fn counter(name: impl Into<String>) -> Self {
        Wait::Counter {
            name: name.into(),
            guard_ms: None,
        }
    }

    pub fn guarded_counter(name: impl Into<String>, guard_ms: f64) -> Self {
        Wait::Counter {
            name: name.into(),
            guard_ms: Some(guard_ms),
        }
    }

    pub fn frame() -> Self {
        Wait::Frame
    }

    /// Short human-readable description for traces and logs
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Wait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wait::Duration { ms } => write!(f, "{ms:.0}ms"),
            Wait::Flag { name, target, .. } => write!(f, "flag {name}={target}"),
            Wait::Counter { name, .. } => write!(f, "counter {name}=0"),
            Wait::Frame => write!(f, "frame"),
            Wait::Handoff => write!(f, "bonus handoff"),
        }
    }
}

/// Result of polling a suspension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Pending,
    Ready,
    /// A guarded wait gave up; the step continues anyway
    TimedOut,
}

/// Slam-stop state applied to duration waits
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WaitPolicy {
    pub slam_stop: bool,
    pub slam_min_wait_ms: f64,
}

/// A wait in progress
#[derive(Debug, Clone, PartialEq)]
pub struct Suspension {
    wait: Wait,
    elapsed_ms: f64,
    polled: bool,
}

impl Suspension {
    pub fn new(wait: Wait) -> Self {
        Self {
            wait,
            elapsed_ms: 0.0,
            polled: false,
        }
    }

    pub fn wait(&self) -> &Wait {
        &self.wait
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// Poll without advancing time (same tick the wait was entered)
    pub fn check(&mut self, signals: &Signals, policy: &WaitPolicy) -> WaitStatus {
        self.evaluate(signals, policy)
    }

    /// Advance by one tick and poll
    pub fn advance(&mut self, dt_ms: f64, signals: &Signals, policy: &WaitPolicy) -> WaitStatus {
        self.elapsed_ms += dt_ms.max(0.0);
        self.polled = true;
        self.evaluate(signals, policy)
    }

    fn evaluate(&self, signals: &Signals, policy: &WaitPolicy) -> WaitStatus {
        match &self.wait {
            Wait::Duration { ms } => {
                let target = if policy.slam_stop {
                    ms.min(policy.slam_min_wait_ms)
                } else {
                    *ms
                };
                ready_if(self.elapsed_ms >= target)
            }
            Wait::Flag {
                name,
                target,
                guard_ms,
            } => {
                if signals.flag(name) == *target {
                    WaitStatus::Ready
                } else if self.elapsed_ms >= *guard_ms {
                    WaitStatus::TimedOut
                } else {
                    WaitStatus::Pending
                }
            }
            Wait::Counter { name, guard_ms } => {
                if signals.counter(name) <= 0 {
                    WaitStatus::Ready
                } else if guard_ms.is_some_and(|g| self.elapsed_ms >= g) {
                    WaitStatus::TimedOut
                } else {
                    WaitStatus::Pending
                }
            }
            Wait::Frame => ready_if(self.polled),
            Wait::Handoff => ready_if(signals.flag(HANDOFF_FLAG)),
        }
    }
}

fn ready_if(condition: bool) -> WaitStatus {
    if condition {
        WaitStatus::Ready
    } else {
        WaitStatus::Pending
    }
}

/// Shared flags and counters polled by suspensions
#[derive(Debug, Default, Clone)]
pub struct Signals {
    flags: HashMap<String, bool>,
    counters: HashMap<String, i64>,
    slam_stop: bool,
}

impl Signals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag raised by the presentation layer when a reel has landed
    pub fn reel_landed_key(reel: usize) -> String {
        format!("reel.{reel}.landed")
    }

    pub fn animation_key(name: &str) -> String {
        format!("anim.{name}")
    }

    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
        self.flags.insert(name.into(), value);
    }

    /// Unset flags read as false
    pub fn flag(&self, name: &str) -> bool {
        self.flags.get(name).copied().unwrap_or(false)
    }

    pub fn clear_flag(&mut self, name: &str) {
        self.flags.remove(name);
    }

    pub fn set_animation_state(&mut self, name: &str, in_state: bool) {
        self.set_flag(Self::animation_key(name), in_state);
    }

    pub fn is_animation_in_state(&self, name: &str) -> bool {
        self.flag(&Self::animation_key(name))
    }

    pub fn increment(&mut self, name: &str) -> i64 {
        let value = self.counters.entry(name.to_string()).or_insert(0);
        *value += 1;
        *value
    }

    pub fn decrement(&mut self, name: &str) -> i64 {
        let value = self.counters.entry(name.to_string()).or_insert(0);
        *value -= 1;
        *value
    }

    pub fn counter(&self, name: &str) -> i64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn reset_counter(&mut self, name: &str) {
        self.counters.remove(name);
    }

    pub fn request_slam_stop(&mut self) {
        self.slam_stop = true;
    }

    pub fn slam_stop_requested(&self) -> bool {
        self.slam_stop
    }

    pub fn clear_slam_stop(&mut self) {
        self.slam_stop = false;
    }
}
