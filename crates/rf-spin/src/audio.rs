//! Audio sink consumed by the lifecycle
//!
//! Playback itself lives outside this crate; the lifecycle only emits cue
//! keys. [`AudioLog`] records them for tests and the CLI.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Fire-and-forget audio commands
pub trait AudioSink {
    fn play(&mut self, key: &str);
    fn play_with_delay(&mut self, key: &str, delay_ms: f64);
    fn switch_music_key(&mut self, key: &str);
}

/// Discards every cue
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAudio;

impl AudioSink for NullAudio {
    fn play(&mut self, _key: &str) {}
    fn play_with_delay(&mut self, _key: &str, _delay_ms: f64) {}
    fn switch_music_key(&mut self, _key: &str) {}
}

/// One recorded audio command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AudioCue {
    Play { key: String },
    Delayed { key: String, delay_ms: f64 },
    Music { key: String },
}

/// Recording sink; clones share the same log
#[derive(Debug, Default, Clone)]
pub struct AudioLog {
    cues: Rc<RefCell<Vec<AudioCue>>>,
}

impl AudioLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cues(&self) -> Vec<AudioCue> {
        self.cues.borrow().clone()
    }

    /// Keys passed to `play`, in order
    pub fn played(&self) -> Vec<String> {
        self.cues
            .borrow()
            .iter()
            .filter_map(|c| match c {
                AudioCue::Play { key } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// Music keys switched to, in order
    pub fn music_switches(&self) -> Vec<String> {
        self.cues
            .borrow()
            .iter()
            .filter_map(|c| match c {
                AudioCue::Music { key } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.cues.borrow_mut().clear();
    }
}

impl AudioSink for AudioLog {
    fn play(&mut self, key: &str) {
        log::trace!("audio play {key}");
        self.cues.borrow_mut().push(AudioCue::Play { key: key.into() });
    }

    fn play_with_delay(&mut self, key: &str, delay_ms: f64) {
        self.cues.borrow_mut().push(AudioCue::Delayed {
            key: key.into(),
            delay_ms,
        });
    }

    fn switch_music_key(&mut self, key: &str) {
        log::debug!("music -> {key}");
        self.cues.borrow_mut().push(AudioCue::Music { key: key.into() });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_shared_between_clones() {
        let log = AudioLog::new();
        let mut sink: Box<dyn AudioSink> = Box::new(log.clone());

        sink.play("reel_stop");
        sink.play_with_delay("wild_land", 120.0);
        sink.switch_music_key("feature");

        assert_eq!(log.played(), vec!["reel_stop".to_string()]);
        assert_eq!(log.music_switches(), vec!["feature".to_string()]);
        assert_eq!(log.cues().len(), 3);

        log.clear();
        assert!(log.cues().is_empty());
    }
}
