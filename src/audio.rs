//! Sound effect sink
//!
//! The simulation only cues sounds; playing them is somebody else's job.
//! A sink that fails or has nothing loaded never affects the round.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sound effect types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundEffect {
    /// BAD robot fuse ran out
    Boom,
    /// BAD robot clicked and shut down
    ShutDown,
}

impl SoundEffect {
    /// Asset key (file stem of the sound)
    pub fn key(&self) -> &'static str {
        match self {
            SoundEffect::Boom => "BOOM",
            SoundEffect::ShutDown => "SHUT_DOWN",
        }
    }
}

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no sound loaded for `{0}`")]
    Missing(&'static str),
    #[error("audio backend failed: {0}")]
    Backend(String),
}

/// Fire-and-forget playback
pub trait AudioSink {
    fn play(&mut self, effect: SoundEffect) -> Result<(), AudioError>;
}

/// Plays nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl AudioSink for Silent {
    fn play(&mut self, _effect: SoundEffect) -> Result<(), AudioError> {
        Ok(())
    }
}

/// Logs each cue instead of playing it (headless runs)
#[derive(Debug, Clone)]
pub struct LogAudio {
    sfx_volume: f32,
    muted: bool,
}

impl Default for LogAudio {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl LogAudio {
    pub fn new(sfx_volume: f32) -> Self {
        Self {
            sfx_volume: sfx_volume.clamp(0.0, 1.0),
            muted: false,
        }
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }
}

impl AudioSink for LogAudio {
    fn play(&mut self, effect: SoundEffect) -> Result<(), AudioError> {
        if self.muted || self.sfx_volume <= 0.0 {
            return Ok(());
        }
        log::debug!("sfx {} (volume {:.2})", effect.key(), self.sfx_volume);
        Ok(())
    }
}
