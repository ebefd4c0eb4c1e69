//! Sprite animation state
//!
//! Purely cosmetic. Gameplay only asks the catalog how long a terminal
//! effect lasts; it never reads frame indices.

use serde::{Deserialize, Serialize};

/// Animation clips a robot can play
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Clip {
    Ok,
    /// OK -> BAD transformation, followed by `BadLoop`
    BadTransition,
    BadLoop,
    /// Explosion effect
    Boom,
    /// Shutdown effect after a successful click
    Shutdown,
}

impl Clip {
    /// Asset key the renderer looks frames up by
    pub fn key(&self) -> &'static str {
        match self {
            Clip::Ok => "OK",
            Clip::BadTransition => "BAD_TRANS",
            Clip::BadLoop => "BAD_LOOP",
            Clip::Boom => "BOOM",
            Clip::Shutdown => "EFFECT",
        }
    }

    /// Whether the clip wraps around
    pub fn looping(&self) -> bool {
        matches!(self, Clip::Ok | Clip::BadLoop)
    }
}

/// Frame count and per-frame duration of one clip
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipSpec {
    pub frames: u32,
    pub frame_secs: f32,
}

impl ClipSpec {
    pub const fn new(frames: u32, frame_secs: f32) -> Self {
        Self { frames, frame_secs }
    }

    /// Time to play every frame once
    pub fn duration(&self) -> f32 {
        self.frame_secs * self.frames.max(1) as f32
    }
}

/// Clips the renderer has loaded. A missing clip means "no such sprite".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualCatalog {
    pub ok: Option<ClipSpec>,
    pub bad_transition: Option<ClipSpec>,
    pub bad_loop: Option<ClipSpec>,
    pub boom: Option<ClipSpec>,
    pub shutdown: Option<ClipSpec>,
}

impl Default for VisualCatalog {
    fn default() -> Self {
        Self {
            ok: Some(ClipSpec::new(1, 0.12)),
            bad_transition: Some(ClipSpec::new(3, 0.45)),
            bad_loop: Some(ClipSpec::new(2, 0.18)),
            boom: Some(ClipSpec::new(6, 0.12)),
            shutdown: Some(ClipSpec::new(5, 0.06)),
        }
    }
}

impl VisualCatalog {
    /// No sprites at all (headless runs, tests)
    pub fn empty() -> Self {
        Self {
            ok: None,
            bad_transition: None,
            bad_loop: None,
            boom: None,
            shutdown: None,
        }
    }

    pub fn clip(&self, clip: Clip) -> Option<ClipSpec> {
        let spec = match clip {
            Clip::Ok => self.ok,
            Clip::BadTransition => self.bad_transition,
            Clip::BadLoop => self.bad_loop,
            Clip::Boom => self.boom,
            Clip::Shutdown => self.shutdown,
        };
        spec.filter(|s| s.frames > 0 && s.frame_secs > 0.0)
    }

    /// How long a terminal effect holds its robot, if the clip exists
    pub fn effect_secs(&self, clip: Clip) -> Option<f32> {
        self.clip(clip).map(|s| s.duration())
    }
}

/// Playback position within the current clip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Animator {
    clip: Option<Clip>,
    frame: u32,
    elapsed: f32,
    /// Clip to switch to when a one-shot clip ends
    then: Option<Clip>,
}

impl Animator {
    /// Start `clip`, queueing `then` for when it finishes
    pub fn play(&mut self, catalog: &VisualCatalog, clip: Clip, then: Option<Clip>) {
        if catalog.clip(clip).is_none() {
            // Skip straight to the follow-up if this one isn't loaded
            self.then = None;
            match then {
                Some(next) if next != clip => self.play(catalog, next, None),
                _ => self.clip = None,
            }
            return;
        }
        self.clip = Some(clip);
        self.frame = 0;
        self.elapsed = 0.0;
        self.then = then;
    }

    pub fn clip(&self) -> Option<Clip> {
        self.clip
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    /// Advance by `dt`, at most one frame per call
    pub fn advance(&mut self, dt: f32, catalog: &VisualCatalog) {
        let Some(clip) = self.clip else { return };
        let Some(spec) = catalog.clip(clip) else { return };

        self.elapsed += dt;
        if self.elapsed < spec.frame_secs {
            return;
        }
        self.elapsed -= spec.frame_secs;
        self.frame += 1;
        if self.frame < spec.frames {
            return;
        }

        if clip.looping() {
            self.frame = 0;
        } else if let Some(next) = self.then.take() {
            self.play(catalog, next, None);
        } else {
            // Hold the last frame
            self.frame = spec.frames - 1;
        }
    }
}
