//! Rogue Factory - conveyor-line arcade game
//!
//! Core modules:
//! - `sim`: Deterministic simulation (paths, robots, spawners, round loop)
//! - `level`: Level/map data and the built-in level pack
//! - `renderer`: Views and animation state handed to a renderer
//! - `audio`: Fire-and-forget sound effect sink
//! - `settings`: Data-driven game tuning

pub mod audio;
pub mod error;
pub mod level;
pub mod renderer;
pub mod settings;
pub mod sim;

pub use error::{ConfigDefect, PathError, SetupError};
pub use level::LevelPack;
pub use settings::Settings;

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    /// Fixed simulation timestep (60 Hz)
    pub const SIM_DT: f32 = 1.0 / 60.0;
    /// Maximum substeps per frame to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;

    /// Default screen size in pixels
    pub const SCREEN_WIDTH: u32 = 1280;
    pub const SCREEN_HEIGHT: u32 = 720;

    /// Click radius around a robot's centre
    pub const ROBOT_RADIUS: f32 = 22.0;

    /// Conveyor speed in t per second, shared by every robot
    pub const ROBOT_SPEED: f32 = 0.12;
    /// Time a robot stands at each station
    pub const DWELL_TIME_STATION: f32 = 0.35;
    /// Starting hit points
    pub const START_HP: i32 = 3;

    /// BAD fuse defaults
    pub const BAD_FUSE_TIME: f32 = 5.0;
    pub const BAD_FUSE_JITTER: f32 = 0.5;
    /// Largest fuse jitter a level may ask for
    pub const MAX_FUSE_JITTER: f32 = 60.0;
    /// EXPLODER lane halt after it goes off
    pub const EXPLODER_PAUSE_TIME: f32 = 5.0;
    pub const RUNNER_GOAL_PENALTY: u32 = 3;

    /// Dynamic difficulty: +2% glitch chance per miss
    pub const MISS_HEAT_PER_MISS: f32 = 0.02;
    /// Heat lost per second
    pub const MISS_HEAT_DECAY: f32 = 0.20;
    /// Heat never adds more than +12%
    pub const MAX_EXTRA_GLITCH: f32 = 0.12;

    /// Stations laid out on maps that don't configure any
    pub const FALLBACK_STATION_COUNT: usize = 12;
    /// Decimal places kept on projected station parameters
    pub const STATION_T_DECIMALS: i32 = 4;
}

/// Scale normalized [0,1]x[0,1] points to screen pixels
pub fn rescale_points(points: &[[f32; 2]], width: u32, height: u32) -> Vec<Vec2> {
    points
        .iter()
        .map(|&[x, y]| Vec2::new(x * width as f32, y * height as f32))
        .collect()
}

/// Round to a fixed number of decimal places
#[inline]
pub fn round_to(value: f32, decimals: i32) -> f32 {
    let scale = 10f32.powi(decimals);
    (value * scale).round() / scale
}
