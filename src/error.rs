//! Error taxonomy
//!
//! - [`PathError`]: a polyline that can't carry robots
//! - [`SetupError`]: a round that must not start
//! - [`ConfigDefect`]: bad level data the round survives by degrading

use std::path::PathBuf;

use thiserror::Error;

/// Why a polyline was rejected
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PathError {
    #[error("path needs at least 2 points, got {count}")]
    TooFewPoints { count: usize },
    #[error("path has zero length")]
    ZeroLength,
    #[error("path point {index} is not finite")]
    NonFinite { index: usize },
}

/// Round construction failures
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("level index {index} out of range ({count} levels)")]
    NoSuchLevel { index: usize, count: usize },
    #[error("map `{map}` has no paths")]
    NoLanes { map: String },
    #[error("lane {lane} of map `{map}` is not a usable path")]
    InvalidPath {
        map: String,
        lane: usize,
        #[source]
        source: PathError,
    },
    #[error("level `{level}` spawn interval must be positive, got {interval}")]
    InvalidSpawnInterval { level: String, interval: f32 },
    #[error("level `{level}` duration must be positive, got {time}")]
    InvalidDuration { level: String, time: f32 },
    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse level data")]
    Parse(#[from] serde_json::Error),
}

/// Malformed level data that degrades a feature instead of failing the round
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigDefect {
    #[error("level `{level}` references unknown map `{map}`, using the straight map")]
    UnknownMap { level: String, map: String },
    #[error("unknown station preset `{preset}`")]
    UnknownStationPreset { preset: String },
    #[error("station list for lane {lane} is malformed, running without stations")]
    MalformedStations { lane: usize },
    #[error("unknown robot type `{type_name}`, entry ignored")]
    UnknownRobotType { type_name: String },
    #[error("robot `{type_name}` has unusable weight {weight}, entry ignored")]
    BadWeight { type_name: String, weight: f32 },
    #[error("robot `{type_name}` params rejected: {reason}")]
    BadParams { type_name: String, reason: String },
    #[error("robot `{type_name}` can fail at stations but has no variants to become")]
    NoMutationVariants { type_name: String },
    #[error("level `{level}` has an empty spawn table, spawning OK robots only")]
    EmptySpawnTable { level: String },
    #[error("setting `{name}` out of range, using default")]
    BadSetting { name: &'static str },
}
