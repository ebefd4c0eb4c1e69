//! Game settings and tuning
//!
//! Loaded from a JSON file next to the level data; any missing field keeps
//! its default.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigDefect;
use crate::renderer::animation::VisualCatalog;

/// Dynamic difficulty tuning for spawner heat
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatTuning {
    /// Heat added per missed click
    pub per_miss: f32,
    /// Heat removed per second
    pub decay_per_sec: f32,
    /// Heat cap (also the most it can add to the glitch chance)
    pub max_extra: f32,
}

impl Default for HeatTuning {
    fn default() -> Self {
        Self {
            per_miss: MISS_HEAT_PER_MISS,
            decay_per_sec: MISS_HEAT_DECAY,
            max_extra: MAX_EXTRA_GLITCH,
        }
    }
}

/// Game settings/preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Screen size normalized level coordinates are scaled to
    pub resolution: [u32; 2],
    /// Starting hit points
    pub hp: i32,
    /// Conveyor speed (t per second) forced on every robot
    pub robot_speed: f32,
    /// Default dwell at each station
    pub dwell_time_station: f32,
    /// Click radius around robots
    pub hit_radius: f32,
    pub heat: HeatTuning,
    /// Sprite clips the renderer provides
    pub visuals: VisualCatalog,
    /// Sound effects volume (0.0 - 1.0)
    pub sfx_volume: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            resolution: [SCREEN_WIDTH, SCREEN_HEIGHT],
            hp: START_HP,
            robot_speed: ROBOT_SPEED,
            dwell_time_station: DWELL_TIME_STATION,
            hit_radius: ROBOT_RADIUS,
            heat: HeatTuning::default(),
            visuals: VisualCatalog::default(),
            sfx_volume: 1.0,
        }
    }
}

impl Settings {
    /// Parse settings JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load settings from disk, falling back to defaults
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(json) => match Self::from_json(&json) {
                Ok(settings) => {
                    log::info!("Loaded settings from {}", path.display());
                    return settings;
                }
                Err(err) => log::warn!("Ignoring {}: {err}", path.display()),
            },
            Err(err) => log::info!("No settings at {} ({err})", path.display()),
        }

        log::info!("Using default settings");
        Self::default()
    }

    /// Replace out-of-range values with defaults, reporting each one
    pub fn sanitized(mut self, defects: &mut Vec<ConfigDefect>) -> Self {
        let defaults = Self::default();
        if self.resolution.contains(&0) {
            self.resolution = defaults.resolution;
            defects.push(ConfigDefect::BadSetting { name: "resolution" });
        }
        if self.hp < 1 {
            self.hp = defaults.hp;
            defects.push(ConfigDefect::BadSetting { name: "hp" });
        }
        if !(self.robot_speed.is_finite() && self.robot_speed >= 0.0) {
            self.robot_speed = defaults.robot_speed;
            defects.push(ConfigDefect::BadSetting { name: "robot_speed" });
        }
        if !(self.dwell_time_station.is_finite() && self.dwell_time_station >= 0.0) {
            self.dwell_time_station = defaults.dwell_time_station;
            defects.push(ConfigDefect::BadSetting {
                name: "dwell_time_station",
            });
        }
        if !(self.hit_radius.is_finite() && self.hit_radius > 0.0) {
            self.hit_radius = defaults.hit_radius;
            defects.push(ConfigDefect::BadSetting { name: "hit_radius" });
        }
        let heat = self.heat;
        let heat_ok = [heat.per_miss, heat.decay_per_sec, heat.max_extra]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0);
        if !heat_ok {
            self.heat = defaults.heat;
            defects.push(ConfigDefect::BadSetting { name: "heat" });
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = Settings::from_json(r#"{ "hp": 5, "heat": { "per_miss": 0.05 } }"#).unwrap();
        assert_eq!(settings.hp, 5);
        assert_eq!(settings.heat.per_miss, 0.05);
        assert_eq!(settings.heat.max_extra, MAX_EXTRA_GLITCH);
        assert_eq!(settings.robot_speed, ROBOT_SPEED);
        assert_eq!(settings.visuals, VisualCatalog::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let settings = Settings::load("/nonexistent/rogue-factory/settings.json");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_sanitized_reports_bad_values() {
        let mut defects = Vec::new();
        let settings = Settings {
            robot_speed: -1.0,
            hit_radius: f32::NAN,
            ..Settings::default()
        }
        .sanitized(&mut defects);
        assert_eq!(settings.robot_speed, ROBOT_SPEED);
        assert_eq!(settings.hit_radius, ROBOT_RADIUS);
        assert_eq!(defects.len(), 2);
    }
}
