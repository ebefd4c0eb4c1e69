//! Level and map data
//!
//! A [`LevelPack`] is plain JSON: station presets, maps made of normalized
//! polylines, and levels that pick a map and describe what spawns on it.
//! [`LevelPack::plan`] turns one level into everything a round needs, with
//! lanes resolved to screen space and robot parameters typed.

use std::collections::BTreeMap;
use std::path::Path as FsPath;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::consts::MAX_FUSE_JITTER;
use crate::error::{ConfigDefect, SetupError};
use crate::rescale_points;
use crate::settings::Settings;
use crate::sim::lane::{Lane, fallback_stations, project_stations, validate_stations};
use crate::sim::path::Path;
use crate::sim::robot::{Failure, HazardTraits, OkTraits, RobotKind, Traits};
use crate::sim::spawner::{SpawnDef, SpawnTable};

/// Map every level falls back to
pub const STRAIGHT_MAP: &str = "straight";

/// One conveyor polyline in normalized [0,1] coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSpec {
    pub points: Vec<[f32; 2]>,
}

/// Where a map's stations are
///
/// Either explicit `ts` on every path, or normalized points (preset, then
/// `points`, then `add_points`, minus `remove_indices`) projected onto it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationsSpec {
    pub preset: Option<String>,
    pub points: Vec<[f32; 2]>,
    pub add_points: Vec<[f32; 2]>,
    pub remove_indices: Vec<usize>,
    pub ts: Option<Vec<f32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapSpec {
    pub map_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub paths: Vec<PathSpec>,
    /// No config at all means evenly spaced stations
    #[serde(default)]
    pub stations: Option<StationsSpec>,
}

impl MapSpec {
    pub fn straight() -> Self {
        Self {
            map_id: STRAIGHT_MAP.to_string(),
            name: "Straight Line".to_string(),
            paths: vec![PathSpec {
                points: vec![[0.08, 0.5], [0.92, 0.5]],
            }],
            stations: Some(StationsSpec {
                preset: Some("straight_default".to_string()),
                ..StationsSpec::default()
            }),
        }
    }

    pub fn s_curve() -> Self {
        Self {
            map_id: "s_curve".to_string(),
            name: "S Curve".to_string(),
            paths: vec![PathSpec {
                points: vec![[0.1, 0.3], [0.4, 0.3], [0.6, 0.55], [0.4, 0.8], [0.85, 0.8]],
            }],
            stations: None,
        }
    }
}

fn default_weight() -> f32 {
    1.0
}

/// One spawn-table entry as written in the level file
///
/// Everything besides `type` and `weight` is a robot parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotDefSpec {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

fn default_interval() -> f32 {
    1.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnSpec {
    /// Seconds between spawns on each lane
    #[serde(default = "default_interval")]
    pub interval: f32,
    #[serde(default)]
    pub robots: Vec<RobotDefSpec>,
    /// OK/BAD coin flip used when `robots` is empty
    #[serde(default)]
    pub glitch_chance: Option<f32>,
}

fn default_map() -> String {
    STRAIGHT_MAP.to_string()
}

fn default_time() -> f32 {
    120.0
}

fn default_goal() -> u32 {
    20
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSpec {
    pub level_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_map")]
    pub map: String,
    /// Round length in seconds
    #[serde(default = "default_time")]
    pub time: f32,
    /// Production needed to win
    #[serde(default = "default_goal")]
    pub goal: u32,
    pub spawn: SpawnSpec,
}

/// Everything a round is built from, resolved for one level
#[derive(Debug, Clone)]
pub struct RoundPlan {
    pub level_id: String,
    pub name: String,
    pub time: f32,
    pub goal: u32,
    pub interval: f32,
    pub lanes: Vec<Lane>,
    pub table: Rc<SpawnTable>,
    /// Problems the level survived by degrading
    pub defects: Vec<ConfigDefect>,
}

/// Maps, levels and station presets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelPack {
    pub station_presets: BTreeMap<String, Vec<[f32; 2]>>,
    pub maps: Vec<MapSpec>,
    pub levels: Vec<LevelSpec>,
}

impl LevelPack {
    /// Two maps and five glitch-model levels of rising difficulty
    pub fn builtin() -> Self {
        let mut station_presets = BTreeMap::new();
        station_presets.insert(
            "straight_default".to_string(),
            vec![
                [0.2, 0.5],
                [0.32, 0.5],
                [0.44, 0.5],
                [0.56, 0.5],
                [0.68, 0.5],
                [0.8, 0.5],
            ],
        );

        // (time, interval, glitch chance, goal)
        let tiers = [
            (120.0, 1.60, 0.08, 25),
            (135.0, 1.40, 0.12, 32),
            (150.0, 1.20, 0.16, 40),
            (150.0, 1.00, 0.20, 48),
            (165.0, 0.90, 0.24, 58),
        ];
        let levels = tiers
            .iter()
            .enumerate()
            .map(|(i, &(time, interval, glitch, goal))| LevelSpec {
                level_id: format!("L{}", i + 1),
                name: format!("Level {}", i + 1),
                map: if i < 2 { STRAIGHT_MAP.to_string() } else { "s_curve".to_string() },
                time,
                goal,
                spawn: SpawnSpec {
                    interval,
                    robots: Vec::new(),
                    glitch_chance: Some(glitch),
                },
            })
            .collect();

        Self {
            station_presets,
            maps: vec![MapSpec::straight(), MapSpec::s_curve()],
            levels,
        }
    }

    /// Parse a pack, filling anything it leaves out from the built-in pack
    pub fn from_json(json: &str) -> Result<Self, SetupError> {
        let mut pack: Self = serde_json::from_str(json)?;
        let builtin = Self::builtin();
        if pack.maps.is_empty() {
            pack.maps = builtin.maps;
        }
        if pack.levels.is_empty() {
            log::info!("Level pack has no levels, using the built-in ones");
            pack.levels = builtin.levels;
        }
        for (id, points) in builtin.station_presets {
            pack.station_presets.entry(id).or_insert(points);
        }
        Ok(pack)
    }

    pub fn load(path: impl AsRef<FsPath>) -> Result<Self, SetupError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| SetupError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let pack = Self::from_json(&json)?;
        log::info!(
            "Loaded {} levels and {} maps from {}",
            pack.levels.len(),
            pack.maps.len(),
            path.display()
        );
        Ok(pack)
    }

    pub fn level(&self, index: usize) -> Option<&LevelSpec> {
        self.levels.get(index)
    }

    pub fn map(&self, map_id: &str) -> Option<&MapSpec> {
        self.maps.iter().find(|m| m.map_id == map_id)
    }

    /// Resolve level `index` for the given settings
    pub fn plan(&self, index: usize, settings: &Settings) -> Result<RoundPlan, SetupError> {
        let level = self.level(index).ok_or(SetupError::NoSuchLevel {
            index,
            count: self.levels.len(),
        })?;
        let interval = level.spawn.interval;
        if !(interval.is_finite() && interval > 0.0) {
            return Err(SetupError::InvalidSpawnInterval {
                level: level.level_id.clone(),
                interval,
            });
        }
        if !(level.time.is_finite() && level.time > 0.0) {
            return Err(SetupError::InvalidDuration {
                level: level.level_id.clone(),
                time: level.time,
            });
        }

        let mut defects = Vec::new();
        let fallback;
        let map = match self.map(&level.map) {
            Some(map) => map,
            None => {
                defects.push(ConfigDefect::UnknownMap {
                    level: level.level_id.clone(),
                    map: level.map.clone(),
                });
                fallback = self.map(STRAIGHT_MAP).cloned().unwrap_or_else(MapSpec::straight);
                &fallback
            }
        };
        if map.paths.is_empty() {
            return Err(SetupError::NoLanes {
                map: map.map_id.clone(),
            });
        }

        let [width, height] = settings.resolution;
        let mut lanes = Vec::with_capacity(map.paths.len());
        for (i, spec) in map.paths.iter().enumerate() {
            let path = Path::build(rescale_points(&spec.points, width, height)).map_err(|source| {
                SetupError::InvalidPath {
                    map: map.map_id.clone(),
                    lane: i,
                    source,
                }
            })?;
            let stations = self.resolve_stations(map, &path, i, settings, &mut defects);
            lanes.push(Lane::new(i, path, stations));
        }

        let table = spawn_table(level, settings, &mut defects);

        Ok(RoundPlan {
            level_id: level.level_id.clone(),
            name: level.name.clone(),
            time: level.time,
            goal: level.goal,
            interval,
            lanes,
            table: Rc::new(table),
            defects,
        })
    }

    /// Station parameters for one lane of `map`
    fn resolve_stations(
        &self,
        map: &MapSpec,
        path: &Path,
        lane: usize,
        settings: &Settings,
        defects: &mut Vec<ConfigDefect>,
    ) -> Vec<f32> {
        let Some(cfg) = &map.stations else {
            return fallback_stations();
        };
        if let Some(ts) = &cfg.ts {
            return validate_stations(lane, ts.clone(), defects);
        }

        let mut points = Vec::new();
        if let Some(preset) = &cfg.preset {
            match self.station_presets.get(preset) {
                Some(preset_points) => points.extend_from_slice(preset_points),
                // Every lane resolves the same preset; report it once
                None if lane == 0 => defects.push(ConfigDefect::UnknownStationPreset {
                    preset: preset.clone(),
                }),
                None => {}
            }
        }
        points.extend_from_slice(&cfg.points);
        points.extend_from_slice(&cfg.add_points);
        let points: Vec<[f32; 2]> = points
            .into_iter()
            .enumerate()
            .filter(|(i, _)| !cfg.remove_indices.contains(i))
            .map(|(_, p)| p)
            .collect();

        if points.is_empty() {
            return fallback_stations();
        }
        let [width, height] = settings.resolution;
        project_stations(path, &rescale_points(&points, width, height))
    }
}

/// Build the spawn table for a level
fn spawn_table(level: &LevelSpec, settings: &Settings, defects: &mut Vec<ConfigDefect>) -> SpawnTable {
    let dwell = settings.dwell_time_station;
    if level.spawn.robots.is_empty()
        && let Some(glitch) = level.spawn.glitch_chance
    {
        let base = if glitch.is_finite() { glitch.clamp(0.0, 1.0) } else { 0.0 };
        return SpawnTable::Glitch {
            base,
            ok: SpawnDef::new(RobotKind::Ok, dwell),
            bad: SpawnDef::new(RobotKind::Bad, dwell),
        };
    }

    let defs: Vec<SpawnDef> = level
        .spawn
        .robots
        .iter()
        .filter_map(|spec| spawn_def(spec, settings, defects))
        .collect();
    if defs.is_empty() {
        defects.push(ConfigDefect::EmptySpawnTable {
            level: level.level_id.clone(),
        });
        return SpawnTable::Weighted(vec![SpawnDef::new(RobotKind::Ok, dwell)]);
    }
    SpawnTable::Weighted(defs)
}

/// Type a level-file robot entry; `None` drops it from the table
pub fn spawn_def(
    spec: &RobotDefSpec,
    settings: &Settings,
    defects: &mut Vec<ConfigDefect>,
) -> Option<SpawnDef> {
    let Some(kind) = RobotKind::from_type_name(&spec.type_name) else {
        defects.push(ConfigDefect::UnknownRobotType {
            type_name: spec.type_name.clone(),
        });
        return None;
    };
    if !(spec.weight.is_finite() && spec.weight > 0.0) {
        defects.push(ConfigDefect::BadWeight {
            type_name: spec.type_name.clone(),
            weight: spec.weight,
        });
        return None;
    }

    // Variant entries may nest their parameters under `params`
    let mut params = spec.params.clone();
    if let Some(Value::Object(nested)) = params.remove("params") {
        params.extend(nested);
    }
    let mut reader = Params {
        type_name: kind.type_name(),
        params: &params,
        defects,
    };

    let dwell = reader.number("dwell_time_station").unwrap_or(settings.dwell_time_station);
    let traits = match kind {
        RobotKind::Ok => Traits::Ok(Rc::new(ok_traits(&mut reader, settings))),
        _ => Traits::Hazard(hazard_traits(kind, &mut reader)),
    };

    Some(SpawnDef::new(kind, dwell).with_weight(spec.weight).with_traits(traits))
}

fn ok_traits(reader: &mut Params, settings: &Settings) -> OkTraits {
    let fail_prob = reader.probability("fail_prob").unwrap_or(0.0);
    let failure = match reader.list("fail_probs") {
        None => Failure::Flat(fail_prob),
        Some(items) => {
            let probs: Option<Vec<f32>> = items
                .iter()
                .map(|v| v.as_f64().map(|p| p as f32).filter(|p| (0.0..=1.0).contains(p)))
                .collect();
            match probs {
                Some(probs) => Failure::PerStation {
                    probs,
                    fallback: fail_prob,
                },
                None => {
                    reader.reject("fail_probs must be numbers in [0, 1]");
                    Failure::Flat(fail_prob)
                }
            }
        }
    };

    let variants: Vec<SpawnDef> = reader
        .list("variants")
        .unwrap_or_default()
        .iter()
        .filter_map(|value| match serde_json::from_value::<RobotDefSpec>(value.clone()) {
            Ok(spec) => spawn_def(&spec, settings, reader.defects),
            Err(err) => {
                reader.reject(&format!("bad variant: {err}"));
                None
            }
        })
        .collect();

    if failure.is_possible() && variants.is_empty() {
        reader.defects.push(ConfigDefect::NoMutationVariants {
            type_name: reader.type_name.to_string(),
        });
    }
    OkTraits { failure, variants }
}

fn hazard_traits(kind: RobotKind, reader: &mut Params) -> HazardTraits {
    let mut traits = HazardTraits::for_kind(kind);
    if kind != RobotKind::Runner {
        if let Some(fuse) = reader.number("fuse_time") {
            traits.fuse_secs = Some(fuse);
        }
        let jitter = reader.number("fuse_jitter");
        if let Some(jitter) = jitter {
            traits.fuse_jitter = jitter;
        }
        // Jitter may not push the fuse below zero
        let cap = traits.fuse_secs.unwrap_or(0.0).min(MAX_FUSE_JITTER);
        if traits.fuse_jitter > cap {
            if jitter.is_some() {
                reader.reject(&format!("`fuse_jitter` {} clamped to {cap}", traits.fuse_jitter));
            }
            traits.fuse_jitter = cap;
        }
    }
    if let Some(n) = reader.count("prod_penalty") {
        traits.production_penalty = n;
    }
    if let Some(n) = reader.count("hp_penalty_on_explode") {
        traits.hp_penalty_on_explode = n;
    }
    if let Some(n) = reader.count("hp_penalty_on_goal") {
        traits.hp_penalty_on_goal = n;
    }
    if let Some(secs) = reader.number("pause_time") {
        traits.halt_secs = secs;
    }
    traits
}

/// Typed access to a robot's free-form parameters
///
/// Wrongly typed values are reported and read as absent.
struct Params<'a> {
    type_name: &'static str,
    params: &'a Map<String, Value>,
    defects: &'a mut Vec<ConfigDefect>,
}

impl Params<'_> {
    fn reject(&mut self, reason: &str) {
        self.defects.push(ConfigDefect::BadParams {
            type_name: self.type_name.to_string(),
            reason: reason.to_string(),
        });
    }

    /// Finite, non-negative number
    fn number(&mut self, key: &str) -> Option<f32> {
        let params = self.params;
        let value = params.get(key)?;
        match value.as_f64().map(|v| v as f32) {
            Some(v) if v.is_finite() && v >= 0.0 => Some(v),
            _ => {
                self.reject(&format!("`{key}` must be a non-negative number, got {value}"));
                None
            }
        }
    }

    fn probability(&mut self, key: &str) -> Option<f32> {
        let p = self.number(key)?;
        if p > 1.0 {
            self.reject(&format!("`{key}` must be at most 1, got {p}"));
            return Some(1.0);
        }
        Some(p)
    }

    fn count(&mut self, key: &str) -> Option<u32> {
        self.number(key).map(|v| v.round() as u32)
    }

    fn list(&mut self, key: &str) -> Option<Vec<Value>> {
        let params = self.params;
        match params.get(key)? {
            Value::Array(items) => Some(items.clone()),
            Value::Null => None,
            other => {
                self.reject(&format!("`{key}` must be a list, got {other}"));
                None
            }
        }
    }
}
