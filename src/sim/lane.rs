//! Conveyor lanes and their stations

use std::rc::Rc;

use glam::Vec2;

use super::path::Path;
use crate::consts::{FALLBACK_STATION_COUNT, STATION_T_DECIMALS};
use crate::error::ConfigDefect;
use crate::round_to;

/// One conveyor: a path plus the station parameters robots stop at
///
/// Cheap to clone; every robot on the lane shares the same data.
#[derive(Debug, Clone)]
pub struct Lane {
    pub id: usize,
    pub path: Rc<Path>,
    pub stations: Rc<[f32]>,
}

impl Lane {
    pub fn new(id: usize, path: Path, stations: Vec<f32>) -> Self {
        Self {
            id,
            path: Rc::new(path),
            stations: stations.into(),
        }
    }

    /// Screen positions of every station
    pub fn station_positions(&self) -> Vec<Vec2> {
        self.stations.iter().map(|&t| self.path.sample(t)).collect()
    }
}

/// Project station points onto a path, sorted ascending
pub fn project_stations(path: &Path, points: &[Vec2]) -> Vec<f32> {
    let mut ts: Vec<f32> = points
        .iter()
        .map(|&p| round_to(path.project(p), STATION_T_DECIMALS))
        .collect();
    ts.sort_by(f32::total_cmp);
    ts
}

/// Evenly spaced stations for maps that configure none
pub fn fallback_stations() -> Vec<f32> {
    let n = FALLBACK_STATION_COUNT;
    (1..=n).map(|k| k as f32 / (n + 1) as f32).collect()
}

/// Accept an explicit station list only if it is finite, in [0,1] and ascending
///
/// Anything else runs the lane without stations.
pub fn validate_stations(lane: usize, ts: Vec<f32>, defects: &mut Vec<ConfigDefect>) -> Vec<f32> {
    let in_range = ts.iter().all(|t| t.is_finite() && (0.0..=1.0).contains(t));
    let ascending = ts.windows(2).all(|w| w[0] <= w[1]);
    if in_range && ascending {
        ts
    } else {
        defects.push(ConfigDefect::MalformedStations { lane });
        Vec::new()
    }
}
