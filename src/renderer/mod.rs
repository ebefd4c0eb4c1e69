//! Render-facing views
//!
//! The simulation never draws. A renderer asks the round for these plain
//! snapshots each frame and looks sprites up by clip key and frame.

pub mod animation;

use glam::Vec2;
use serde::Serialize;

use crate::sim::lane::Lane;
use crate::sim::robot::{Robot, RobotKind};
use animation::Clip;

/// What to draw for one robot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotView {
    pub id: u32,
    pub lane: usize,
    pub kind: RobotKind,
    pub position: Vec2,
    pub clip: Option<Clip>,
    pub frame: u32,
    /// Click radius, for debug overlays
    pub radius: f32,
    pub interactive: bool,
    pub fuse_left: Option<f32>,
}

impl RobotView {
    pub fn of(robot: &Robot, radius: f32) -> Self {
        Self {
            id: robot.id(),
            lane: robot.lane_id(),
            kind: robot.kind(),
            position: robot.position(),
            clip: robot.animator().clip(),
            frame: robot.animator().frame(),
            radius,
            interactive: robot.is_interactive(),
            fuse_left: robot.fuse_left(),
        }
    }
}

/// Conveyor polyline and its station markers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LaneView {
    pub id: usize,
    pub points: Vec<Vec2>,
    pub stations: Vec<Vec2>,
    /// Stopped by an explosion
    pub halted: bool,
}

impl LaneView {
    pub fn of(lane: &Lane, halted: bool) -> Self {
        Self {
            id: lane.id,
            points: lane.path.points().to_vec(),
            stations: lane.station_positions(),
            halted,
        }
    }
}
