//! Polyline geometry for conveyor paths
//!
//! A path is parameterized by arc length:
//! - t = 0 is the first point, t = 1 the last
//! - equal steps in t cover equal distance, whatever the segment layout

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::PathError;

/// Paths shorter than this can't carry robots
const MIN_PATH_LENGTH: f32 = 1e-6;
/// Squared length below which a segment is skipped by projection
const MIN_SEGMENT_LENGTH_SQ: f32 = 1e-9;

/// An immutable polyline with cached arc lengths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Path {
    points: Vec<Vec2>,
    /// Arc length at each point (cumulative[0] == 0)
    cumulative: Vec<f32>,
    length: f32,
}

impl Path {
    /// Build a path from at least two points
    pub fn build(points: Vec<Vec2>) -> Result<Self, PathError> {
        if points.len() < 2 {
            return Err(PathError::TooFewPoints {
                count: points.len(),
            });
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(PathError::NonFinite { index });
        }

        let mut cumulative = Vec::with_capacity(points.len());
        let mut run = 0.0;
        cumulative.push(run);
        for pair in points.windows(2) {
            run += pair[0].distance(pair[1]);
            cumulative.push(run);
        }

        if run <= MIN_PATH_LENGTH {
            return Err(PathError::ZeroLength);
        }

        Ok(Self {
            points,
            cumulative,
            length: run,
        })
    }

    /// Total arc length
    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    pub fn start(&self) -> Vec2 {
        self.points[0]
    }

    pub fn end(&self) -> Vec2 {
        self.points[self.points.len() - 1]
    }

    /// Position at parameter `t` (clamped to [0,1])
    pub fn sample(&self, t: f32) -> Vec2 {
        // Written so NaN lands on the start point
        if !(t > 0.0) {
            return self.start();
        }
        if t >= 1.0 {
            return self.end();
        }

        let target = t * self.length;
        for (i, pair) in self.points.windows(2).enumerate() {
            let seg = self.cumulative[i + 1] - self.cumulative[i];
            if self.cumulative[i + 1] >= target {
                let k = if seg > 0.0 {
                    (target - self.cumulative[i]) / seg
                } else {
                    0.0
                };
                return pair[0].lerp(pair[1], k);
            }
        }
        self.end()
    }

    /// Parameter of the point on the path closest to `point`
    ///
    /// Ties keep the earliest segment, so the result is stable.
    pub fn project(&self, point: Vec2) -> f32 {
        let mut best_len = 0.0;
        let mut best_dist_sq = f32::INFINITY;

        for (i, pair) in self.points.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            let v = b - a;
            let seg_sq = v.length_squared();
            if seg_sq <= MIN_SEGMENT_LENGTH_SQ {
                continue;
            }
            let u = ((point - a).dot(v) / seg_sq).clamp(0.0, 1.0);
            let foot = a + v * u;
            let d2 = point.distance_squared(foot);
            if d2 < best_dist_sq {
                best_dist_sq = d2;
                best_len = self.cumulative[i] + (self.cumulative[i + 1] - self.cumulative[i]) * u;
            }
        }

        (best_len / self.length).clamp(0.0, 1.0)
    }
}
