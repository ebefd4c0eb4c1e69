//! Round state and events
//!
//! Scoreboard values for one round, plus the event stream the round emits
//! for renderers, sound and logs.

use serde::{Deserialize, Serialize};

use super::robot::RobotKind;
use crate::audio::SoundEffect;
use crate::renderer::animation::Clip;

/// Monotonic robot id source, one per round
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl IdAllocator {
    /// Allocate a new robot ID
    pub fn next_id(&mut self) -> u32 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// How a finished round ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win,
    Lose,
}

/// Current phase of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Running,
    Paused,
    /// Terminal; only a restart leaves it
    Over(Outcome),
}

/// Scoreboard for one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundState {
    /// Seconds remaining, never negative
    pub time_left: f32,
    pub production: u32,
    pub goal: u32,
    pub hp: i32,
    pub hits: u32,
    pub misses: u32,
    pub phase: Phase,
    /// Debug overlay requested (exposes heat in the stats)
    pub debug: bool,
    /// Simulated seconds so far
    pub elapsed: f32,
}

impl RoundState {
    pub fn new(time: f32, goal: u32, hp: i32) -> Self {
        Self {
            time_left: time,
            production: 0,
            goal,
            hp,
            hits: 0,
            misses: 0,
            phase: Phase::Running,
            debug: false,
            elapsed: 0.0,
        }
    }

    /// Click accuracy as a percentage; 100 when nothing was clicked
    pub fn accuracy(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            100.0
        } else {
            self.hits as f32 / total as f32 * 100.0
        }
    }

    pub fn is_over(&self) -> bool {
        matches!(self.phase, Phase::Over(_))
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.phase {
            Phase::Over(outcome) => Some(outcome),
            _ => None,
        }
    }
}

/// HUD / result screen snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundStats {
    pub level_id: String,
    pub hits: u32,
    pub misses: u32,
    pub accuracy: f32,
    pub production: u32,
    pub goal: u32,
    pub time_left: f32,
    pub hp: i32,
    pub live_robots: usize,
    pub outcome: Option<Outcome>,
    /// Per-lane heat, only filled in debug mode
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub heat: Vec<f32>,
}

/// Things that happened during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum RoundEvent {
    Spawned { robot: u32, lane: usize, kind: RobotKind },
    /// OK robot failed at a station and was replaced
    Mutated { from: u32, to: u32, kind: RobotKind },
    Produced { robot: u32 },
    Exploded { robot: u32, lane: usize },
    /// Rogue robot reached the goal
    Escaped { robot: u32 },
    /// Click landed; counted when the robot is removed
    Defused { robot: u32 },
    Missed,
    /// A terminal effect started playing for `secs`
    EffectStarted { robot: u32, clip: Clip, secs: f32 },
    Sound(SoundEffect),
    LaneHalted { lane: usize, secs: f32 },
    Finished(Outcome),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        let mut state = RoundState::new(60.0, 10, 3);
        assert_eq!(state.accuracy(), 100.0);
        state.hits = 1;
        state.misses = 1;
        assert_eq!(state.accuracy(), 50.0);
        state.misses = 3;
        assert_eq!(state.accuracy(), 25.0);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
    }

    #[test]
    fn test_outcome_only_when_over() {
        let mut state = RoundState::new(60.0, 10, 3);
        assert_eq!(state.outcome(), None);
        state.phase = Phase::Over(Outcome::Lose);
        assert!(state.is_over());
        assert_eq!(state.outcome(), Some(Outcome::Lose));
    }
}
