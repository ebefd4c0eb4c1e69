//! Per-lane robot spawning
//!
//! Each lane has its own spawner. Spawning is interval based; which robot
//! comes out is a weighted draw, optionally skewed by miss "heat".

use std::rc::Rc;

use rand::Rng;

use super::lane::Lane;
use super::robot::{Robot, RobotKind, Traits, UpdateCtx};
use super::state::RoundEvent;
use crate::settings::HeatTuning;

/// One entry in a spawn table
#[derive(Debug, Clone)]
pub struct SpawnDef {
    pub kind: RobotKind,
    pub weight: f32,
    pub dwell_secs: f32,
    pub traits: Traits,
}

impl SpawnDef {
    /// Weight 1, default traits for `kind`
    pub fn new(kind: RobotKind, dwell_secs: f32) -> Self {
        Self {
            kind,
            weight: 1.0,
            dwell_secs,
            traits: Traits::defaults_for(kind),
        }
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_traits(mut self, traits: Traits) -> Self {
        self.traits = traits;
        self
    }
}

/// Pick an item with probability proportional to its weight
///
/// Draws in [0, total) and returns the first item whose running total
/// reaches the draw; list order breaks ties.
pub fn weighted_choice<'a, T, R>(
    items: &'a [T],
    weight: impl Fn(&T) -> f32,
    rng: &mut R,
) -> Option<&'a T>
where
    R: Rng + ?Sized,
{
    let total: f32 = items.iter().map(&weight).filter(|w| *w > 0.0).sum();
    if total <= 0.0 {
        return None;
    }
    let draw = rng.random::<f32>() * total;
    let mut acc = 0.0;
    let mut chosen = None;
    for item in items {
        let w = weight(item);
        if w <= 0.0 {
            continue;
        }
        acc += w;
        chosen = Some(item);
        if acc >= draw {
            break;
        }
    }
    chosen
}

/// What a spawner draws from
#[derive(Debug, Clone)]
pub enum SpawnTable {
    /// Explicit weighted list from the level
    Weighted(Vec<SpawnDef>),
    /// OK unless a roll under the glitch chance says BAD
    Glitch {
        base: f32,
        ok: SpawnDef,
        bad: SpawnDef,
    },
}

impl SpawnTable {
    fn pick<R: Rng + ?Sized>(&self, heat: f32, rng: &mut R) -> Option<&SpawnDef> {
        match self {
            SpawnTable::Weighted(defs) => weighted_choice(defs, |d| d.weight, rng),
            SpawnTable::Glitch { base, ok, bad } => {
                if rng.random::<f32>() < base + heat {
                    Some(bad)
                } else {
                    Some(ok)
                }
            }
        }
    }

    pub fn base_glitch(&self) -> Option<f32> {
        match self {
            SpawnTable::Glitch { base, .. } => Some(*base),
            SpawnTable::Weighted(_) => None,
        }
    }
}

/// Miss-driven difficulty bump
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heat {
    value: f32,
    tuning: HeatTuning,
}

impl Heat {
    pub fn new(tuning: HeatTuning) -> Self {
        Self { value: 0.0, tuning }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn add_miss(&mut self) {
        self.value = (self.value + self.tuning.per_miss).min(self.tuning.max_extra);
    }

    pub fn decay(&mut self, dt: f32) {
        if self.value > 0.0 {
            self.value = (self.value - self.tuning.decay_per_sec * dt).max(0.0);
        }
    }

    /// Amount added to the glitch chance
    pub fn extra(&self) -> f32 {
        self.value.min(self.tuning.max_extra)
    }
}

/// Interval spawner for one lane
#[derive(Debug, Clone)]
pub struct Spawner {
    lane: Lane,
    interval: f32,
    timer: f32,
    table: Rc<SpawnTable>,
    heat: Heat,
    /// Conveyor speed given to every robot
    speed: f32,
}

impl Spawner {
    pub fn new(lane: Lane, interval: f32, table: Rc<SpawnTable>, heat: HeatTuning, speed: f32) -> Self {
        Self {
            lane,
            interval,
            timer: 0.0,
            table,
            heat: Heat::new(heat),
            speed,
        }
    }

    pub fn lane(&self) -> &Lane {
        &self.lane
    }

    pub fn heat(&self) -> &Heat {
        &self.heat
    }

    pub fn add_miss(&mut self) {
        self.heat.add_miss();
    }

    /// Current BAD chance for glitch tables
    pub fn glitch_chance(&self) -> Option<f32> {
        self.table.base_glitch().map(|base| base + self.heat.extra())
    }

    /// Advance the timer; emit at most one robot
    ///
    /// Overflow past the interval carries into the next tick.
    pub fn tick(&mut self, dt: f32, ctx: &mut UpdateCtx) -> Option<Robot> {
        self.heat.decay(dt);
        self.timer += dt;
        if self.timer < self.interval {
            return None;
        }
        self.timer -= self.interval;

        let def = self.table.pick(self.heat.extra(), ctx.rng)?;
        let id = ctx.ids.next_id();
        let robot = Robot::spawn(id, self.lane.clone(), def, self.speed, ctx.rng, ctx.visuals);
        ctx.events.push(RoundEvent::Spawned {
            robot: id,
            lane: self.lane.id,
            kind: def.kind,
        });
        Some(robot)
    }
}
