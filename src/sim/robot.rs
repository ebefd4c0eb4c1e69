//! Robot state machine
//!
//! Every robot rides its lane by arc-length parameter `t`, stops at each
//! station for a dwell, and ends in one of a few terminal states:
//! - reached the goal (`t == 1`)
//! - replaced by a mutated copy of itself
//! - exploded, or shut down by a click

use std::rc::Rc;

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::lane::Lane;
use super::spawner::{SpawnDef, weighted_choice};
use super::state::{IdAllocator, RoundEvent};
use crate::audio::SoundEffect;
use crate::consts::*;
use crate::renderer::animation::{Animator, Clip, VisualCatalog};

/// Robot variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum RobotKind {
    /// Good unit; counts toward production at the goal
    Ok,
    /// Rogue unit with a fuse; click it before it blows
    Bad,
    /// Fuse without jitter; halts its lane when it goes off
    Exploder,
    /// No fuse; costs extra HP if it reaches the goal
    Runner,
}

impl RobotKind {
    /// Resolve a level-file type name
    pub fn from_type_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_uppercase().as_str() {
            "OK" => Some(RobotKind::Ok),
            "BAD" => Some(RobotKind::Bad),
            "BAD_EXPLODER" => Some(RobotKind::Exploder),
            "BAD_RUNNER" => Some(RobotKind::Runner),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            RobotKind::Ok => "OK",
            RobotKind::Bad => "BAD",
            RobotKind::Exploder => "BAD_EXPLODER",
            RobotKind::Runner => "BAD_RUNNER",
        }
    }

    /// Rogue variants: clickable, penalized at the goal
    pub fn is_bad(&self) -> bool {
        !matches!(self, RobotKind::Ok)
    }

    /// Clip played while the robot is just riding along
    pub fn idle_clip(&self) -> Clip {
        match self {
            RobotKind::Ok => Clip::Ok,
            _ => Clip::BadLoop,
        }
    }
}

/// Chance that an OK robot breaks at a station
#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Flat(f32),
    /// Indexed by station; stations past the list use `fallback`
    PerStation { probs: Vec<f32>, fallback: f32 },
}

impl Failure {
    pub fn at(&self, station: usize) -> f32 {
        match self {
            Failure::Flat(p) => *p,
            Failure::PerStation { probs, fallback } => {
                probs.get(station).copied().unwrap_or(*fallback)
            }
        }
    }

    pub fn is_possible(&self) -> bool {
        match self {
            Failure::Flat(p) => *p > 0.0,
            Failure::PerStation { probs, fallback } => {
                *fallback > 0.0 || probs.iter().any(|p| *p > 0.0)
            }
        }
    }
}

/// OK robot configuration
#[derive(Debug, Clone)]
pub struct OkTraits {
    pub failure: Failure,
    /// What a failing robot can turn into
    pub variants: Vec<SpawnDef>,
}

impl Default for OkTraits {
    fn default() -> Self {
        Self {
            failure: Failure::Flat(0.0),
            variants: Vec::new(),
        }
    }
}

/// Fuse and penalty configuration for rogue robots
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardTraits {
    pub fuse_secs: Option<f32>,
    /// Fuse is offset by a uniform draw in [-jitter, jitter]
    pub fuse_jitter: f32,
    pub production_penalty: u32,
    pub hp_penalty_on_explode: u32,
    pub hp_penalty_on_goal: u32,
    /// Lane stops this long after the explosion
    pub halt_secs: f32,
    /// Hold the robot on screen while the BOOM clip plays
    pub explosion_effect: bool,
    /// Play the shutdown clip before removing a clicked robot
    pub shutdown_effect: bool,
}

impl HazardTraits {
    pub fn for_kind(kind: RobotKind) -> Self {
        match kind {
            RobotKind::Exploder => Self {
                fuse_secs: Some(BAD_FUSE_TIME),
                fuse_jitter: 0.0,
                production_penalty: 1,
                hp_penalty_on_explode: 0,
                hp_penalty_on_goal: 1,
                halt_secs: EXPLODER_PAUSE_TIME,
                explosion_effect: false,
                shutdown_effect: false,
            },
            RobotKind::Runner => Self {
                fuse_secs: None,
                fuse_jitter: 0.0,
                production_penalty: 0,
                hp_penalty_on_explode: 0,
                hp_penalty_on_goal: RUNNER_GOAL_PENALTY,
                halt_secs: 0.0,
                explosion_effect: false,
                shutdown_effect: false,
            },
            RobotKind::Bad | RobotKind::Ok => Self {
                fuse_secs: Some(BAD_FUSE_TIME),
                fuse_jitter: BAD_FUSE_JITTER,
                production_penalty: 1,
                hp_penalty_on_explode: 1,
                hp_penalty_on_goal: 1,
                halt_secs: 0.0,
                explosion_effect: true,
                shutdown_effect: true,
            },
        }
    }
}

/// Per-kind configuration carried by a spawn definition
#[derive(Debug, Clone)]
pub enum Traits {
    Ok(Rc<OkTraits>),
    Hazard(HazardTraits),
}

impl Traits {
    pub fn defaults_for(kind: RobotKind) -> Self {
        match kind {
            RobotKind::Ok => Traits::Ok(Rc::new(OkTraits::default())),
            _ => Traits::Hazard(HazardTraits::for_kind(kind)),
        }
    }
}

/// Penalties owed by a robot that went off
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Explosion {
    pub production_penalty: u32,
    pub hp_penalty: u32,
    pub halt_secs: f32,
}

/// Non-interactive effect a rogue robot plays before it is removed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TerminalEffect {
    Exploding { left: f32 },
    Defusing { left: f32 },
}

/// Runtime state of a rogue robot
#[derive(Debug, Clone)]
struct Hazard {
    traits: HazardTraits,
    fuse_left: Option<f32>,
    exploded: bool,
    escaped: bool,
    defused: bool,
    explosion: Option<Explosion>,
    effect: Option<TerminalEffect>,
}

enum HazardStep {
    Run,
    Hold,
    Done,
    Exploded,
}

impl Hazard {
    fn new(traits: HazardTraits, rng: &mut Pcg32) -> Self {
        let fuse_left = traits.fuse_secs.map(|fuse| {
            if traits.fuse_jitter > 0.0 {
                let spread = rng.random::<f32>() * 2.0 - 1.0;
                (fuse + spread * traits.fuse_jitter).max(0.0)
            } else {
                fuse
            }
        });
        Self {
            traits,
            fuse_left,
            exploded: false,
            escaped: false,
            defused: false,
            explosion: None,
            effect: None,
        }
    }

    /// Count down the effect, then the fuse
    fn step(&mut self, dt: f32) -> HazardStep {
        if let Some(effect) = &mut self.effect {
            let left = match effect {
                TerminalEffect::Exploding { left } | TerminalEffect::Defusing { left } => left,
            };
            *left -= dt;
            return if *left <= 0.0 {
                HazardStep::Done
            } else {
                HazardStep::Hold
            };
        }

        if let Some(fuse) = &mut self.fuse_left {
            *fuse -= dt;
            if *fuse <= 0.0 && !self.exploded {
                self.exploded = true;
                self.explosion = Some(Explosion {
                    production_penalty: self.traits.production_penalty,
                    hp_penalty: self.traits.hp_penalty_on_explode,
                    halt_secs: self.traits.halt_secs,
                });
                return HazardStep::Exploded;
            }
        }
        HazardStep::Run
    }
}

#[derive(Debug, Clone)]
enum Behavior {
    Ok(Rc<OkTraits>),
    Hazard(Hazard),
}

/// Outcome of clicking a robot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickResponse {
    /// Not a live, clickable target
    NoHit,
    /// Shut down and removed now
    Immediate,
    /// Shut down; removed and scored once the effect finishes
    Deferred,
}

/// Shared services a robot needs while updating
pub struct UpdateCtx<'a> {
    pub rng: &'a mut Pcg32,
    pub ids: &'a mut IdAllocator,
    pub visuals: &'a VisualCatalog,
    pub events: &'a mut Vec<RoundEvent>,
}

/// A robot on a conveyor
#[derive(Debug, Clone)]
pub struct Robot {
    id: u32,
    kind: RobotKind,
    lane: Lane,
    t: f32,
    dwell_left: f32,
    next_station: usize,
    speed: f32,
    dwell_secs: f32,
    alive: bool,
    behavior: Behavior,
    /// Set when this robot mutated; takes its slot at reconciliation
    replacement: Option<Box<Robot>>,
    anim: Animator,
}

impl Robot {
    /// New robot at the start of `lane`
    pub fn spawn(
        id: u32,
        lane: Lane,
        def: &SpawnDef,
        speed: f32,
        rng: &mut Pcg32,
        visuals: &VisualCatalog,
    ) -> Self {
        Self::at(id, lane, def, speed, 0.0, rng, visuals)
    }

    fn at(
        id: u32,
        lane: Lane,
        def: &SpawnDef,
        speed: f32,
        t: f32,
        rng: &mut Pcg32,
        visuals: &VisualCatalog,
    ) -> Self {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let behavior = match &def.traits {
            Traits::Ok(traits) => Behavior::Ok(Rc::clone(traits)),
            Traits::Hazard(traits) => Behavior::Hazard(Hazard::new(*traits, rng)),
        };
        let mut anim = Animator::default();
        anim.play(visuals, def.kind.idle_clip(), None);
        Self {
            id,
            kind: def.kind,
            alive: t < 1.0 && lane.path.length() > 0.0,
            lane,
            t,
            dwell_left: 0.0,
            next_station: 0,
            speed,
            dwell_secs: def.dwell_secs,
            behavior,
            replacement: None,
            anim,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn kind(&self) -> RobotKind {
        self.kind
    }

    pub fn lane(&self) -> &Lane {
        &self.lane
    }

    pub fn lane_id(&self) -> usize {
        self.lane.id
    }

    pub fn t(&self) -> f32 {
        self.t
    }

    pub fn dwell_left(&self) -> f32 {
        self.dwell_left
    }

    pub fn next_station(&self) -> usize {
        self.next_station
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn position(&self) -> Vec2 {
        self.lane.path.sample(self.t)
    }

    pub fn animator(&self) -> &Animator {
        &self.anim
    }

    fn hazard(&self) -> Option<&Hazard> {
        match &self.behavior {
            Behavior::Hazard(h) => Some(h),
            Behavior::Ok(_) => None,
        }
    }

    pub fn fuse_left(&self) -> Option<f32> {
        self.hazard().and_then(|h| h.fuse_left)
    }

    pub fn is_exploded(&self) -> bool {
        self.hazard().is_some_and(|h| h.exploded && !h.defused)
    }

    pub fn is_escaped(&self) -> bool {
        self.hazard().is_some_and(|h| h.escaped)
    }

    pub fn is_defused(&self) -> bool {
        self.hazard().is_some_and(|h| h.defused)
    }

    /// Pending explosion penalties
    pub fn explosion(&self) -> Option<Explosion> {
        self.hazard().and_then(|h| h.explosion)
    }

    pub fn goal_penalty(&self) -> u32 {
        self.hazard().map_or(0, |h| h.traits.hp_penalty_on_goal)
    }

    pub fn effect(&self) -> Option<TerminalEffect> {
        self.hazard().and_then(|h| h.effect)
    }

    pub fn has_replacement(&self) -> bool {
        self.replacement.is_some()
    }

    pub fn take_replacement(&mut self) -> Option<Robot> {
        self.replacement.take().map(|r| *r)
    }

    /// Robots playing a terminal effect don't move
    pub fn is_self_locking(&self) -> bool {
        self.effect().is_some()
    }

    /// Live rogue robot that can still be clicked
    pub fn is_interactive(&self) -> bool {
        self.alive && self.hazard().is_some_and(|h| h.effect.is_none())
    }

    /// Circle test around the current position
    pub fn hit_test(&self, point: Vec2, radius: f32) -> bool {
        self.is_interactive() && self.position().distance_squared(point) <= radius * radius
    }

    /// Advance one tick
    pub fn update(&mut self, dt: f32, stopped: bool, ctx: &mut UpdateCtx) {
        self.anim.advance(dt, ctx.visuals);
        if !self.alive {
            return;
        }

        let step = match &mut self.behavior {
            Behavior::Hazard(hazard) => hazard.step(dt),
            Behavior::Ok(_) => HazardStep::Run,
        };
        match step {
            HazardStep::Run => {}
            HazardStep::Hold => return,
            HazardStep::Done => {
                self.alive = false;
                return;
            }
            HazardStep::Exploded => {
                self.explode(ctx);
                return;
            }
        }

        self.travel(dt, stopped, ctx);

        if !self.alive
            && self.t >= 1.0
            && let Behavior::Hazard(hazard) = &mut self.behavior
            && !hazard.exploded
        {
            hazard.escaped = true;
            ctx.events.push(RoundEvent::Escaped { robot: self.id });
        }
    }

    fn explode(&mut self, ctx: &mut UpdateCtx) {
        ctx.events.push(RoundEvent::Sound(SoundEffect::Boom));
        ctx.events.push(RoundEvent::Exploded {
            robot: self.id,
            lane: self.lane.id,
        });

        let Behavior::Hazard(hazard) = &mut self.behavior else {
            return;
        };
        let secs = if hazard.traits.explosion_effect {
            ctx.visuals.effect_secs(Clip::Boom)
        } else {
            None
        };
        match secs {
            Some(secs) => {
                hazard.effect = Some(TerminalEffect::Exploding { left: secs });
                self.anim.play(ctx.visuals, Clip::Boom, None);
                ctx.events.push(RoundEvent::EffectStarted {
                    robot: self.id,
                    clip: Clip::Boom,
                    secs,
                });
            }
            None => self.alive = false,
        }
    }

    /// Dwell, move, and process stations
    fn travel(&mut self, dt: f32, stopped: bool, ctx: &mut UpdateCtx) {
        if self.dwell_left > 0.0 {
            self.dwell_left -= dt;
            if self.dwell_left <= 0.0 {
                self.dwell_left = 0.0;
                self.next_station += 1;
            }
            return;
        }

        if stopped || self.is_self_locking() {
            return;
        }

        self.t = (self.t + self.speed * dt).max(0.0);
        if self.t >= 1.0 {
            self.t = 1.0;
            self.alive = false;
            return;
        }

        let stations = Rc::clone(&self.lane.stations);
        while let Some(&station_t) = stations.get(self.next_station) {
            if station_t > self.t {
                break;
            }
            // Snap so a big dt can't skip a station
            self.t = station_t;
            self.reach_station(self.next_station, ctx);
            if !self.alive || self.is_self_locking() {
                return;
            }
            if self.dwell_secs > 0.0 {
                self.dwell_left = self.dwell_secs;
                return;
            }
            // Zero dwell passes straight through
            self.next_station += 1;
        }
    }

    fn reach_station(&mut self, station: usize, ctx: &mut UpdateCtx) {
        let traits = match &self.behavior {
            Behavior::Ok(traits) => Rc::clone(traits),
            Behavior::Hazard(_) => return,
        };
        let p = traits.failure.at(station);
        if p <= 0.0 || ctx.rng.random::<f32>() >= p {
            return;
        }
        if let Some(def) = weighted_choice(&traits.variants, |d| d.weight, ctx.rng) {
            self.mutate_into(def, ctx);
        }
    }

    /// Replace this robot with a `def` robot on the same trajectory
    fn mutate_into(&mut self, def: &SpawnDef, ctx: &mut UpdateCtx) {
        let id = ctx.ids.next_id();
        let mut next = Robot::at(
            id,
            self.lane.clone(),
            def,
            self.speed,
            self.t,
            ctx.rng,
            ctx.visuals,
        );
        next.dwell_left = self.dwell_left;
        next.next_station = self.next_station;
        next.dwell_secs = self.dwell_secs;
        if def.kind.is_bad() {
            next.anim
                .play(ctx.visuals, Clip::BadTransition, Some(def.kind.idle_clip()));
        }

        ctx.events.push(RoundEvent::Mutated {
            from: self.id,
            to: id,
            kind: def.kind,
        });
        self.replacement = Some(Box::new(next));
        self.alive = false;
    }

    /// Resolve a click that landed on this robot
    pub fn on_clicked(&mut self, ctx: &mut UpdateCtx) -> ClickResponse {
        if !self.is_interactive() {
            return ClickResponse::NoHit;
        }
        let Behavior::Hazard(hazard) = &mut self.behavior else {
            return ClickResponse::NoHit;
        };

        hazard.defused = true;
        // No explosion can follow a shutdown
        hazard.exploded = true;
        hazard.explosion = None;
        hazard.escaped = false;
        ctx.events.push(RoundEvent::Sound(SoundEffect::ShutDown));

        let secs = if hazard.traits.shutdown_effect {
            ctx.visuals.effect_secs(Clip::Shutdown)
        } else {
            None
        };
        match secs {
            Some(secs) => {
                hazard.effect = Some(TerminalEffect::Defusing { left: secs });
                self.anim.play(ctx.visuals, Clip::Shutdown, None);
                ctx.events.push(RoundEvent::EffectStarted {
                    robot: self.id,
                    clip: Clip::Shutdown,
                    secs,
                });
                ClickResponse::Deferred
            }
            None => {
                self.alive = false;
                ClickResponse::Immediate
            }
        }
    }
}
