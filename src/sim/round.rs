//! Round controller state
//!
//! A [`Round`] owns everything live in one play of a level: lanes and
//! spawners, the robot set, lane halts, the RNG and the scoreboard. It is
//! advanced by [`super::tick::tick`]; this module covers setup, player
//! clicks and the read-only views handed out to renderers and the HUD.

use std::cmp::Ordering;
use std::rc::Rc;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::lane::Lane;
use super::robot::{ClickResponse, Robot, UpdateCtx};
use super::spawner::{SpawnDef, Spawner};
use super::state::{IdAllocator, Outcome, Phase, RoundEvent, RoundState, RoundStats};
use crate::audio::{AudioSink, Silent};
use crate::error::{ConfigDefect, SetupError};
use crate::level::{LevelPack, RoundPlan};
use crate::renderer::{LaneView, RobotView};
use crate::settings::Settings;

/// Result of a single click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Robot shut down and scored
    Hit,
    /// Robot shutting down; scored when its effect ends
    Pending,
    Miss,
    /// Round isn't running
    Ignored,
}

/// One play of a level
///
/// Every tick appends to the event log, and only [`Round::drain_events`]
/// empties it. Callers that keep a round alive must drain it each frame.
pub struct Round {
    plan: RoundPlan,
    pub(crate) settings: Settings,
    pub(crate) state: RoundState,
    pub(crate) spawners: Vec<Spawner>,
    /// Live robots, kept in (lane, t) order between ticks
    pub(crate) robots: Vec<Robot>,
    /// Seconds each lane stays stopped
    pub(crate) halts: Vec<f32>,
    pub(crate) rng: Pcg32,
    pub(crate) ids: IdAllocator,
    pub(crate) events: Vec<RoundEvent>,
    /// Events already scanned for sounds
    sounds_played: usize,
    audio: Box<dyn AudioSink>,
    defects: Vec<ConfigDefect>,
}

/// Stacking order: lane, then progress along it
pub(crate) fn by_lane_then_t(a: &Robot, b: &Robot) -> Ordering {
    a.lane_id().cmp(&b.lane_id()).then(a.t().total_cmp(&b.t()))
}

impl Round {
    /// Set up level `level` of `pack`
    ///
    /// Level data problems the round can live with are logged and kept in
    /// [`Round::defects`]; the rest fail here.
    pub fn new(pack: &LevelPack, level: usize, settings: &Settings, seed: u64) -> Result<Self, SetupError> {
        let mut defects = Vec::new();
        let settings = settings.clone().sanitized(&mut defects);
        let plan = pack.plan(level, &settings)?;
        defects.extend(plan.defects.iter().cloned());
        for defect in &defects {
            log::warn!("{defect}");
        }

        let mut round = Self {
            state: RoundState::new(plan.time, plan.goal, settings.hp),
            spawners: Vec::new(),
            robots: Vec::new(),
            halts: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
            ids: IdAllocator::default(),
            events: Vec::new(),
            sounds_played: 0,
            audio: Box::new(Silent),
            defects,
            plan,
            settings,
        };
        round.reset();
        log::info!(
            "Round `{}` ready: {} lane(s), goal {} in {}s, seed {seed}",
            round.plan.level_id,
            round.plan.lanes.len(),
            round.plan.goal,
            round.plan.time
        );
        Ok(round)
    }

    /// Route sound cues to `audio` instead of dropping them
    pub fn with_audio(mut self, audio: impl AudioSink + 'static) -> Self {
        self.audio = Box::new(audio);
        self
    }

    fn reset(&mut self) {
        let debug = self.state.debug;
        self.state = RoundState::new(self.plan.time, self.plan.goal, self.settings.hp);
        self.state.debug = debug;
        self.spawners = self
            .plan
            .lanes
            .iter()
            .map(|lane| {
                Spawner::new(
                    lane.clone(),
                    self.plan.interval,
                    Rc::clone(&self.plan.table),
                    self.settings.heat,
                    self.settings.robot_speed,
                )
            })
            .collect();
        self.robots.clear();
        self.halts = vec![0.0; self.plan.lanes.len()];
    }

    /// Start the level over; the RNG stream carries on
    pub fn restart(&mut self) {
        log::info!("Restarting round `{}`", self.plan.level_id);
        self.reset();
    }

    pub fn toggle_pause(&mut self) {
        self.state.phase = match self.state.phase {
            Phase::Running => Phase::Paused,
            Phase::Paused => Phase::Running,
            over => over,
        };
    }

    pub fn toggle_debug(&mut self) {
        self.state.debug = !self.state.debug;
    }

    pub(crate) fn sort_robots(&mut self) {
        self.robots.sort_by(by_lane_then_t);
    }

    /// Resolve a click at `point`
    ///
    /// The top-most robot under the cursor takes it. Anything else is a
    /// miss and heats up every spawner.
    pub fn click(&mut self, point: Vec2) -> ClickOutcome {
        if self.state.phase != Phase::Running {
            return ClickOutcome::Ignored;
        }
        self.sort_robots();

        let radius = self.settings.hit_radius;
        let target = self.robots.iter().rposition(|r| r.hit_test(point, radius));
        let response = match target {
            Some(index) => {
                let mut ctx = UpdateCtx {
                    rng: &mut self.rng,
                    ids: &mut self.ids,
                    visuals: &self.settings.visuals,
                    events: &mut self.events,
                };
                let response = self.robots[index].on_clicked(&mut ctx);
                if response == ClickResponse::Immediate {
                    let robot = self.robots.remove(index);
                    self.state.hits += 1;
                    self.events.push(RoundEvent::Defused { robot: robot.id() });
                }
                response
            }
            None => ClickResponse::NoHit,
        };

        match response {
            ClickResponse::Immediate => ClickOutcome::Hit,
            ClickResponse::Deferred => ClickOutcome::Pending,
            ClickResponse::NoHit => {
                self.state.misses += 1;
                for spawner in &mut self.spawners {
                    spawner.add_miss();
                }
                self.events.push(RoundEvent::Missed);
                ClickOutcome::Miss
            }
        }
    }

    /// Put a robot at the start of `lane` outside the spawn schedule
    pub fn inject(&mut self, lane: usize, def: &SpawnDef) -> Option<u32> {
        let lane = self.plan.lanes.get(lane)?.clone();
        let id = self.ids.next_id();
        let robot = Robot::spawn(
            id,
            lane,
            def,
            self.settings.robot_speed,
            &mut self.rng,
            &self.settings.visuals,
        );
        self.events.push(RoundEvent::Spawned {
            robot: id,
            lane: robot.lane_id(),
            kind: def.kind,
        });
        self.robots.push(robot);
        self.sort_robots();
        Some(id)
    }

    pub(crate) fn finish(&mut self, outcome: Outcome) {
        self.state.phase = Phase::Over(outcome);
        self.events.push(RoundEvent::Finished(outcome));
        log::info!(
            "Round `{}` over: {:?} with {}/{} produced, {} HP, {:.0}% accuracy",
            self.plan.level_id,
            outcome,
            self.state.production,
            self.state.goal,
            self.state.hp,
            self.state.accuracy()
        );
    }

    /// Hand new sound cues to the audio sink; failures don't matter
    pub(crate) fn play_sounds(&mut self) {
        for event in &self.events[self.sounds_played..] {
            if let RoundEvent::Sound(effect) = event
                && let Err(err) = self.audio.play(*effect)
            {
                log::debug!("Sound {} not played: {err}", effect.key());
            }
        }
        self.sounds_played = self.events.len();
    }

    /// Take every event since the last drain, leaving the log empty
    pub fn drain_events(&mut self) -> Vec<RoundEvent> {
        self.sounds_played = 0;
        std::mem::take(&mut self.events)
    }

    pub fn state(&self) -> &RoundState {
        &self.state
    }

    pub fn level_id(&self) -> &str {
        &self.plan.level_id
    }

    pub fn level_name(&self) -> &str {
        &self.plan.name
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn robots(&self) -> &[Robot] {
        &self.robots
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.plan.lanes
    }

    pub fn spawners(&self) -> &[Spawner] {
        &self.spawners
    }

    pub fn is_halted(&self, lane: usize) -> bool {
        self.halts.get(lane).is_some_and(|secs| *secs > 0.0)
    }

    pub fn defects(&self) -> &[ConfigDefect] {
        &self.defects
    }

    /// Robots in draw order (top-most last)
    pub fn views(&self) -> Vec<RobotView> {
        let radius = self.settings.hit_radius;
        self.robots.iter().map(|r| RobotView::of(r, radius)).collect()
    }

    pub fn lane_views(&self) -> Vec<LaneView> {
        self.plan
            .lanes
            .iter()
            .map(|lane| LaneView::of(lane, self.is_halted(lane.id)))
            .collect()
    }

    /// HUD / result snapshot
    pub fn stats(&self) -> RoundStats {
        let state = &self.state;
        RoundStats {
            level_id: self.plan.level_id.clone(),
            hits: state.hits,
            misses: state.misses,
            accuracy: state.accuracy(),
            production: state.production,
            goal: state.goal,
            time_left: state.time_left,
            hp: state.hp,
            live_robots: self.robots.len(),
            outcome: state.outcome(),
            heat: if state.debug {
                self.spawners.iter().map(|s| s.heat().value()).collect()
            } else {
                Vec::new()
            },
        }
    }
}

/// One-lane round on a bare horizontal line from (0, 360) to (1280, 360)
#[cfg(test)]
pub(crate) fn line_round(level: &str, settings: Settings) -> Round {
    let json = format!(
        r#"{{
            "maps": [{{ "map_id": "line", "paths": [{{ "points": [[0.0, 0.5], [1.0, 0.5]] }}],
                        "stations": {{ "ts": [] }} }}],
            "levels": [{level}]
        }}"#
    );
    let pack = LevelPack::from_json(&json).unwrap();
    Round::new(&pack, 0, &settings, 7).unwrap()
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::audio::SoundEffect;
    use crate::consts::SIM_DT;
    use crate::audio::AudioError;
    use crate::renderer::animation::VisualCatalog;
    use crate::sim::robot::{HazardTraits, RobotKind, Traits};
    use crate::sim::tick::{TickInput, tick};

    const QUIET: &str = r#"{ "level_id": "Q", "map": "line", "time": 100, "goal": 3,
        "spawn": { "interval": 1000, "robots": [{ "type": "OK" }] } }"#;

    fn settings(visuals: VisualCatalog) -> Settings {
        Settings {
            robot_speed: 0.01,
            visuals,
            ..Settings::default()
        }
    }

    fn bad(fuse: f32) -> SpawnDef {
        SpawnDef::new(RobotKind::Bad, 0.35).with_traits(Traits::Hazard(HazardTraits {
            fuse_secs: Some(fuse),
            fuse_jitter: 0.0,
            ..HazardTraits::for_kind(RobotKind::Bad)
        }))
    }

    #[test]
    fn test_new_round() {
        let round = line_round(QUIET, Settings::default());
        assert_eq!(round.level_id(), "Q");
        assert_eq!(round.lanes().len(), 1);
        assert_eq!(round.spawners().len(), 1);
        assert_eq!(round.state().phase, Phase::Running);
        assert_eq!(round.state().hp, 3);
        assert!(round.robots().is_empty());
        assert!(round.defects().is_empty());
    }

    #[test]
    fn test_bad_settings_become_defects() {
        let settings = Settings {
            hit_radius: -1.0,
            ..Settings::default()
        };
        let round = line_round(QUIET, settings);
        assert_eq!(round.defects(), &[ConfigDefect::BadSetting { name: "hit_radius" }]);
        assert_eq!(round.settings().hit_radius, crate::consts::ROBOT_RADIUS);
    }

    #[test]
    fn test_click_hit_and_miss() {
        let mut round = line_round(QUIET, settings(VisualCatalog::empty()));
        round.inject(0, &bad(5.0)).unwrap();
        assert_eq!(round.views().len(), 1);
        assert!(round.views()[0].interactive);

        assert_eq!(round.click(Vec2::new(600.0, 100.0)), ClickOutcome::Miss);
        assert_eq!(round.click(Vec2::new(5.0, 362.0)), ClickOutcome::Hit);
        assert!(round.robots().is_empty());
        assert_eq!(round.state().hits, 1);
        assert_eq!(round.state().misses, 1);
        assert_eq!(round.state().accuracy(), 50.0);

        let events = round.drain_events();
        assert!(events.contains(&RoundEvent::Missed));
        assert!(events.contains(&RoundEvent::Sound(crate::audio::SoundEffect::ShutDown)));
    }

    #[test]
    fn test_click_takes_topmost_robot() {
        let mut round = line_round(QUIET, settings(VisualCatalog::empty()));
        let first = round.inject(0, &bad(5.0)).unwrap();
        let second = round.inject(0, &bad(5.0)).unwrap();
        assert_eq!(round.click(Vec2::new(0.0, 360.0)), ClickOutcome::Hit);
        // Equal t keeps spawn order, so the later robot is on top
        assert_eq!(round.robots().len(), 1);
        assert_eq!(round.robots()[0].id(), first);
        assert_ne!(first, second);
    }

    #[test]
    fn test_ok_robots_take_no_clicks() {
        let mut round = line_round(QUIET, settings(VisualCatalog::empty()));
        round.inject(0, &SpawnDef::new(RobotKind::Ok, 0.35)).unwrap();
        assert_eq!(round.click(Vec2::new(0.0, 360.0)), ClickOutcome::Miss);
        assert_eq!(round.robots().len(), 1);
    }

    #[test]
    fn test_clicks_ignored_unless_running() {
        let mut round = line_round(QUIET, Settings::default());
        round.toggle_pause();
        assert_eq!(round.click(Vec2::ZERO), ClickOutcome::Ignored);
        assert_eq!(round.state().misses, 0);
    }

    #[test]
    fn test_misses_heat_every_spawner() {
        let level = r#"{ "level_id": "G", "map": "line", "spawn": { "glitch_chance": 0.1 } }"#;
        let mut round = line_round(level, Settings::default());
        round.toggle_debug();
        for _ in 0..10 {
            round.click(Vec2::new(-500.0, -500.0));
        }
        let chance = round.spawners()[0].glitch_chance().unwrap();
        assert!((chance - (0.1 + crate::consts::MAX_EXTRA_GLITCH)).abs() < 1e-6);
        let stats = round.stats();
        assert_eq!(stats.heat.len(), 1);
        assert_eq!(stats.accuracy, 0.0);
    }

    #[test]
    fn test_stats_hide_heat_outside_debug() {
        let round = line_round(QUIET, Settings::default());
        let stats = round.stats();
        assert!(stats.heat.is_empty());
        let json = serde_json::to_string(&stats).unwrap();
        assert!(!json.contains("heat"));
        assert!(json.contains("\"accuracy\":100.0"));
    }

    #[test]
    fn test_lane_views() {
        let round = line_round(QUIET, Settings::default());
        let views = round.lane_views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].points, vec![Vec2::new(0.0, 360.0), Vec2::new(1280.0, 360.0)]);
        assert!(views[0].stations.is_empty());
        assert!(!views[0].halted);
    }

    /// Counts every cue and plays none of them
    struct BrokenSpeaker(Rc<Cell<usize>>);

    impl AudioSink for BrokenSpeaker {
        fn play(&mut self, _effect: SoundEffect) -> Result<(), AudioError> {
            self.0.set(self.0.get() + 1);
            Err(AudioError::Backend("device unplugged".into()))
        }
    }

    fn click_at_entry() -> TickInput {
        TickInput {
            clicks: vec![Vec2::new(0.0, 360.0)],
            ..Default::default()
        }
    }

    #[test]
    fn test_failing_audio_leaves_round_untouched() {
        let attempts = Rc::new(Cell::new(0));
        let mut quiet = line_round(QUIET, settings(VisualCatalog::empty()));
        let mut broken = line_round(QUIET, settings(VisualCatalog::empty()))
            .with_audio(BrokenSpeaker(attempts.clone()));

        for round in [&mut quiet, &mut broken] {
            // One goes off by itself, the other gets clicked
            round.inject(0, &bad(0.1)).unwrap();
            round.inject(0, &bad(5.0)).unwrap();
            tick(round, &click_at_entry(), SIM_DT);
            for _ in 0..30 {
                tick(round, &TickInput::default(), SIM_DT);
            }
        }

        assert_eq!(attempts.get(), 2);
        assert_eq!(broken.state().phase, Phase::Running);
        assert_eq!(quiet.state(), broken.state());
        assert_eq!(quiet.views(), broken.views());
        let events = broken.drain_events();
        assert!(events.contains(&RoundEvent::Sound(SoundEffect::Boom)));
        assert!(events.contains(&RoundEvent::Sound(SoundEffect::ShutDown)));
        assert_eq!(quiet.drain_events(), events);
    }

    #[test]
    fn test_drain_empties_the_event_log() {
        let attempts = Rc::new(Cell::new(0));
        let mut round = line_round(QUIET, settings(VisualCatalog::empty()))
            .with_audio(BrokenSpeaker(attempts.clone()));

        round.inject(0, &bad(5.0)).unwrap();
        tick(&mut round, &click_at_entry(), SIM_DT);
        assert!(!round.drain_events().is_empty());
        assert!(round.drain_events().is_empty());
        assert_eq!(attempts.get(), 1);

        // Cues after a drain still reach the sink, once each
        round.inject(0, &bad(5.0)).unwrap();
        tick(&mut round, &click_at_entry(), SIM_DT);
        tick(&mut round, &TickInput::default(), SIM_DT);
        assert_eq!(attempts.get(), 2);
        let events = round.drain_events();
        assert_eq!(
            events.iter().filter(|e| matches!(e, RoundEvent::Sound(_))).count(),
            1
        );
    }
}
