//! Fixed timestep simulation tick
//!
//! Advances a round: commands and clicks first, then the clock, spawning,
//! robot updates and finally reconciliation of everything that died.

use glam::Vec2;

use super::round::{Round, by_lane_then_t};
use super::robot::UpdateCtx;
use super::state::{Outcome, Phase, RoundEvent};

/// Key commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Restart,
    TogglePause,
    ToggleDebug,
}

/// Input for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Click positions in screen pixels, in arrival order
    pub clicks: Vec<Vec2>,
    pub commands: Vec<Command>,
}

/// Advance the round by `dt` seconds
pub fn tick(round: &mut Round, input: &TickInput, dt: f32) {
    let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };

    for command in &input.commands {
        match command {
            Command::Restart => round.restart(),
            Command::TogglePause => round.toggle_pause(),
            Command::ToggleDebug => round.toggle_debug(),
        }
    }
    for &point in &input.clicks {
        round.click(point);
    }

    if round.state.phase == Phase::Running {
        advance(round, dt);
    }
    round.play_sounds();
}

fn advance(round: &mut Round, dt: f32) {
    let state = &mut round.state;
    state.elapsed += dt;
    state.time_left -= dt;
    if state.time_left <= 0.0 {
        state.time_left = 0.0;
        let outcome = if state.production >= state.goal {
            Outcome::Win
        } else {
            Outcome::Lose
        };
        round.finish(outcome);
        return;
    }

    for halt in &mut round.halts {
        *halt = (*halt - dt).max(0.0);
    }

    {
        let mut ctx = UpdateCtx {
            rng: &mut round.rng,
            ids: &mut round.ids,
            visuals: &round.settings.visuals,
            events: &mut round.events,
        };
        for spawner in &mut round.spawners {
            if let Some(robot) = spawner.tick(dt, &mut ctx) {
                round.robots.push(robot);
            }
        }

        round.robots.sort_by(by_lane_then_t);
        for robot in &mut round.robots {
            let stopped = round.halts.get(robot.lane_id()).is_some_and(|secs| *secs > 0.0);
            robot.update(dt, stopped, &mut ctx);
        }
    }

    reconcile(round);
}

/// Remove dead robots and settle what they owe
fn reconcile(round: &mut Round) {
    let mut production_delta: i64 = 0;
    let mut hp_loss: i64 = 0;

    let robots = std::mem::take(&mut round.robots);
    let mut survivors = Vec::with_capacity(robots.len());
    for mut robot in robots {
        if robot.is_alive() {
            survivors.push(robot);
            continue;
        }
        // Mutated robots hand their slot to the replacement
        if let Some(next) = robot.take_replacement() {
            survivors.push(next);
            continue;
        }

        let id = robot.id();
        if !robot.kind().is_bad() {
            if robot.t() >= 1.0 {
                production_delta += 1;
                round.events.push(RoundEvent::Produced { robot: id });
            }
        } else if robot.is_defused() {
            round.state.hits += 1;
            round.events.push(RoundEvent::Defused { robot: id });
        } else if let Some(explosion) = robot.explosion() {
            production_delta -= i64::from(explosion.production_penalty);
            hp_loss += i64::from(explosion.hp_penalty);
            let lane = robot.lane_id();
            if explosion.halt_secs > 0.0
                && let Some(halt) = round.halts.get_mut(lane)
            {
                *halt = halt.max(explosion.halt_secs);
                round.events.push(RoundEvent::LaneHalted {
                    lane,
                    secs: explosion.halt_secs,
                });
            }
        } else if robot.is_escaped() {
            hp_loss += i64::from(robot.goal_penalty());
        }
    }
    round.robots = survivors;

    let state = &mut round.state;
    state.production = (i64::from(state.production) + production_delta).max(0) as u32;
    if hp_loss > 0 {
        state.hp = (i64::from(state.hp) - hp_loss).max(0) as i32;
        if state.hp == 0 {
            round.finish(Outcome::Lose);
            return;
        }
    }
    if state.production >= state.goal {
        round.finish(Outcome::Win);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::*;
    use crate::level::LevelPack;
    use crate::renderer::animation::VisualCatalog;
    use crate::settings::Settings;
    use crate::sim::round::line_round;
    use crate::sim::robot::{HazardTraits, RobotKind, Traits};
    use crate::sim::spawner::SpawnDef;

    /// OK-only level that spawns once every 1000s
    const QUIET: &str = r#"{ "level_id": "Q", "map": "line", "time": 100, "goal": 3,
        "spawn": { "interval": 1000, "robots": [{ "type": "OK" }] } }"#;

    fn settings(speed: f32, visuals: VisualCatalog) -> Settings {
        Settings {
            robot_speed: speed,
            visuals,
            ..Settings::default()
        }
    }

    fn hazard(kind: RobotKind, fuse: Option<f32>) -> SpawnDef {
        SpawnDef::new(kind, 0.35).with_traits(Traits::Hazard(HazardTraits {
            fuse_secs: fuse,
            fuse_jitter: 0.0,
            ..HazardTraits::for_kind(kind)
        }))
    }

    fn step(round: &mut Round, dt: f32) {
        tick(round, &TickInput::default(), dt);
    }

    #[test]
    fn test_ok_production_wins() {
        let level = r#"{ "level_id": "P", "map": "line", "time": 100, "goal": 3,
            "spawn": { "interval": 2.0, "robots": [{ "type": "OK" }] } }"#;
        let mut round = line_round(level, settings(0.5, VisualCatalog::empty()));

        // Each step spawns a robot that reaches the goal within the same step
        step(&mut round, 2.0);
        assert_eq!(round.state().production, 1);
        step(&mut round, 2.0);
        assert_eq!(round.state().phase, Phase::Running);
        step(&mut round, 2.0);
        assert_eq!(round.state().production, 3);
        assert_eq!(round.state().phase, Phase::Over(Outcome::Win));
        assert!(round.drain_events().contains(&RoundEvent::Finished(Outcome::Win)));

        // Over is terminal
        step(&mut round, 2.0);
        assert_eq!(round.state().production, 3);
    }

    #[test]
    fn test_bad_fuse_explosion_penalties() {
        let mut round = line_round(QUIET, settings(0.01, VisualCatalog::empty()));
        round.state.production = 2;
        let id = round.inject(0, &hazard(RobotKind::Bad, Some(2.0))).unwrap();

        step(&mut round, 1.0);
        assert_eq!(round.robots().len(), 1);
        step(&mut round, 1.0);
        assert!(round.robots().is_empty());
        assert_eq!(round.state().production, 1);
        assert_eq!(round.state().hp, 2);
        assert_eq!(round.state().phase, Phase::Running);
        assert!(round.drain_events().contains(&RoundEvent::Exploded { robot: id, lane: 0 }));
    }

    #[test]
    fn test_explosion_effect_delays_penalties() {
        let mut round = line_round(QUIET, settings(0.01, VisualCatalog::default()));
        round.inject(0, &hazard(RobotKind::Bad, Some(1.0))).unwrap();

        step(&mut round, 1.0);
        // BOOM is playing; nothing settled yet
        assert_eq!(round.robots().len(), 1);
        assert_eq!(round.state().hp, 3);
        assert!(!round.views()[0].interactive);

        step(&mut round, 1.0);
        assert!(round.robots().is_empty());
        assert_eq!(round.state().hp, 2);
    }

    #[test]
    fn test_production_never_negative() {
        let mut round = line_round(QUIET, settings(0.01, VisualCatalog::empty()));
        round.inject(0, &hazard(RobotKind::Bad, Some(0.5))).unwrap();
        step(&mut round, 1.0);
        assert_eq!(round.state().production, 0);
    }

    #[test]
    fn test_immediate_click_avoids_penalties() {
        let mut round = line_round(QUIET, settings(0.01, VisualCatalog::empty()));
        round.inject(0, &hazard(RobotKind::Bad, Some(2.0))).unwrap();

        let input = TickInput {
            clicks: vec![Vec2::new(0.0, 360.0)],
            ..Default::default()
        };
        tick(&mut round, &input, 1.0);
        assert!(round.robots().is_empty());
        assert_eq!(round.state().hits, 1);

        for _ in 0..3 {
            step(&mut round, 1.0);
        }
        assert_eq!(round.state().hp, 3);
        assert_eq!(round.state().accuracy(), 100.0);
    }

    #[test]
    fn test_deferred_click_scores_after_effect() {
        let mut round = line_round(QUIET, settings(0.01, VisualCatalog::default()));
        round.inject(0, &hazard(RobotKind::Bad, Some(0.3))).unwrap();

        let input = TickInput {
            clicks: vec![Vec2::new(0.0, 360.0)],
            ..Default::default()
        };
        // Shutdown clip is 5 x 0.06s
        tick(&mut round, &input, 0.2);
        assert_eq!(round.robots().len(), 1);
        assert_eq!(round.state().hits, 0);

        step(&mut round, 0.2);
        assert!(round.robots().is_empty());
        assert_eq!(round.state().hits, 1);
        // The fuse ran out during the effect but nothing exploded
        assert_eq!(round.state().hp, 3);
        assert_eq!(round.state().production, 0);
    }

    #[test]
    fn test_escaped_bad_costs_goal_penalty() {
        let mut round = line_round(QUIET, settings(0.5, VisualCatalog::empty()));
        round.inject(0, &hazard(RobotKind::Bad, Some(50.0))).unwrap();
        step(&mut round, 2.0);
        assert!(round.robots().is_empty());
        assert_eq!(round.state().hp, 2);
        assert_eq!(round.state().production, 0);
    }

    #[test]
    fn test_hp_loss_beats_win() {
        let level = r#"{ "level_id": "H", "map": "line", "time": 100, "goal": 1,
            "spawn": { "interval": 1000, "robots": [{ "type": "OK" }] } }"#;
        let mut round = line_round(level, settings(0.5, VisualCatalog::empty()));
        round.inject(0, &SpawnDef::new(RobotKind::Ok, 0.35)).unwrap();
        round.inject(0, &hazard(RobotKind::Runner, None)).unwrap();

        step(&mut round, 2.0);
        assert_eq!(round.state().production, 1);
        assert_eq!(round.state().hp, 0);
        assert_eq!(round.state().phase, Phase::Over(Outcome::Lose));
    }

    #[test]
    fn test_time_out() {
        let level = r#"{ "level_id": "T", "map": "line", "time": 1.5, "goal": 5,
            "spawn": { "interval": 0.5, "robots": [{ "type": "OK" }] } }"#;
        let mut round = line_round(level, settings(0.01, VisualCatalog::empty()));
        step(&mut round, 1.0);
        // One spawn per tick at most
        let live = round.robots().len();
        assert_eq!(live, 1);

        // The final tick freezes the round before anything spawns
        step(&mut round, 1.0);
        assert_eq!(round.state().time_left, 0.0);
        assert_eq!(round.state().phase, Phase::Over(Outcome::Lose));
        assert_eq!(round.robots().len(), live);
    }

    #[test]
    fn test_time_out_with_goal_met_wins() {
        let level = r#"{ "level_id": "T", "map": "line", "time": 1.0, "goal": 0,
            "spawn": { "interval": 1000, "robots": [{ "type": "OK" }] } }"#;
        let mut round = line_round(level, Settings::default());
        step(&mut round, 5.0);
        assert_eq!(round.state().phase, Phase::Over(Outcome::Win));
    }

    #[test]
    fn test_exploder_halts_its_lane() {
        let mut round = line_round(QUIET, settings(0.01, VisualCatalog::empty()));
        round.inject(0, &hazard(RobotKind::Exploder, Some(1.0))).unwrap();
        round.inject(0, &SpawnDef::new(RobotKind::Ok, 0.35)).unwrap();

        step(&mut round, 1.0);
        assert_eq!(round.robots().len(), 1);
        assert!(round.is_halted(0));
        assert!(round.lane_views()[0].halted);
        // No HP cost, one production lost (already at zero)
        assert_eq!(round.state().hp, 3);

        let t = round.robots()[0].t();
        step(&mut round, 1.0);
        assert_eq!(round.robots()[0].t(), t);

        for _ in 0..5 {
            step(&mut round, 1.0);
        }
        assert!(!round.is_halted(0));
        assert!(round.robots()[0].t() > t);
    }

    #[test]
    fn test_mutation_keeps_slot_and_trajectory() {
        let level = r#"{ "level_id": "M", "map": "line", "time": 100, "goal": 50,
            "spawn": { "interval": 1000, "robots": [{ "type": "OK" }] } }"#;
        let json = format!(
            r#"{{
                "maps": [{{ "map_id": "line", "paths": [{{ "points": [[0.0, 0.5], [1.0, 0.5]] }}],
                            "stations": {{ "ts": [0.2] }} }}],
                "levels": [{level}]
            }}"#
        );
        let pack = LevelPack::from_json(&json).unwrap();
        let mut round = Round::new(&pack, 0, &settings(0.25, VisualCatalog::empty()), 3).unwrap();
        let def: crate::level::RobotDefSpec = serde_json::from_str(
            r#"{ "type": "OK", "fail_prob": 1.0, "variants": [{ "type": "BAD", "fuse_time": 50 }] }"#,
        )
        .unwrap();
        let mut defects = Vec::new();
        let def = crate::level::spawn_def(&def, round.settings(), &mut defects).unwrap();
        assert!(defects.is_empty());
        let id = round.inject(0, &def).unwrap();

        step(&mut round, 1.0);
        let robots = round.robots();
        assert_eq!(robots.len(), 1);
        assert_ne!(robots[0].id(), id);
        assert_eq!(robots[0].kind(), RobotKind::Bad);
        assert_eq!(robots[0].t(), 0.2);
        assert_eq!(robots[0].next_station(), 0);

        // The replacement still owes the dwell at the station it failed at
        step(&mut round, 1.0);
        assert_eq!(round.robots()[0].t(), 0.2);
        assert!(round.robots()[0].dwell_left() > 0.0);
    }

    #[test]
    fn test_pause_and_restart() {
        let level = r#"{ "level_id": "R", "map": "line", "time": 100, "goal": 50,
            "spawn": { "interval": 1.0, "robots": [{ "type": "OK" }] } }"#;
        let mut round = line_round(level, settings(0.01, VisualCatalog::empty()));
        step(&mut round, 1.0);
        assert_eq!(round.state().time_left, 99.0);

        let pause = TickInput {
            commands: vec![Command::TogglePause],
            ..Default::default()
        };
        tick(&mut round, &pause, 1.0);
        assert_eq!(round.state().phase, Phase::Paused);
        step(&mut round, 1.0);
        assert_eq!(round.state().time_left, 99.0);

        tick(&mut round, &pause, 1.0);
        assert_eq!(round.state().phase, Phase::Running);
        assert_eq!(round.state().time_left, 98.0);
        assert!(!round.robots().is_empty());

        let restart = TickInput {
            commands: vec![Command::Restart],
            ..Default::default()
        };
        tick(&mut round, &restart, 0.0);
        assert_eq!(round.state().time_left, 100.0);
        assert!(round.robots().is_empty());
        assert_eq!(round.state().phase, Phase::Running);
    }

    #[test]
    fn test_bad_dt_is_ignored() {
        let mut round = line_round(QUIET, Settings::default());
        step(&mut round, f32::NAN);
        step(&mut round, -3.0);
        step(&mut round, f32::INFINITY);
        assert_eq!(round.state().time_left, 100.0);
    }

    #[test]
    fn test_determinism() {
        let pack = LevelPack::builtin();
        let settings = Settings::default();
        let mut a = Round::new(&pack, 4, &settings, 99999).unwrap();
        let mut b = Round::new(&pack, 4, &settings, 99999).unwrap();

        for i in 0..1800 {
            let mut input = TickInput::default();
            if i % 45 == 0 {
                input.clicks.push(Vec2::new(400.0 + (i % 7) as f32 * 60.0, 260.0));
            }
            if i == 900 {
                input.commands.push(Command::ToggleDebug);
            }
            tick(&mut a, &input, SIM_DT);
            tick(&mut b, &input, SIM_DT);
        }

        assert_eq!(a.stats(), b.stats());
        assert_eq!(a.views(), b.views());
        assert_eq!(a.drain_events(), b.drain_events());
    }
}
