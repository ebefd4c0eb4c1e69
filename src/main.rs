//! Rogue Factory headless driver
//!
//! Plays one level with a scripted clicker, feeding frames through a fixed
//! timestep accumulator, and prints the end-of-round stats.
//!
//! Usage:
//!   RUST_LOG=info cargo run --release -- --level 2 --seed 42

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::path::PathBuf;

    use anyhow::{Context, bail};
    use clap::Parser;
    use glam::Vec2;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    use rogue_factory::audio::LogAudio;
    use rogue_factory::consts::*;
    use rogue_factory::renderer::RobotView;
    use rogue_factory::sim::{Round, RoundEvent, TickInput, tick};
    use rogue_factory::{LevelPack, Settings};

    #[derive(Parser)]
    #[command(name = "rogue-factory")]
    #[command(about = "Play a Rogue Factory level headless with a scripted player")]
    struct Args {
        /// Level pack JSON (built-in levels when omitted)
        #[arg(long)]
        levels: Option<PathBuf>,
        /// Settings JSON (defaults when omitted or unreadable)
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Level index within the pack
        #[arg(long, default_value_t = 0)]
        level: usize,
        #[arg(long, default_value_t = 0x5EED)]
        seed: u64,
        /// Per-frame chance the player clicks a rogue robot it can see
        #[arg(long, default_value_t = 0.04)]
        reflex: f32,
        /// Seconds between rendered frames
        #[arg(long, default_value_t = 1.0 / 30.0)]
        frame: f32,
        /// Print stats as JSON
        #[arg(long)]
        json: bool,
    }

    /// Clicks at rogue robots, not always accurately
    struct ScriptedPlayer {
        rng: Pcg32,
        reflex: f32,
    }

    impl ScriptedPlayer {
        fn clicks(&mut self, views: &[RobotView]) -> Vec<Vec2> {
            let mut clicks = Vec::new();
            for view in views.iter().rev() {
                if !view.interactive || self.rng.random::<f32>() >= self.reflex {
                    continue;
                }
                let aim = Vec2::new(
                    self.rng.random_range(-1.0..=1.0),
                    self.rng.random_range(-1.0..=1.0),
                );
                clicks.push(view.position + aim * view.radius * 1.3);
            }
            clicks
        }
    }

    fn log_event(event: &RoundEvent) {
        match event {
            RoundEvent::Mutated { from, to, kind } => {
                log::debug!("Robot {from} failed a station and became {} #{to}", kind.type_name())
            }
            RoundEvent::Exploded { robot, lane } => log::info!("Robot {robot} exploded on lane {lane}"),
            RoundEvent::Escaped { robot } => log::info!("Robot {robot} escaped"),
            RoundEvent::LaneHalted { lane, secs } => log::info!("Lane {lane} halted for {secs}s"),
            RoundEvent::Finished(outcome) => log::info!("Finished: {outcome:?}"),
            other => log::trace!("{other:?}"),
        }
    }

    pub fn run() -> anyhow::Result<()> {
        let args = Args::parse();
        if !(args.frame.is_finite() && args.frame > 0.0) {
            bail!("--frame must be a positive number of seconds");
        }

        let settings = match &args.settings {
            Some(path) => Settings::load(path),
            None => Settings::default(),
        };
        let pack = match &args.levels {
            Some(path) => LevelPack::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => LevelPack::builtin(),
        };

        let audio = LogAudio::new(settings.sfx_volume);
        let mut round = Round::new(&pack, args.level, &settings, args.seed)
            .with_context(|| format!("setting up level {}", args.level))?
            .with_audio(audio);
        log::info!("Playing `{}` ({})", round.level_name(), round.level_id());

        let mut player = ScriptedPlayer {
            rng: Pcg32::seed_from_u64(args.seed.rotate_left(17)),
            reflex: args.reflex.clamp(0.0, 1.0),
        };

        let mut accumulator = 0.0;
        while !round.state().is_over() {
            accumulator += args.frame.min(0.1);

            let mut input = TickInput {
                clicks: player.clicks(&round.views()),
                ..Default::default()
            };
            let mut substeps = 0;
            while accumulator >= SIM_DT && substeps < MAX_SUBSTEPS {
                tick(&mut round, &input, SIM_DT);
                accumulator -= SIM_DT;
                substeps += 1;

                // Clicks are one-shot
                input.clicks.clear();
            }

            for event in round.drain_events() {
                log_event(&event);
            }
        }

        let stats = round.stats();
        if args.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!("Level:      {}", stats.level_id);
            println!("Outcome:    {:?}", stats.outcome);
            println!("Production: {}/{}", stats.production, stats.goal);
            println!("HP:         {}", stats.hp);
            println!("Time left:  {:.1}s", stats.time_left);
            println!(
                "Clicks:     {} hits, {} misses ({:.0}% accuracy)",
                stats.hits, stats.misses, stats.accuracy
            );
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    env_logger::init();
    headless::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is the wasm surface; there is nothing to run here
}
