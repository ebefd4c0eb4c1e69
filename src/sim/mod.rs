//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Caller-supplied dt only
//! - Seeded RNG only
//! - Stable iteration order (by lane, then progress)
//! - No rendering or platform dependencies

pub mod lane;
pub mod path;
pub mod robot;
pub mod round;
pub mod spawner;
pub mod state;
pub mod tick;

pub use lane::Lane;
pub use path::Path;
pub use robot::{ClickResponse, Robot, RobotKind};
pub use round::{ClickOutcome, Round};
pub use spawner::{Heat, SpawnDef, SpawnTable, Spawner, weighted_choice};
pub use state::{Outcome, Phase, RoundEvent, RoundState, RoundStats};
pub use tick::{Command, TickInput, tick};
