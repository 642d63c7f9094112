//! Shared types for the simkit runtime.
//!
//! # Invariants
//! - Object ids are serials and are never reused within a world.
//! - All randomness flows through [`SimRandom`]; nothing reads a global RNG.
//! - Spawn args are immutable once an object is constructed.

pub mod clock;
pub mod config;
pub mod level;
pub mod random;
pub mod render_state;
pub mod spawn_args;
pub mod types;

pub use clock::{Clock, DEFAULT_MSEC_PER_TICK, ms_to_sec, sec_to_ms};
pub use config::{BUILD_NUMBER, INITIAL_RELEASE_BUILD, WorldConfig};
pub use level::{EntityDef, LevelDef};
pub use random::SimRandom;
pub use render_state::RenderState;
pub use spawn_args::{ConfigError, SpawnArgs};
pub use types::{ObjectId, Transform, angles_to_axis, axis_to_angles};
