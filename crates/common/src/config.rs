use serde::{Deserialize, Serialize};

use crate::clock::DEFAULT_MSEC_PER_TICK;

/// Build number written into archives. Restore code branches on it to
/// back-fill fields that older builds did not write.
pub const BUILD_NUMBER: u32 = 3;
/// First shipped build.
pub const INITIAL_RELEASE_BUILD: u32 = 1;

/// Per-world session settings, fixed at level load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldConfig {
    pub msec_per_tick: u32,
    pub seed: u64,
    pub build: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            msec_per_tick: DEFAULT_MSEC_PER_TICK,
            seed: 0,
            build: BUILD_NUMBER,
        }
    }
}

impl WorldConfig {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }
}
