use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Process-wide deterministic random stream.
///
/// Every stochastic decision in a world draws from one of these. The stream
/// is persisted as (seed, word position), which reproduces it exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimRandom {
    seed: u64,
    rng: ChaCha8Rng,
}

impl Default for SimRandom {
    fn default() -> Self {
        Self::new(0)
    }
}

impl SimRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Rebuild a stream at a saved position.
    pub fn from_parts(seed: u64, word_pos: u128) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        rng.set_word_pos(word_pos);
        Self { seed, rng }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn word_pos(&self) -> u128 {
        self.rng.get_word_pos()
    }

    /// Uniform integer in `0..max`; zero when `max <= 0`.
    pub fn random_int(&mut self, max: i32) -> i32 {
        if max <= 0 {
            return 0;
        }
        self.rng.gen_range(0..max)
    }

    /// Uniform float in `[0, 1)`.
    pub fn random_float(&mut self) -> f32 {
        self.rng.r#gen::<f32>()
    }

    /// Uniform float in `[-1, 1)`.
    pub fn crandom_float(&mut self) -> f32 {
        2.0 * self.random_float() - 1.0
    }
}
