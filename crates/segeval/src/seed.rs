//! Deterministic setup of the tensor backend.

use std::time::{SystemTime, UNIX_EPOCH};

use burn::prelude::*;

/// Random seed configuration.
#[derive(Config, Debug)]
pub struct SeedConfig {
    /// Seed for the backend RNG. Derived from the clock and process id when unset.
    #[config(default = "None")]
    pub seed: Option<u64>,
}

/// Seeds the random number generator of backend `B` and returns the seed used.
pub fn seed_backend<B: Backend>(config: &SeedConfig) -> u64 {
    let seed = config.seed.unwrap_or_else(entropy_seed);
    B::seed(seed);
    tracing::info!(seed, "seeded backend");
    seed
}

fn entropy_seed() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    now.wrapping_add(u64::from(std::process::id()))
}
