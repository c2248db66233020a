//! Per-run settings shared by every action of a method.

use chrono::NaiveDate;
use rand::SeedableRng;
use rand::rngs::StdRng;

use deid_model::MethodConfig;

/// Settings a caller supplies for a run, independent of the method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Anchor for age and date arithmetic.
    pub today: NaiveDate,
    /// Seed for RandomOffset; entropy when `None`.
    pub seed: Option<u64>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            today: chrono::Local::now().date_naive(),
            seed: None,
        }
    }
}

impl RunOptions {
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Method-level state read by actions: the over-age flag, the salt and the
/// run options.
#[derive(Debug, Clone)]
pub struct MethodContext {
    pub method_id: String,
    pub cap_overage: bool,
    pub salt: String,
    pub today: NaiveDate,
    seed: Option<u64>,
}

impl MethodContext {
    pub fn new(method: &MethodConfig, options: RunOptions) -> Self {
        Self {
            method_id: method.id.clone(),
            cap_overage: method.cap_overage,
            salt: method.salt.clone(),
            today: options.today,
            seed: options.seed,
        }
    }

    /// Random source for the action at `position` in the plan.
    ///
    /// Seeded runs give each column its own deterministic stream.
    pub fn rng_for(&self, position: usize) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(position as u64)),
            None => StdRng::from_entropy(),
        }
    }
}
