//! Builder state machine for [`BbHash`] (spec.md §4.4):
//! `Collecting -> Building -> Built | Failed`.

use super::bbhash::{self, BbHash};
use crate::error::{MaphError, Result};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderState {
    Collecting,
    Building,
    Built,
    Failed,
}

/// Default bound on the number of BBHash levels attempted before giving
/// up. With `gamma >= 1.25` the remaining key set shrinks geometrically
/// per level, so this is a generous ceiling, not a tight budget.
pub const DEFAULT_MAX_LEVELS: usize = 64;

/// Accumulates a key multiset (deduplicated by byte-equality) and builds
/// a [`BbHash`] from it. `gamma`/`lambda`/`bucket_size` are accepted for
/// API parity with other MPH families (spec.md §4.4 names them as
/// shared, family-specific tunables); this family (BBHash) only consumes
/// `gamma` and `max_pilot_search` (reinterpreted as a level budget,
/// since BBHash has no pilot-search step) — `lambda` and `bucket_size`
/// are validated but otherwise unused by this family, as spec.md §4.4
/// anticipates ("tunables differ per family").
pub struct BbHashBuilder {
    keys: HashSet<Vec<u8>>,
    seed: u64,
    gamma: f64,
    lambda: f64,
    bucket_size: f64,
    max_pilot_search: usize,
    state: BuilderState,
}

impl Default for BbHashBuilder {
    fn default() -> Self {
        Self {
            keys: HashSet::new(),
            seed: 0,
            gamma: 2.0,
            lambda: 1.0,
            bucket_size: 4.0,
            max_pilot_search: DEFAULT_MAX_LEVELS,
            state: BuilderState::Collecting,
        }
    }
}

impl BbHashBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> BuilderState {
        self.state
    }

    pub fn add(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.keys.insert(key.into());
        self
    }

    pub fn add_all<I, K>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        for k in iter {
            self.add(k);
        }
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    pub fn with_bucket_size(mut self, bucket_size: f64) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    pub fn with_max_pilot_search(mut self, attempts: usize) -> Self {
        self.max_pilot_search = attempts;
        self
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// Deterministic function of (sorted-deduplicated keys, seed,
    /// tunables). Transitions `Collecting -> Building`, then `Built` on
    /// success or `Failed` on unresolved collisions after the configured
    /// level budget.
    pub fn build(&mut self) -> Result<BbHash> {
        self.state = BuilderState::Building;

        if self.gamma < 1.0 {
            self.state = BuilderState::Failed;
            return Err(MaphError::OptimizationFailed(
                "gamma must be >= 1.0".into(),
            ));
        }
        if self.lambda <= 0.0 {
            self.state = BuilderState::Failed;
            return Err(MaphError::OptimizationFailed(
                "lambda must be > 0".into(),
            ));
        }
        if self.bucket_size <= 0.0 {
            self.state = BuilderState::Failed;
            return Err(MaphError::OptimizationFailed(
                "bucket_size must be > 0".into(),
            ));
        }
        if self.max_pilot_search == 0 {
            self.state = BuilderState::Failed;
            return Err(MaphError::OptimizationFailed(
                "max_pilot_search must be > 0".into(),
            ));
        }

        // Sort so construction is a pure function of the *set* of keys,
        // not of insertion order.
        let mut keys: Vec<Vec<u8>> = self.keys.iter().cloned().collect();
        keys.sort();

        match bbhash::build(&keys, self.seed, self.gamma, self.max_pilot_search) {
            Ok(mph) => {
                self.state = BuilderState::Built;
                Ok(mph)
            }
            Err(e) => {
                self.state = BuilderState::Failed;
                Err(e)
            }
        }
    }
}
