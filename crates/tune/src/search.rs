//! Search-strategy configuration.

use serde::{Deserialize, Serialize};

/// Budget and strategy family for one tuning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchConfig {
    /// Replay candidates straight out of the design space.
    ReplayTrace {
        trials_per_iter: usize,
        total_trials: usize,
    },
    /// Evolve a population of candidates guided by the cost model and the
    /// per-target mutator table.
    Evolutionary {
        trials_per_iter: usize,
        total_trials: usize,
        population: usize,
    },
}

impl SearchConfig {
    pub fn total_trials(&self) -> usize {
        match self {
            SearchConfig::ReplayTrace { total_trials, .. }
            | SearchConfig::Evolutionary { total_trials, .. } => *total_trials,
        }
    }

    pub fn trials_per_iter(&self) -> usize {
        match self {
            SearchConfig::ReplayTrace {
                trials_per_iter, ..
            }
            | SearchConfig::Evolutionary {
                trials_per_iter, ..
            } => (*trials_per_iter).max(1),
        }
    }

    pub fn population(&self) -> usize {
        match self {
            SearchConfig::ReplayTrace { .. } => 1,
            SearchConfig::Evolutionary { population, .. } => (*population).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_accessors() {
        let config = SearchConfig::ReplayTrace {
            trials_per_iter: 0,
            total_trials: 10,
        };
        assert_eq!(config.total_trials(), 10);
        assert_eq!(config.trials_per_iter(), 1);
        assert_eq!(config.population(), 1);
    }
}
