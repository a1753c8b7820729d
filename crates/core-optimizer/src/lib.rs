//! Slot assignment and constraint validation.
//!
//! The optimizer maps N colors onto K hardware slots and schedules the
//! manual swaps needed when N > K. It never fails: infeasible prints
//! surface as constraint violations, not errors. Strategies are pluggable
//! through [`OptimizationStrategy`]; `greedy` is the canonical one.

use core_model::{ConstraintValidation, GcodeStats, OptimizationResult, SystemConfiguration};
use std::collections::BTreeMap;
use tracing::info;

mod constraints;
mod greedy;

pub use constraints::validate;
pub use greedy::{DEFAULT_SECONDS_PER_SWAP, GreedyStrategy};

/// A slot-assignment algorithm. Implementations must always produce a
/// result; feasibility is the validator's concern.
pub trait OptimizationStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn optimize(&self, stats: &GcodeStats, config: &SystemConfiguration) -> OptimizationResult;
}

/// Named strategy registry. Ships with the built-ins; consumers may plug
/// their own before lookup.
pub struct StrategyRegistry {
    strategies: BTreeMap<&'static str, Box<dyn OptimizationStrategy>>,
}

impl StrategyRegistry {
    pub fn with_builtins(seconds_per_swap: u64) -> Self {
        let mut registry = Self {
            strategies: BTreeMap::new(),
        };
        registry.register(Box::new(GreedyStrategy::new(seconds_per_swap)));
        registry
    }

    pub fn register(&mut self, strategy: Box<dyn OptimizationStrategy>) {
        self.strategies.insert(strategy.name(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<&dyn OptimizationStrategy> {
        self.strategies.get(name).map(|s| s.as_ref())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.keys().copied().collect()
    }
}

/// Run a strategy and the constraint validator together; the validator
/// always runs inline so infeasible layers are never silent.
pub fn analyze(
    stats: &GcodeStats,
    config: &SystemConfiguration,
    strategy: &dyn OptimizationStrategy,
) -> (OptimizationResult, ConstraintValidation) {
    let result = strategy.optimize(stats, config);
    let validation = validate(stats, config.total_slots());
    info!(
        target: "optimizer",
        strategy = strategy.name(),
        colors = stats.colors.len(),
        slots = config.total_slots(),
        swaps = result.swaps.len(),
        violations = validation.violations.len(),
        "optimization_complete"
    );
    (result, validation)
}
