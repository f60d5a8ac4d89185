//! Strategy registry.
//!
//! Maps the identifiers used in quality-model descriptions to strategy
//! constructors. Unknown identifiers are rejected when a description is
//! imported, never at evaluation time.

use std::collections::BTreeMap;
use std::sync::Arc;

use once_cell::sync::Lazy;

use super::node::NodeKind;
use super::strategy::{
    BaselineNormalizer, CountEvaluator, Evaluator, FindingEvaluator, IdentityUtility,
    LinearUtility, MeanEvaluator, NoNormalizer, Normalizer, SeveritySumEvaluator,
    SingleChildEvaluator, Strategies, SumEvaluator, ThreeZoneUtility, UtilityFunction,
    WeightedSumEvaluator,
};
use crate::errors::{ModelError, Result, StrategyFamily};

type EvaluatorCtor = fn() -> Arc<dyn Evaluator>;
type NormalizerCtor = fn() -> Arc<dyn Normalizer>;
type UtilityCtor = fn() -> Arc<dyn UtilityFunction>;

static BUILTIN: Lazy<StrategyRegistry> = Lazy::new(StrategyRegistry::builtin);

/// Identifier → constructor tables for the three strategy families.
#[derive(Clone)]
pub struct StrategyRegistry {
    evaluators: BTreeMap<String, EvaluatorCtor>,
    normalizers: BTreeMap<String, NormalizerCtor>,
    utilities: BTreeMap<String, UtilityCtor>,
}

/// Strategy identifiers requested for one node; `None` keeps the default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StrategyOverrides<'a> {
    pub evaluator: Option<&'a str>,
    pub normalizer: Option<&'a str>,
    pub utility: Option<&'a str>,
}

impl StrategyRegistry {
    /// Registry with no strategies at all.
    pub fn empty() -> Self {
        Self {
            evaluators: BTreeMap::new(),
            normalizers: BTreeMap::new(),
            utilities: BTreeMap::new(),
        }
    }

    /// Registry with every built-in strategy.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();

        registry.register_evaluator("finding", || Arc::new(FindingEvaluator));
        registry.register_evaluator("count", || Arc::new(CountEvaluator));
        registry.register_evaluator("severity-sum", || Arc::new(SeveritySumEvaluator));
        registry.register_evaluator("sum", || Arc::new(SumEvaluator));
        registry.register_evaluator("single-child", || Arc::new(SingleChildEvaluator));
        registry.register_evaluator("weighted-sum", || Arc::new(WeightedSumEvaluator));
        registry.register_evaluator("mean", || Arc::new(MeanEvaluator));

        registry.register_normalizer("none", || Arc::new(NoNormalizer));
        registry.register_normalizer("loc", || Arc::new(BaselineNormalizer::loc()));
        registry.register_normalizer("kloc", || Arc::new(BaselineNormalizer::kloc()));

        registry.register_utility("identity", || Arc::new(IdentityUtility));
        registry.register_utility("linear", || Arc::new(LinearUtility));
        registry.register_utility("three-zone", || Arc::new(ThreeZoneUtility));

        registry
    }

    /// Shared built-in registry.
    pub fn global() -> &'static StrategyRegistry {
        &BUILTIN
    }

    pub fn register_evaluator(&mut self, id: impl Into<String>, ctor: EvaluatorCtor) {
        self.evaluators.insert(id.into(), ctor);
    }

    pub fn register_normalizer(&mut self, id: impl Into<String>, ctor: NormalizerCtor) {
        self.normalizers.insert(id.into(), ctor);
    }

    pub fn register_utility(&mut self, id: impl Into<String>, ctor: UtilityCtor) {
        self.utilities.insert(id.into(), ctor);
    }

    pub fn evaluator(&self, id: &str, node: &str) -> Result<Arc<dyn Evaluator>> {
        self.evaluators
            .get(id)
            .map(|ctor| ctor())
            .ok_or_else(|| unknown(StrategyFamily::Evaluator, id, node))
    }

    pub fn normalizer(&self, id: &str, node: &str) -> Result<Arc<dyn Normalizer>> {
        self.normalizers
            .get(id)
            .map(|ctor| ctor())
            .ok_or_else(|| unknown(StrategyFamily::Normalizer, id, node))
    }

    pub fn utility(&self, id: &str, node: &str) -> Result<Arc<dyn UtilityFunction>> {
        self.utilities
            .get(id)
            .map(|ctor| ctor())
            .ok_or_else(|| unknown(StrategyFamily::UtilityFunction, id, node))
    }

    /// Resolve a node's strategies, falling back to its kind's defaults.
    pub fn resolve(
        &self,
        node: &str,
        kind: NodeKind,
        overrides: &StrategyOverrides<'_>,
    ) -> Result<Strategies> {
        let mut strategies = Strategies::defaults_for(kind);
        if let Some(id) = overrides.evaluator {
            strategies.evaluator = self.evaluator(id, node)?;
        }
        if let Some(id) = overrides.normalizer {
            strategies.normalizer = self.normalizer(id, node)?;
        }
        if let Some(id) = overrides.utility {
            strategies.utility = self.utility(id, node)?;
        }
        Ok(strategies)
    }

    pub fn evaluator_ids(&self) -> impl Iterator<Item = &str> {
        self.evaluators.keys().map(String::as_str)
    }

    pub fn normalizer_ids(&self) -> impl Iterator<Item = &str> {
        self.normalizers.keys().map(String::as_str)
    }

    pub fn utility_ids(&self) -> impl Iterator<Item = &str> {
        self.utilities.keys().map(String::as_str)
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn unknown(family: StrategyFamily, id: &str, node: &str) -> ModelError {
    ModelError::UnknownStrategy {
        family,
        id: id.to_string(),
        node: node.to_string(),
    }
}
