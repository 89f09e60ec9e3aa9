//! Construction of the per-primitive units a model owns.

use std::collections::HashMap;

use crate::batching::derive_group_seed;
use crate::config::ModelConfig;
use crate::engine::{ComputationUnit, LinearUnit, UnitRegistry};
use crate::error::ConfigError;
use crate::pipeline::{Pipeline, Step};

/// Seed label of the unit that encodes raw features.
pub(crate) const INPUT_UNIT: &str = "<input>";

/// Seed label of the unit that produces the final output.
pub(crate) const OUTPUT_UNIT: &str = "<output>";

/// Seed of the unit for `name`, independent of the order units are created.
pub(crate) fn unit_seed(config: &ModelConfig, name: &str) -> u64 {
    derive_group_seed(config.unit_seed(), name)
}

/// Builds a seeded dense unit for `name`.
pub(crate) fn linear_unit(
    config: &ModelConfig,
    name: &str,
    input_width: usize,
    output_width: usize,
) -> Result<LinearUnit, ConfigError> {
    LinearUnit::seeded(name, input_width, output_width, unit_seed(config, name))
}

/// How many `hidden_width` blocks a step's unit reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    /// Each unit reads the shared encoding only.
    Shared,
    /// Each unit reads its combined dependencies.
    Graph,
}

impl Arity {
    fn of(&self, step: &Step) -> usize {
        match self {
            Arity::Shared => 1,
            Arity::Graph if step.reads_external() => 1,
            Arity::Graph => step.dependencies().count(),
        }
    }
}

/// Creates a unit for every primitive used by `pipelines`.
///
/// Units are created on first encounter and never replaced. Under the concat
/// policy a unit's input width depends on its step's input count, so a
/// primitive seen with two different counts is rejected.
pub(crate) fn build_registry<'p>(
    pipelines: impl IntoIterator<Item = &'p Pipeline>,
    config: &ModelConfig,
    arity: Arity,
) -> Result<UnitRegistry, ConfigError> {
    let mut registry = UnitRegistry::new();
    let mut arities: HashMap<String, usize> = HashMap::new();

    for pipeline in pipelines {
        for step in pipeline.steps() {
            let count = arity.of(step).max(1);
            if config.reduction.is_concat() && arity == Arity::Graph {
                let expected = *arities.entry(step.name().to_string()).or_insert(count);
                if expected != count {
                    return Err(ConfigError::InconsistentArity {
                        primitive: step.name().to_string(),
                        expected,
                        found: count,
                    });
                }
            }

            let input_width = match arity {
                Arity::Shared => config.hidden_width,
                Arity::Graph => config.reduction.input_width(count, config.hidden_width),
            };
            registry.get_or_insert_with(step.name(), || {
                linear_unit(config, step.name(), input_width, config.hidden_width)
                    .map(|unit| Box::new(unit) as Box<dyn ComputationUnit>)
            })?;
        }
    }

    tracing::info!(
        primitives = registry.len(),
        reduction = %config.reduction,
        hidden_width = config.hidden_width,
        "Built computation unit registry"
    );
    Ok(registry)
}
