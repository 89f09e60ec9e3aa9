//! Evaluation of a pipeline's DAG over a batch.
//!
//! Each forward pass keeps one state per step. A step is evaluated by first
//! evaluating its dependencies depth-first, combining their values, and then
//! applying the step's primitive unit followed by the activation. Values are
//! cached only for the duration of one pass.

use ndarray::{Array2, ArrayView2};

use crate::error::ExecutionError;
use crate::pipeline::Pipeline;

use super::activation::Activation;
use super::reduction::ReductionPolicy;
use super::registry::UnitRegistry;
use super::unit::ComputationUnit;
use super::Result;

#[derive(Debug)]
enum NodeState {
    Unevaluated,
    InProgress,
    Evaluated(Array2<f64>),
}

/// State of one forward pass over one pipeline.
struct Pass<'p, 'x> {
    pipeline: &'p Pipeline,
    input: ArrayView2<'x, f64>,
    states: Vec<NodeState>,
}

impl Pass<'_, '_> {
    fn value(&self, step: usize) -> Option<&Array2<f64>> {
        match self.states.get(step)? {
            NodeState::Evaluated(value) => Some(value),
            _ => None,
        }
    }
}

/// Evaluates pipelines against a [`UnitRegistry`].
///
/// The executor holds only the model-wide settings; the registry is passed to
/// every call so that it stays owned by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DagExecutor {
    reduction: ReductionPolicy,
    activation: Activation,
}

impl DagExecutor {
    pub fn new(reduction: ReductionPolicy, activation: Activation) -> Self {
        Self {
            reduction,
            activation,
        }
    }

    pub fn reduction(&self) -> ReductionPolicy {
        self.reduction
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Evaluates the terminal step of `pipeline` on `input`.
    ///
    /// `input` has one row per instance. Every primitive must be registered
    /// before any step runs.
    pub fn evaluate(
        &self,
        registry: &UnitRegistry,
        pipeline: &Pipeline,
        input: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>> {
        let terminal = pipeline
            .terminal()
            .ok_or_else(|| ExecutionError::EmptyPipeline {
                pipeline: pipeline.id().to_string(),
            })?;
        self.evaluate_node(registry, pipeline, input, terminal)
    }

    /// Evaluates step `node` of `pipeline` on `input`.
    pub fn evaluate_node(
        &self,
        registry: &UnitRegistry,
        pipeline: &Pipeline,
        input: ArrayView2<'_, f64>,
        node: usize,
    ) -> Result<Array2<f64>> {
        let result = self.run_pass(registry, pipeline, input, node);
        if let Err(err) = &result {
            tracing::warn!(pipeline = %pipeline.id(), node, error = %err, "DAG evaluation failed");
        }
        result
    }

    fn run_pass(
        &self,
        registry: &UnitRegistry,
        pipeline: &Pipeline,
        input: ArrayView2<'_, f64>,
        node: usize,
    ) -> Result<Array2<f64>> {
        registry.ensure_covers(pipeline)?;
        if node >= pipeline.len() {
            return Err(ExecutionError::InvalidReference {
                pipeline: pipeline.id().to_string(),
                step: node,
                reference: node,
            });
        }

        let mut pass = Pass {
            pipeline,
            input,
            states: (0..pipeline.len()).map(|_| NodeState::Unevaluated).collect(),
        };
        self.visit(registry, &mut pass, node)?;

        match pass.states.swap_remove(node) {
            NodeState::Evaluated(value) => Ok(value),
            _ => Err(ExecutionError::Cycle {
                pipeline: pipeline.id().to_string(),
                step: node,
            }),
        }
    }

    fn visit(&self, registry: &UnitRegistry, pass: &mut Pass<'_, '_>, index: usize) -> Result<()> {
        let pipeline = pass.pipeline;
        match pass.states[index] {
            NodeState::Evaluated(_) => return Ok(()),
            NodeState::InProgress => {
                return Err(ExecutionError::Cycle {
                    pipeline: pipeline.id().to_string(),
                    step: index,
                })
            }
            NodeState::Unevaluated => {}
        }
        pass.states[index] = NodeState::InProgress;

        let step = &pipeline.steps()[index];
        if step.inputs().is_empty() {
            return Err(ExecutionError::EmptyInputs {
                pipeline: pipeline.id().to_string(),
                step: index,
            });
        }

        let output = if step.reads_external() {
            self.apply(registry, pipeline, index, pass.input)?
        } else {
            let dependencies: Vec<usize> = step.dependencies().collect();
            for &dependency in &dependencies {
                if dependency >= pipeline.len() {
                    return Err(ExecutionError::InvalidReference {
                        pipeline: pipeline.id().to_string(),
                        step: index,
                        reference: dependency,
                    });
                }
                self.visit(registry, pass, dependency)?;
            }

            let values: Vec<ArrayView2<'_, f64>> = dependencies
                .iter()
                .filter_map(|&dependency| pass.value(dependency))
                .map(|value| value.view())
                .collect();
            match values.as_slice() {
                [single] => self.apply(registry, pipeline, index, single.view())?,
                _ => {
                    let combined = self.reduction.combine(&values).ok_or_else(|| {
                        ExecutionError::ReductionMismatch {
                            pipeline: pipeline.id().to_string(),
                            step: index,
                            widths: values.iter().map(|value| value.ncols()).collect(),
                        }
                    })?;
                    self.apply(registry, pipeline, index, combined.view())?
                }
            }
        };

        pass.states[index] = NodeState::Evaluated(output);
        Ok(())
    }

    /// Applies step `index`'s unit and the activation to `input`.
    fn apply(
        &self,
        registry: &UnitRegistry,
        pipeline: &Pipeline,
        index: usize,
        input: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>> {
        let step = &pipeline.steps()[index];
        let unit = unit_for(registry, pipeline, index)?;
        if let Some(expected) = unit.input_width() {
            if expected != input.ncols() {
                return Err(ExecutionError::ShapeMismatch {
                    pipeline: pipeline.id().to_string(),
                    step: index,
                    expected,
                    found: input.ncols(),
                });
            }
        }
        tracing::trace!(pipeline = %pipeline.id(), step = index, primitive = step.name(), "Applying unit");
        Ok(self.activation.apply(unit.forward(input)?))
    }

    /// Flat evaluation: every step reads `input` directly and the step outputs
    /// are reduced element-wise into one value.
    pub fn evaluate_flat(
        &self,
        registry: &UnitRegistry,
        pipeline: &Pipeline,
        input: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>> {
        let result = self.run_flat(registry, pipeline, input);
        if let Err(err) = &result {
            tracing::warn!(pipeline = %pipeline.id(), error = %err, "Flat evaluation failed");
        }
        result
    }

    fn run_flat(
        &self,
        registry: &UnitRegistry,
        pipeline: &Pipeline,
        input: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>> {
        if pipeline.is_empty() {
            return Err(ExecutionError::EmptyPipeline {
                pipeline: pipeline.id().to_string(),
            });
        }
        registry.ensure_covers(pipeline)?;

        let outputs = (0..pipeline.len())
            .map(|index| self.apply(registry, pipeline, index, input))
            .collect::<Result<Vec<_>>>()?;
        let views: Vec<ArrayView2<'_, f64>> = outputs.iter().map(|output| output.view()).collect();

        self.reduction
            .combine(&views)
            .ok_or_else(|| ExecutionError::ReductionMismatch {
                pipeline: pipeline.id().to_string(),
                step: pipeline.len() - 1,
                widths: views.iter().map(|view| view.ncols()).collect(),
            })
    }
}

fn unit_for<'r>(
    registry: &'r UnitRegistry,
    pipeline: &Pipeline,
    index: usize,
) -> Result<&'r dyn ComputationUnit> {
    let name = pipeline.steps()[index].name();
    registry
        .get(name)
        .ok_or_else(|| ExecutionError::UnknownPrimitive {
            pipeline: pipeline.id().to_string(),
            step: index,
            primitive: name.to_string(),
        })
}
