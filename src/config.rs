//! Run configuration.
//!
//! A [`DnaConfig`] bundles the batching settings ([`LoaderConfig`]) and the
//! model settings ([`ModelConfig`]). It can be built in code with the `with_*`
//! methods, read from a YAML or JSON file, and overridden from `DNA_*`
//! environment variables.
//!
//! ```yaml
//! loader:
//!   batch_size: 16
//!   group_key: pipeline.id
//! model:
//!   kind: dag
//!   reduction: mean
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::{Activation, ReductionPolicy};
use crate::error::ConfigError;

/// Settings for the grouped batch loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Rows per batch.
    pub batch_size: usize,
    /// Drop each group's final undersized batch.
    pub drop_last: bool,
    /// Shuffle within groups and across the batch schedule.
    pub shuffle: bool,
    /// Master seed for all loader randomness.
    pub seed: u64,
    /// Dotted key path used to group instances.
    pub group_key: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            drop_last: false,
            shuffle: true,
            seed: 0,
            group_key: "pipeline.id".to_string(),
        }
    }
}

impl LoaderConfig {
    /// Builder method to set the batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Builder method to set whether incomplete batches are dropped.
    pub fn with_drop_last(mut self, drop_last: bool) -> Self {
        self.drop_last = drop_last;
        self
    }

    /// Builder method to enable or disable shuffling.
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Builder method to set the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder method to set the grouping key path.
    pub fn with_group_key(mut self, key: impl Into<String>) -> Self {
        self.group_key = key.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "batch_size must be greater than 0".to_string(),
            ));
        }
        if self.group_key.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "group_key cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Execution shape of a regression model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Every step reads the shared encoding; step outputs are reduced.
    Flat,
    /// Steps are composed along the pipeline's own DAG.
    #[default]
    Dag,
}

/// Settings for model construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub kind: ModelKind,
    /// How multi-input steps combine their inputs.
    pub reduction: ReductionPolicy,
    /// Applied after every computation unit.
    pub activation: Activation,
    /// Width of the shared feature encoding and of every step output.
    pub hidden_width: usize,
    /// Width of the final output.
    pub output_width: usize,
    /// Model seed; units are initialised from `seed + 1` and the training
    /// loader is seeded with `seed + 2`.
    pub seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            kind: ModelKind::default(),
            reduction: ReductionPolicy::Max,
            activation: Activation::Relu,
            hidden_width: 64,
            output_width: 1,
            seed: 0,
        }
    }
}

impl ModelConfig {
    /// Builder method to set the model kind.
    pub fn with_kind(mut self, kind: ModelKind) -> Self {
        self.kind = kind;
        self
    }

    /// Builder method to set the reduction policy.
    pub fn with_reduction(mut self, reduction: ReductionPolicy) -> Self {
        self.reduction = reduction;
        self
    }

    /// Builder method to set the activation.
    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    /// Builder method to set the hidden width.
    pub fn with_hidden_width(mut self, width: usize) -> Self {
        self.hidden_width = width;
        self
    }

    /// Builder method to set the output width.
    pub fn with_output_width(mut self, width: usize) -> Self {
        self.output_width = width;
        self
    }

    /// Builder method to set the model seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Seed for computation unit initialisation.
    pub fn unit_seed(&self) -> u64 {
        self.seed.wrapping_add(1)
    }

    /// Seed for the training loader.
    pub fn loader_seed(&self) -> u64 {
        self.seed.wrapping_add(2)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hidden_width == 0 {
            return Err(ConfigError::ValidationFailed(
                "hidden_width must be greater than 0".to_string(),
            ));
        }
        if self.output_width == 0 {
            return Err(ConfigError::ValidationFailed(
                "output_width must be greater than 0".to_string(),
            ));
        }
        if self.kind == ModelKind::Flat && self.reduction == ReductionPolicy::Concat {
            return Err(ConfigError::ValidationFailed(
                "reduction 'concat' is not supported by the flat model".to_string(),
            ));
        }
        Ok(())
    }
}

/// Complete run configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DnaConfig {
    pub loader: LoaderConfig,
    pub model: ModelConfig,
}

impl DnaConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a YAML (or JSON) document.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML or JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "Loaded configuration file");
        Self::from_yaml_str(&text)
    }

    /// Serialises the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Applies `DNA_*` environment variable overrides, then validates.
    ///
    /// # Environment Variables
    ///
    /// - `DNA_BATCH_SIZE`: rows per batch
    /// - `DNA_DROP_LAST`: drop undersized final batches (true/false)
    /// - `DNA_SHUFFLE`: shuffle batches (true/false)
    /// - `DNA_SEED`: master seed for the loader and the model
    /// - `DNA_REDUCTION`: concat, max, mean or sum
    /// - `DNA_ACTIVATION`: identity, relu, tanh or sigmoid
    /// - `DNA_HIDDEN_WIDTH`: width of hidden representations
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides looked up by `DNA_*` key, then validates.
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("DNA_BATCH_SIZE") {
            self.loader.batch_size = parse_env_value(&val, "DNA_BATCH_SIZE")?;
        }

        if let Some(val) = lookup("DNA_DROP_LAST") {
            self.loader.drop_last = parse_env_bool(&val, "DNA_DROP_LAST")?;
        }

        if let Some(val) = lookup("DNA_SHUFFLE") {
            self.loader.shuffle = parse_env_bool(&val, "DNA_SHUFFLE")?;
        }

        if let Some(val) = lookup("DNA_SEED") {
            let seed = parse_env_value(&val, "DNA_SEED")?;
            self.loader.seed = seed;
            self.model.seed = seed;
        }

        if let Some(val) = lookup("DNA_REDUCTION") {
            self.model.reduction = val.parse()?;
        }

        if let Some(val) = lookup("DNA_ACTIVATION") {
            self.model.activation = val.parse()?;
        }

        if let Some(val) = lookup("DNA_HIDDEN_WIDTH") {
            self.model.hidden_width = parse_env_value(&val, "DNA_HIDDEN_WIDTH")?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Validates both sections.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.loader.validate()?;
        self.model.validate()
    }

    /// Builder method to replace the loader section.
    pub fn with_loader(mut self, loader: LoaderConfig) -> Self {
        self.loader = loader;
        self
    }

    /// Builder method to replace the model section.
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }
}

/// Parse an environment variable value into a type.
fn parse_env_value<T: std::str::FromStr>(value: &str, key: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("could not parse '{}'", value),
    })
}

/// Parse an environment variable as a boolean.
fn parse_env_bool(value: &str, key: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected boolean value, got '{}'", value),
        }),
    }
}
