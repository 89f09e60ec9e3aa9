//! Registry of computation units keyed by primitive name.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::error::ExecutionError;
use crate::pipeline::Pipeline;

use super::unit::ComputationUnit;

/// Owns one computation unit per primitive name.
///
/// A registry belongs to exactly one model. Units are created lazily the first
/// time a primitive is encountered and are never replaced or copied after
/// that.
#[derive(Debug, Default)]
pub struct UnitRegistry {
    units: HashMap<String, Box<dyn ComputationUnit>>,
}

impl UnitRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn contains(&self, primitive: &str) -> bool {
        self.units.contains_key(primitive)
    }

    pub fn get(&self, primitive: &str) -> Option<&dyn ComputationUnit> {
        self.units.get(primitive).map(|unit| unit.as_ref())
    }

    /// Registers `unit` for `primitive`, returning false if a unit already
    /// exists. An existing unit is never replaced.
    pub fn register(
        &mut self,
        primitive: impl Into<String>,
        unit: Box<dyn ComputationUnit>,
    ) -> bool {
        let primitive = primitive.into();
        if self.units.contains_key(&primitive) {
            return false;
        }
        tracing::debug!(primitive = %primitive, unit = unit.name(), "Registered computation unit");
        self.units.insert(primitive, unit);
        true
    }

    /// Returns the unit for `primitive`, creating it with `create` on first
    /// use.
    pub fn get_or_insert_with<F, E>(
        &mut self,
        primitive: &str,
        create: F,
    ) -> Result<&dyn ComputationUnit, E>
    where
        F: FnOnce() -> Result<Box<dyn ComputationUnit>, E>,
    {
        let unit = match self.units.entry(primitive.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let unit = create()?;
                tracing::debug!(primitive, unit = unit.name(), "Created computation unit");
                entry.insert(unit)
            }
        };
        Ok(&**unit)
    }

    /// Registered primitive names, sorted.
    pub fn primitives(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.units.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Checks that every step of `pipeline` has a registered unit.
    pub fn ensure_covers(&self, pipeline: &Pipeline) -> Result<(), ExecutionError> {
        match pipeline
            .steps()
            .iter()
            .enumerate()
            .find(|(_, step)| !self.contains(step.name()))
        {
            Some((step, missing)) => Err(ExecutionError::UnknownPrimitive {
                pipeline: pipeline.id().to_string(),
                step,
                primitive: missing.name().to_string(),
            }),
            None => Ok(()),
        }
    }
}
