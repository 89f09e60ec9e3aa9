//! Metafeature preprocessing.
//!
//! Turns name-keyed metafeature maps into fixed-order, standardised vectors.
//! Fitting keeps only metafeatures present and non-null in every training
//! record, then drops columns whose sample standard deviation is zero or
//! undefined. Surviving columns are ordered by name.

use std::collections::BTreeSet;

use ndarray::{Array1, Array2, Axis};

use crate::error::DataError;

use super::instance::Instance;
use super::record::RawRecord;
use super::Result;

/// Degrees of freedom removed from the standard deviation denominator.
const STD_DDOF: f64 = 1.0;

#[derive(Debug, Clone)]
struct Scaler {
    names: Vec<String>,
    means: Array1<f64>,
    stds: Array1<f64>,
}

/// Fits on training records and vectorises records into [`Instance`]s.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    scaler: Option<Scaler>,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.scaler.is_some()
    }

    /// Names of the kept metafeatures, in vector order.
    pub fn feature_names(&self) -> Result<&[String]> {
        self.scaler
            .as_ref()
            .map(|scaler| scaler.names.as_slice())
            .ok_or(DataError::NotFitted)
    }

    /// Learns the kept columns and their scaling from `records`.
    pub fn fit(&mut self, records: &[RawRecord]) -> Result<()> {
        let first = records.first().ok_or(DataError::EmptyInput)?;

        let complete: BTreeSet<&String> = first
            .metafeatures
            .iter()
            .filter(|(_, value)| value.is_some())
            .map(|(name, _)| name)
            .filter(|name| {
                records
                    .iter()
                    .all(|record| matches!(record.metafeatures.get(*name), Some(Some(_))))
            })
            .collect();

        let candidates: Vec<String> = complete.into_iter().cloned().collect();
        let mut values = Array2::<f64>::zeros((records.len(), candidates.len()));
        for (row, record) in records.iter().enumerate() {
            for (col, name) in candidates.iter().enumerate() {
                if let Some(Some(value)) = record.metafeatures.get(name) {
                    values[[row, col]] = *value;
                }
            }
        }

        let means = values
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(candidates.len()));
        let stds = if records.len() > 1 {
            values.std_axis(Axis(0), STD_DDOF)
        } else {
            Array1::from_elem(candidates.len(), f64::NAN)
        };

        let mut names = Vec::new();
        let mut kept_means = Vec::new();
        let mut kept_stds = Vec::new();
        for (col, name) in candidates.iter().enumerate() {
            let std = stds[col];
            if std.is_finite() && std > 0.0 {
                names.push(name.clone());
                kept_means.push(means[col]);
                kept_stds.push(std);
            }
        }

        tracing::info!(
            records = records.len(),
            complete = candidates.len(),
            kept = names.len(),
            "Fitted metafeature preprocessor"
        );

        self.scaler = Some(Scaler {
            names,
            means: Array1::from(kept_means),
            stds: Array1::from(kept_stds),
        });
        Ok(())
    }

    /// Vectorises `records` with the fitted scaling.
    ///
    /// # Errors
    ///
    /// `DataError::NotFitted` before [`Preprocessor::fit`],
    /// `DataError::MissingFeature` when a record lacks a kept metafeature, and
    /// `DataError::Structure` when a record's pipeline fails validation.
    pub fn transform(&self, records: &[RawRecord]) -> Result<Vec<Instance>> {
        let scaler = self.scaler.as_ref().ok_or(DataError::NotFitted)?;

        records
            .iter()
            .enumerate()
            .map(|(index, record)| -> Result<Instance> {
                record.pipeline.validate()?;
                let features = scaler
                    .names
                    .iter()
                    .enumerate()
                    .map(|(col, name)| match record.metafeatures.get(name) {
                        Some(Some(value)) => Ok((value - scaler.means[col]) / scaler.stds[col]),
                        _ => Err(DataError::MissingFeature {
                            index,
                            feature: name.clone(),
                        }),
                    })
                    .collect::<Result<Vec<f64>>>()?;
                Ok(Instance::new(
                    record.dataset_id.clone(),
                    features,
                    record.target,
                    record.pipeline.clone(),
                )
                .with_attributes(record.attributes.clone()))
            })
            .collect()
    }

    pub fn fit_transform(&mut self, records: &[RawRecord]) -> Result<Vec<Instance>> {
        self.fit(records)?;
        self.transform(records)
    }
}
