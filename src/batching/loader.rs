//! Grouped batch loader.
//!
//! Instances are partitioned by a key path; each group is cut into fixed-size
//! batches, and a flat schedule holding every group's label once per batch is
//! shuffled so that batches from different groups interleave. Every batch
//! carries its group's pipeline template and DAG structure.
//!
//! Members of a group must share one template: the same step names wired the
//! same way. Grouping by [`PIPELINE_STRUCTURE_KEY`] relaxes this to a shared
//! DAG shape, and step names may then differ row to row; read
//! [`Batch::pipelines`] rather than [`Batch::pipeline`] in that case.

use std::sync::Arc;

use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::LoaderConfig;
use crate::data::{GroupIndex, Instance, PIPELINE_STRUCTURE_KEY};
use crate::error::LoaderError;
use crate::pipeline::{DagStructure, Pipeline};

use super::sampler::{derive_group_seed, GroupSampler};
use super::Result;

/// One batch of same-group instances in stacked form.
#[derive(Debug, Clone)]
pub struct Batch {
    /// Label of the group the batch was drawn from.
    pub group: Arc<str>,
    /// Pipeline template of the group (its first member).
    pub pipeline: Arc<Pipeline>,
    /// Pipeline of each row, parallel to `indices`.
    pub pipelines: Vec<Arc<Pipeline>>,
    /// Input lists of the template's steps.
    pub structure: Arc<DagStructure>,
    /// Positions of the batch rows in the loader's instance slice.
    pub indices: Vec<usize>,
    /// `rows x feature_width` feature matrix.
    pub features: Array2<f64>,
    pub targets: Array1<f64>,
}

impl Batch {
    /// Number of rows.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[derive(Debug)]
struct GroupSource {
    label: Arc<str>,
    members: Vec<usize>,
    pipeline: Arc<Pipeline>,
    structure: Arc<DagStructure>,
    sampler: Option<GroupSampler>,
    batch_count: usize,
}

impl GroupSource {
    /// Member order for a new pass.
    fn pass_order(&mut self) -> Vec<usize> {
        match self.sampler.as_mut() {
            Some(sampler) => sampler
                .next_pass()
                .into_iter()
                .map(|position| self.members[position])
                .collect(),
            None => self.members.clone(),
        }
    }
}

/// Batch source over a borrowed slice of instances.
///
/// The schedule is fixed at construction. Within-group order is reshuffled on
/// every pass when shuffling is enabled, so two passes over one loader
/// differ, while two loaders built from the same data and config produce
/// identical pass sequences.
#[derive(Debug)]
pub struct GroupedBatchLoader<'a> {
    instances: &'a [Instance],
    config: LoaderConfig,
    feature_width: usize,
    groups: Vec<GroupSource>,
    schedule: Vec<usize>,
}

impl<'a> GroupedBatchLoader<'a> {
    /// Builds the loader.
    ///
    /// # Errors
    ///
    /// - `LoaderError::InvalidBatchSize` when `batch_size` is zero.
    /// - `LoaderError::Grouping` when an instance lacks `group_key`.
    /// - `LoaderError::FeatureWidthMismatch` when feature vectors differ in
    ///   length.
    /// - `LoaderError::MixedTemplates` when one group holds pipelines with
    ///   different templates, or different structure keys when grouping by
    ///   [`PIPELINE_STRUCTURE_KEY`].
    pub fn new(instances: &'a [Instance], config: &LoaderConfig) -> Result<Self> {
        if config.batch_size == 0 {
            return Err(LoaderError::InvalidBatchSize);
        }

        let feature_width = instances.first().map_or(0, Instance::feature_width);
        if let Some((index, instance)) = instances
            .iter()
            .enumerate()
            .find(|(_, instance)| instance.feature_width() != feature_width)
        {
            return Err(LoaderError::FeatureWidthMismatch {
                index,
                expected: feature_width,
                found: instance.feature_width(),
            });
        }

        let index = GroupIndex::build(instances, &config.group_key)?;
        let shape_only = config.group_key == PIPELINE_STRUCTURE_KEY;
        let mut groups = Vec::with_capacity(index.len());
        let mut dropped = 0usize;

        for (label, members) in index.into_groups() {
            let template = &instances[members[0]];
            let same_template = |other: &Instance| {
                if shape_only {
                    other.structure_key() == template.structure_key()
                } else {
                    other.pipeline().steps() == template.pipeline().steps()
                }
            };
            if let Some(&odd) = members.iter().find(|&&i| !same_template(&instances[i])) {
                let describe = |instance: &Instance| {
                    if shape_only {
                        instance.structure_key().to_string()
                    } else {
                        template_signature(instance.pipeline())
                    }
                };
                tracing::warn!(
                    group = %label,
                    index = odd,
                    pipeline = %instances[odd].pipeline().id(),
                    "Group mixes pipeline templates"
                );
                return Err(LoaderError::MixedTemplates {
                    expected: describe(template),
                    found: describe(&instances[odd]),
                    group: label,
                    index: odd,
                });
            }

            let batch_count = batch_count(members.len(), config.batch_size, config.drop_last);
            if batch_count == 0 {
                tracing::debug!(
                    group = %label,
                    size = members.len(),
                    batch_size = config.batch_size,
                    "Group yields no batches, leaving it out of the schedule"
                );
                dropped += 1;
                continue;
            }

            let sampler = config
                .shuffle
                .then(|| GroupSampler::new(members.len(), derive_group_seed(config.seed, &label)));

            groups.push(GroupSource {
                label: Arc::from(label),
                pipeline: Arc::clone(template.pipeline()),
                structure: Arc::new(template.pipeline().structure()),
                members,
                sampler,
                batch_count,
            });
        }

        let mut schedule: Vec<usize> = groups
            .iter()
            .enumerate()
            .flat_map(|(position, group)| std::iter::repeat(position).take(group.batch_count))
            .collect();
        if config.shuffle {
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
            schedule.shuffle(&mut rng);
        }

        tracing::info!(
            instances = instances.len(),
            groups = groups.len(),
            dropped_groups = dropped,
            batches = schedule.len(),
            batch_size = config.batch_size,
            group_key = %config.group_key,
            "Built grouped batch loader"
        );

        Ok(Self {
            instances,
            config: config.clone(),
            feature_width,
            groups,
            schedule,
        })
    }

    /// Total number of batches in one pass.
    pub fn len(&self) -> usize {
        self.schedule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }

    pub fn feature_width(&self) -> usize {
        self.feature_width
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn instances(&self) -> &'a [Instance] {
        self.instances
    }

    /// Labels of the groups that contribute batches, in first-occurrence order.
    pub fn group_labels(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.iter().map(|group| &*group.label)
    }

    /// Number of batches `label` contributes per pass, if it contributes any.
    pub fn group_batch_count(&self, label: &str) -> Option<usize> {
        self.group(label).map(|group| group.batch_count)
    }

    /// Pipeline template of a group.
    pub fn group_pipeline(&self, label: &str) -> Option<&Arc<Pipeline>> {
        self.group(label).map(|group| &group.pipeline)
    }

    /// DAG structure of a group.
    pub fn group_structure(&self, label: &str) -> Option<&Arc<DagStructure>> {
        self.group(label).map(|group| &group.structure)
    }

    /// Distinct pipeline templates, one per group.
    pub fn pipelines(&self) -> impl Iterator<Item = &Arc<Pipeline>> + '_ {
        self.groups.iter().map(|group| &group.pipeline)
    }

    fn group(&self, label: &str) -> Option<&GroupSource> {
        self.groups.iter().find(|group| &*group.label == label)
    }

    /// Rewinds every group sampler so the next pass replays the first one.
    pub fn reset(&mut self) {
        for sampler in self.groups.iter_mut().filter_map(|g| g.sampler.as_mut()) {
            sampler.reset();
        }
    }

    /// Starts a new pass over the schedule.
    pub fn iter(&mut self) -> Batches<'_, 'a> {
        let cursors = (0..self.groups.len()).map(|_| None).collect();
        Batches {
            loader: self,
            cursors,
            position: 0,
        }
    }

    fn assemble(&self, group: &GroupSource, rows: &[usize]) -> Batch {
        let instances = self.instances;
        let features = Array2::from_shape_fn((rows.len(), self.feature_width), |(r, c)| {
            instances[rows[r]].features()[c]
        });
        let targets = rows.iter().map(|&i| instances[i].target()).collect::<Array1<f64>>();
        Batch {
            group: Arc::clone(&group.label),
            pipeline: Arc::clone(&group.pipeline),
            pipelines: rows.iter().map(|&i| Arc::clone(instances[i].pipeline())).collect(),
            structure: Arc::clone(&group.structure),
            indices: rows.to_vec(),
            features,
            targets,
        }
    }
}

impl<'l, 'a> IntoIterator for &'l mut GroupedBatchLoader<'a> {
    type Item = Batch;
    type IntoIter = Batches<'l, 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Per-pass position inside one group.
#[derive(Debug)]
struct GroupCursor {
    order: Vec<usize>,
    next: usize,
}

/// One pass over a [`GroupedBatchLoader`].
///
/// A group's member order is drawn the first time the schedule reaches it.
/// Dropping the iterator early discards the partially consumed groups.
#[derive(Debug)]
pub struct Batches<'l, 'a> {
    loader: &'l mut GroupedBatchLoader<'a>,
    cursors: Vec<Option<GroupCursor>>,
    position: usize,
}

impl Iterator for Batches<'_, '_> {
    type Item = Batch;

    fn next(&mut self) -> Option<Self::Item> {
        let &group_position = self.loader.schedule.get(self.position)?;
        self.position += 1;

        let batch_size = self.loader.config.batch_size;
        if self.cursors[group_position].is_none() {
            let order = self.loader.groups[group_position].pass_order();
            self.cursors[group_position] = Some(GroupCursor { order, next: 0 });
        }
        let cursor = self.cursors[group_position].as_mut()?;

        let start = cursor.next;
        let end = (start + batch_size).min(cursor.order.len());
        cursor.next = end;

        let group = &self.loader.groups[group_position];
        Some(self.loader.assemble(group, &cursor.order[start..end]))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.loader.schedule.len() - self.position;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Batches<'_, '_> {}

/// Step names with their inputs, e.g. `imputer[inputs.0] svc[0]`.
fn template_signature(pipeline: &Pipeline) -> String {
    pipeline
        .steps()
        .iter()
        .map(|step| {
            let inputs: Vec<String> = step.inputs().iter().map(ToString::to_string).collect();
            format!("{}[{}]", step.name(), inputs.join(","))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Batches a group of `size` contributes per pass.
pub fn batch_count(size: usize, batch_size: usize, drop_last: bool) -> usize {
    if drop_last {
        size / batch_size
    } else {
        size.div_ceil(batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::PIPELINE_STRUCTURE_KEY;
    use crate::pipeline::Step;
    use std::collections::HashSet;

    fn pipeline(id: &str, wide: bool) -> Pipeline {
        let mut steps = vec![Step::external("imputer"), Step::from_steps("scaler", &[0])];
        if wide {
            steps.push(Step::from_steps("svc", &[0, 1]));
        }
        Pipeline::new(id, steps)
    }

    /// `sizes[g]` instances in group `g`, interleaved across groups.
    fn instances(sizes: &[usize]) -> Vec<Instance> {
        let pipelines: Vec<Arc<Pipeline>> = (0..sizes.len())
            .map(|g| Arc::new(pipeline(&format!("p{}", g), g % 2 == 1)))
            .collect();
        let max = sizes.iter().copied().max().unwrap_or(0);
        let mut out = Vec::new();
        for i in 0..max {
            for (g, &size) in sizes.iter().enumerate() {
                if i < size {
                    let value = (g * 1000 + i) as f64;
                    out.push(Instance::new(
                        format!("d{}", i),
                        vec![value, -value],
                        value,
                        Arc::clone(&pipelines[g]),
                    ));
                }
            }
        }
        out
    }

    fn config(batch_size: usize) -> LoaderConfig {
        LoaderConfig::default().with_batch_size(batch_size).with_seed(11)
    }

    #[test]
    fn test_length_law() {
        let data = instances(&[5, 3, 8]);
        let loader = GroupedBatchLoader::new(&data, &config(3)).unwrap();
        assert_eq!(loader.len(), 2 + 1 + 3);

        let loader = GroupedBatchLoader::new(&data, &config(3).with_drop_last(true)).unwrap();
        assert_eq!(loader.len(), 1 + 1 + 2);
    }

    #[test]
    fn test_pass_yields_len_batches() {
        let data = instances(&[5, 3, 8]);
        let mut loader = GroupedBatchLoader::new(&data, &config(3)).unwrap();
        let batches = loader.iter();
        assert_eq!(batches.len(), 6);
        assert_eq!(batches.count(), 6);
    }

    #[test]
    fn test_coverage_without_duplicates() {
        let data = instances(&[5, 3, 8]);
        let mut loader = GroupedBatchLoader::new(&data, &config(2)).unwrap();
        let mut seen = Vec::new();
        for batch in &mut loader {
            seen.extend(batch.indices);
        }
        let unique: HashSet<_> = seen.iter().copied().collect();
        assert_eq!(seen.len(), data.len());
        assert_eq!(unique.len(), data.len());
    }

    #[test]
    fn test_drop_last_skips_small_groups() {
        let data = instances(&[5, 1, 8]);
        let loader = GroupedBatchLoader::new(&data, &config(4).with_drop_last(true)).unwrap();
        assert_eq!(loader.group_batch_count("p1"), None);
        assert_eq!(loader.group_batch_count("p0"), Some(1));
        assert_eq!(loader.group_labels().collect::<Vec<_>>(), vec!["p0", "p2"]);
    }

    #[test]
    fn test_batches_carry_group_template() {
        let data = instances(&[4, 4]);
        let mut loader = GroupedBatchLoader::new(&data, &config(3)).unwrap();
        for batch in loader.iter() {
            assert_eq!(batch.pipeline.id(), &*batch.group);
            assert_eq!(*batch.structure, batch.pipeline.structure());
            assert_eq!(batch.features.nrows(), batch.len());
            assert_eq!(batch.features.ncols(), 2);
            assert_eq!(batch.pipelines.len(), batch.len());
            for (row, &i) in batch.indices.iter().enumerate() {
                assert_eq!(data[i].pipeline().id(), &*batch.group);
                assert_eq!(batch.pipelines[row], batch.pipeline);
                assert_eq!(batch.features[[row, 0]], data[i].features()[0]);
                assert_eq!(batch.targets[row], data[i].target());
            }
        }
    }

    #[test]
    fn test_unshuffled_keeps_input_order() {
        let data = instances(&[3, 2]);
        let mut loader = GroupedBatchLoader::new(&data, &config(2).with_shuffle(false)).unwrap();
        let order: Vec<Vec<usize>> = loader.iter().map(|b| b.indices).collect();
        assert_eq!(order, vec![vec![0, 2], vec![4], vec![1, 3]]);
    }

    #[test]
    fn test_fresh_loaders_agree_and_passes_reshuffle() {
        let data = instances(&[9, 7, 12]);
        let mut a = GroupedBatchLoader::new(&data, &config(4)).unwrap();
        let mut b = GroupedBatchLoader::new(&data, &config(4)).unwrap();
        let pass_a: Vec<Vec<usize>> = a.iter().map(|b| b.indices).collect();
        let pass_b: Vec<Vec<usize>> = b.iter().map(|b| b.indices).collect();
        assert_eq!(pass_a, pass_b);

        let second: Vec<Vec<usize>> = a.iter().map(|b| b.indices).collect();
        assert_ne!(pass_a, second);

        a.reset();
        let replay: Vec<Vec<usize>> = a.iter().map(|b| b.indices).collect();
        assert_eq!(pass_a, replay);
    }

    #[test]
    fn test_zero_batch_size() {
        let data = instances(&[2]);
        assert!(matches!(
            GroupedBatchLoader::new(&data, &config(0)),
            Err(LoaderError::InvalidBatchSize)
        ));
    }

    #[test]
    fn test_mixed_templates_rejected() {
        let data = instances(&[2, 2]);
        let by_dataset = config(2).with_group_key("dataset_id");
        let err = GroupedBatchLoader::new(&data, &by_dataset).unwrap_err();
        assert!(matches!(err, LoaderError::MixedTemplates { index: 1, .. }));
    }

    fn renamed(id: &str, first: &str, second: &str) -> Arc<Pipeline> {
        Arc::new(Pipeline::new(
            id,
            vec![Step::external(first), Step::from_steps(second, &[0])],
        ))
    }

    #[test]
    fn test_shared_id_with_different_names_rejected() {
        let a = renamed("same", "imputer", "svc");
        let b = renamed("same", "scaler", "knn");
        let data = vec![
            Instance::new("d0", vec![0.0, 1.0], 0.1, a),
            Instance::new("d1", vec![1.0, 0.0], 0.2, b),
        ];
        match GroupedBatchLoader::new(&data, &config(2)).unwrap_err() {
            LoaderError::MixedTemplates { group, expected, found, index } => {
                assert_eq!(group, "same");
                assert_eq!(expected, "imputer[inputs.0] svc[0]");
                assert_eq!(found, "scaler[inputs.0] knn[0]");
                assert_eq!(index, 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_structure_grouping_keeps_row_pipelines() {
        let a = renamed("a", "imputer", "svc");
        let b = renamed("b", "scaler", "knn");
        let data = vec![
            Instance::new("d0", vec![0.0, 1.0], 0.1, Arc::clone(&a)),
            Instance::new("d1", vec![1.0, 0.0], 0.2, Arc::clone(&b)),
            Instance::new("d2", vec![2.0, 0.0], 0.3, a),
        ];
        let by_structure = config(8).with_group_key(PIPELINE_STRUCTURE_KEY).with_shuffle(false);
        let mut loader = GroupedBatchLoader::new(&data, &by_structure).unwrap();
        let batches: Vec<Batch> = loader.iter().collect();
        assert_eq!(batches.len(), 1);

        let batch = &batches[0];
        assert_eq!(batch.indices, vec![0, 1, 2]);
        let ids: Vec<&str> = batch.pipelines.iter().map(|p| p.id()).collect();
        assert_eq!(ids, vec!["a", "b", "a"]);
        assert_eq!(batch.pipelines[1].primitive_names().collect::<Vec<_>>(), vec!["scaler", "knn"]);
    }

    #[test]
    fn test_group_by_structure_key() {
        let data = instances(&[2, 2, 2]);
        let by_structure = config(8).with_group_key(PIPELINE_STRUCTURE_KEY);
        let loader = GroupedBatchLoader::new(&data, &by_structure).unwrap();
        assert_eq!(loader.len(), 2);
        assert_eq!(loader.group_batch_count("[inputs.0][0]"), Some(1));
    }

    #[test]
    fn test_feature_width_mismatch() {
        let mut data = instances(&[2]);
        data.push(Instance::new("x", vec![1.0], 0.0, pipeline("p0", false)));
        assert!(matches!(
            GroupedBatchLoader::new(&data, &config(2)),
            Err(LoaderError::FeatureWidthMismatch { index: 2, expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_empty_input() {
        let mut loader = GroupedBatchLoader::new(&[], &config(2)).unwrap();
        assert!(loader.is_empty());
        assert_eq!(loader.iter().count(), 0);
    }
}
