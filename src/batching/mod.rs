//! Seeded grouped batching.
//!
//! Two levels of randomness drive a [`GroupedBatchLoader`]:
//!
//! 1. Every group owns a [`GroupSampler`] seeded from the master seed and the
//!    group label ([`derive_group_seed`]). It reshuffles the group's members on
//!    each pass.
//! 2. The schedule of which group supplies the next batch is shuffled once,
//!    at construction, from the master seed.
//!
//! Both are reproducible from the master seed alone and independent of the
//! order in which groups were discovered.
//!
//! # Example
//!
//! ```
//! use pipeline_dna::batching::GroupedBatchLoader;
//! use pipeline_dna::config::LoaderConfig;
//! use pipeline_dna::data::Instance;
//! use pipeline_dna::pipeline::{Pipeline, Step};
//!
//! let pipeline = Pipeline::new("p1", vec![Step::external("svc")]);
//! let instances: Vec<Instance> = (0..5)
//!     .map(|i| Instance::new(format!("d{}", i), vec![i as f64], 0.5, pipeline.clone()))
//!     .collect();
//!
//! let config = LoaderConfig::default().with_batch_size(2).with_seed(7);
//! let mut loader = GroupedBatchLoader::new(&instances, &config).unwrap();
//! assert_eq!(loader.len(), 3);
//! assert_eq!(loader.iter().map(|batch| batch.len()).sum::<usize>(), 5);
//! ```

pub mod loader;
pub mod sampler;

pub use loader::{batch_count, Batch, Batches, GroupedBatchLoader};
pub use sampler::{derive_group_seed, GroupSampler};

use crate::error::LoaderError;

/// Result type alias for batching operations.
pub type Result<T> = std::result::Result<T, LoaderError>;
