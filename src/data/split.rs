//! Train/test splitting that never puts one group on both sides.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use super::grouping::{group_records, FieldLookup};
use super::Result;

/// Splits `records` so that every group lands entirely in one side.
///
/// The distinct values at `key_path` are shuffled with a ChaCha8 stream seeded
/// from `seed`; the first `test_size` groups form the test set and the rest
/// the training set. Within each group records keep their input order.
/// Returns `(train, test)`.
pub fn split_by_group<R: FieldLookup + Clone>(
    records: &[R],
    key_path: &str,
    test_size: usize,
    seed: u64,
) -> Result<(Vec<R>, Vec<R>)> {
    let mut groups = group_records(records, key_path)?.into_groups();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    groups.shuffle(&mut rng);

    let test_groups = test_size.min(groups.len());
    let collect = |groups: &[(String, Vec<usize>)]| -> Vec<R> {
        groups
            .iter()
            .flat_map(|(_, indices)| indices.iter().map(move |&i| records[i].clone()))
            .collect()
    };
    let test = collect(&groups[..test_groups]);
    let train = collect(&groups[test_groups..]);

    tracing::debug!(
        key_path,
        groups = groups.len(),
        test_groups,
        train = train.len(),
        test = test.len(),
        "Split records by group"
    );

    Ok((train, test))
}
