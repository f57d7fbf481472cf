//! Seeded train/test partitioning of a [`Dataset`].

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, instrument};

use crate::dataset::Dataset;
use crate::error::RfError;

/// Partition `dataset` into a train set and a test set.
///
/// Row indices are shuffled with a `ChaCha8Rng` seeded from `seed`; the first
/// `floor(n * train_fraction)` shuffled rows form the train set and the
/// remainder the test set, both in shuffled order. Every example lands on
/// exactly one side. For very small datasets either side may be empty.
///
/// # Errors
///
/// Returns [`RfError::InvalidTrainFraction`] unless `0.0 < train_fraction < 1.0`.
#[instrument(skip(dataset), fields(n_examples = dataset.n_examples()))]
pub fn train_test_split(
    dataset: &Dataset,
    train_fraction: f64,
    seed: u64,
) -> Result<(Dataset, Dataset), RfError> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(RfError::InvalidTrainFraction {
            fraction: train_fraction,
        });
    }

    let n = dataset.n_examples();
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let n_train = ((n as f64) * train_fraction).floor() as usize;
    let (train_idx, test_idx) = order.split_at(n_train);

    debug!(n_train, n_test = test_idx.len(), "dataset split");

    Ok((dataset.subset(train_idx), dataset.subset(test_idx)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Example;

    fn numbered(n: usize) -> Dataset {
        let examples: Vec<Example> = (0..n)
            .map(|i| {
                Example::new()
                    .with_feature("id", i as f64)
                    .with_target("y", (i * 2) as f64)
            })
            .collect();
        Dataset::from_examples(&examples).unwrap()
    }

    #[test]
    fn sizes_follow_floor_policy() {
        let ds = numbered(10);
        let (train, test) = train_test_split(&ds, 0.75, 1).unwrap();
        assert_eq!(train.n_examples(), 7);
        assert_eq!(test.n_examples(), 3);
    }

    #[test]
    fn partitions_are_disjoint_and_complete() {
        let ds = numbered(57);
        let (train, test) = train_test_split(&ds, 0.7, 1).unwrap();
        assert_eq!(train.n_examples() + test.n_examples(), 57);

        let mut ids: Vec<usize> = train
            .column(0)
            .iter()
            .chain(test.column(0))
            .map(|&v| v as usize)
            .collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..57).collect::<Vec<_>>());
    }

    #[test]
    fn targets_stay_attached_to_rows() {
        let ds = numbered(20);
        let (train, _) = train_test_split(&ds, 0.5, 3).unwrap();
        for (id, y) in train.column(0).iter().zip(train.target_column(0)) {
            assert_eq!(*y, id * 2.0);
        }
    }

    #[test]
    fn deterministic_for_fixed_seed() {
        let ds = numbered(30);
        let (a_train, a_test) = train_test_split(&ds, 0.7, 1).unwrap();
        let (b_train, b_test) = train_test_split(&ds, 0.7, 1).unwrap();
        assert_eq!(a_train, b_train);
        assert_eq!(a_test, b_test);
    }

    #[test]
    fn different_seeds_shuffle_differently() {
        let ds = numbered(30);
        let (a, _) = train_test_split(&ds, 0.7, 1).unwrap();
        let (b, _) = train_test_split(&ds, 0.7, 2).unwrap();
        assert_ne!(a.column(0), b.column(0));
    }

    #[test]
    fn rejects_fraction_outside_open_interval() {
        let ds = numbered(5);
        for fraction in [0.0, 1.0, -0.1, 1.5, f64::NAN] {
            let err = train_test_split(&ds, fraction, 1).unwrap_err();
            assert!(matches!(err, RfError::InvalidTrainFraction { .. }));
        }
    }
}
