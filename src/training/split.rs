//! Seeded train/test split.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{ConvError, Result};

/// Shuffle `items` with `rng` and cut off `round(n · test_fraction)` of
/// them as the test set.
pub fn train_test_split<T: Clone, R: Rng + ?Sized>(
    items: &[T],
    test_fraction: f64,
    rng: &mut R,
) -> Result<(Vec<T>, Vec<T>)> {
    if !(0.0..=1.0).contains(&test_fraction) {
        return Err(ConvError::config(format!(
            "test fraction {test_fraction} outside [0, 1]"
        )));
    }
    let mut order: Vec<usize> = (0..items.len()).collect();
    order.shuffle(rng);

    let n_test = (items.len() as f64 * test_fraction).round() as usize;
    let (test, train) = order.split_at(n_test);
    let pick = |idx: &[usize]| idx.iter().map(|&i| items[i].clone()).collect::<Vec<_>>();
    Ok((pick(train), pick(test)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_partition_sizes_and_coverage() {
        let items: Vec<u32> = (0..10).collect();
        let (train, test) = train_test_split(&items, 0.3, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!((train.len(), test.len()), (7, 3));
        let mut all: Vec<u32> = train.into_iter().chain(test).collect();
        all.sort_unstable();
        assert_eq!(all, items);
    }

    #[test]
    fn test_seeded_split_is_reproducible() {
        let items: Vec<u32> = (0..20).collect();
        let a = train_test_split(&items, 0.25, &mut StdRng::seed_from_u64(4)).unwrap();
        let b = train_test_split(&items, 0.25, &mut StdRng::seed_from_u64(4)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bad_fraction() {
        assert!(train_test_split(&[1, 2], 1.5, &mut StdRng::seed_from_u64(0)).is_err());
    }
}
