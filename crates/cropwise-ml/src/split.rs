//! Stratified hold-out split.

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

use crate::MlError;

/// Split row indices into `(train, test)` keeping class proportions.
///
/// Each class sends `round(count * test_fraction)` shuffled rows to the test
/// side, but always keeps at least one row for training. Both index lists
/// are returned sorted.
///
/// # Errors
///
/// Returns [`MlError::DegenerateSplit`] if `test_fraction` is outside
/// `(0, 1)` or either side ends up empty.
pub fn stratified_train_test_split(
    labels: &[usize],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), MlError> {
    let degenerate = || MlError::DegenerateSplit {
        n_samples: labels.len(),
        test_fraction,
    };
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(degenerate());
    }

    let n_classes = labels.iter().max().map_or(0, |&m| m + 1);
    let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (i, &label) in labels.iter().enumerate() {
        by_class[label].push(i);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();
    for indices in &mut by_class {
        indices.shuffle(&mut rng);
        let n_test = ((indices.len() as f64 * test_fraction).round() as usize).min(indices.len().saturating_sub(1));
        test.extend_from_slice(&indices[..n_test]);
        train.extend_from_slice(&indices[n_test..]);
    }

    if train.is_empty() || test.is_empty() {
        return Err(degenerate());
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}

/// Clone the rows at `indices`.
pub(crate) fn take_rows<T: Clone>(rows: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| rows[i].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_class_proportions() {
        let labels: Vec<usize> = (0..100).map(|i| i % 4).collect();
        let (train, test) = stratified_train_test_split(&labels, 0.2, 42).unwrap();
        assert_eq!(train.len(), 80);
        assert_eq!(test.len(), 20);
        for class in 0..4 {
            assert_eq!(test.iter().filter(|&&i| labels[i] == class).count(), 5);
        }
        let mut all: Vec<usize> = train.iter().chain(&test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn singleton_class_stays_in_train() {
        let labels = vec![0, 0, 0, 0, 0, 1];
        let (train, test) = stratified_train_test_split(&labels, 0.5, 1).unwrap();
        assert!(train.contains(&5));
        assert!(!test.contains(&5));
    }

    #[test]
    fn rejects_degenerate_requests() {
        assert!(stratified_train_test_split(&[0, 1], 0.0, 0).is_err());
        assert!(stratified_train_test_split(&[0, 1], 1.0, 0).is_err());
        assert!(stratified_train_test_split(&[0, 1], 0.2, 0).is_err());
    }
}
