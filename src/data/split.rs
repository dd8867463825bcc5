use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::dataset::Dataset;
use crate::error::{NnError, Result};

/// Example indices of the training and validation partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

/// Stratified train/validation split.
///
/// Each class contributes `round(count * validation_fraction)` examples to
/// validation, clamped so every class with at least two examples keeps at
/// least one example on each side. Classes are visited in ascending label
/// order and shuffled with `rng`, so the split is reproducible for a seed.
///
/// Fails with `InsufficientData` if any class has fewer than
/// `min_per_class` examples.
pub fn stratified_split<R: Rng>(
    dataset: &Dataset,
    validation_fraction: f64,
    min_per_class: usize,
    rng: &mut R,
) -> Result<Split> {
    if !(validation_fraction > 0.0 && validation_fraction < 1.0) {
        return Err(NnError::InvalidConfig(format!(
            "validation_fraction must lie in (0, 1), got {validation_fraction}"
        )));
    }

    let counts = dataset.class_counts();
    if let Some((class, count)) = counts.iter().find(|(_, &count)| count < min_per_class) {
        return Err(NnError::InsufficientData(format!(
            "class {class} has {count} example(s); at least {min_per_class} required to stratify"
        )));
    }

    let mut train = Vec::new();
    let mut validation = Vec::new();

    for (&class, &count) in &counts {
        let mut members: Vec<usize> = dataset
            .examples()
            .iter()
            .enumerate()
            .filter(|(_, ex)| ex.label == class)
            .map(|(i, _)| i)
            .collect();
        members.shuffle(rng);

        let wanted = (count as f64 * validation_fraction).round() as usize;
        let n_val = wanted.clamp(1usize.min(count - 1), count - 1);
        validation.extend_from_slice(&members[..n_val]);
        train.extend_from_slice(&members[n_val..]);
    }

    train.shuffle(rng);
    validation.shuffle(rng);

    tracing::info!(
        "Dataset split: {} training, {} validation ({:.0}% held out)",
        train.len(),
        validation.len(),
        100.0 * validation.len() as f64 / dataset.len() as f64
    );

    Ok(Split { train, validation })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::Example;
    use rand::{rngs::StdRng, SeedableRng};
    use std::collections::BTreeMap;

    fn dataset(counts: &[(usize, usize)]) -> Dataset {
        let mut examples = Vec::new();
        for &(label, n) in counts {
            for i in 0..n {
                examples.push(Example { input: vec![i as f64, label as f64], label });
            }
        }
        Dataset::new(examples, 10).unwrap()
    }

    fn proportions(ds: &Dataset, idx: &[usize]) -> BTreeMap<usize, f64> {
        let mut out = BTreeMap::new();
        for &i in idx {
            *out.entry(ds.examples()[i].label).or_insert(0.0) += 1.0 / idx.len() as f64;
        }
        out
    }

    #[test]
    fn partitions_every_index_exactly_once() {
        let ds = dataset(&[(0, 10), (1, 7), (4, 3)]);
        let split = stratified_split(&ds, 0.2, 2, &mut StdRng::seed_from_u64(42)).unwrap();
        let mut all: Vec<usize> = split.train.iter().chain(&split.validation).copied().collect();
        all.sort();
        assert_eq!(all, (0..ds.len()).collect::<Vec<_>>());
    }

    #[test]
    fn validation_preserves_class_proportions() {
        let ds = dataset(&[(0, 40), (1, 25), (2, 15), (3, 20), (5, 120)]);
        let full = proportions(&ds, &(0..ds.len()).collect::<Vec<_>>());
        for seed in 0..5 {
            let split = stratified_split(&ds, 0.2, 2, &mut StdRng::seed_from_u64(seed)).unwrap();
            let val = proportions(&ds, &split.validation);
            for (class, p) in &full {
                assert!((val[class] - p).abs() < 0.05, "class {class}: {} vs {p}", val[class]);
            }
        }
    }

    #[test]
    fn two_examples_per_class_still_splits() {
        let ds = dataset(&[(0, 2), (1, 2)]);
        let split = stratified_split(&ds, 0.2, 2, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(split.validation.len(), 2);
        assert_eq!(split.train.len(), 2);
    }

    #[test]
    fn singleton_class_is_insufficient() {
        let ds = dataset(&[(0, 5), (3, 1)]);
        let err = stratified_split(&ds, 0.2, 2, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert!(matches!(err, NnError::InsufficientData(ref m) if m.contains("class 3 has 1")));
    }

    #[test]
    fn same_seed_same_split() {
        let ds = dataset(&[(0, 12), (1, 9)]);
        let a = stratified_split(&ds, 0.3, 2, &mut StdRng::seed_from_u64(8)).unwrap();
        let b = stratified_split(&ds, 0.3, 2, &mut StdRng::seed_from_u64(8)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_out_of_range_fraction() {
        let ds = dataset(&[(0, 4), (1, 4)]);
        assert!(matches!(
            stratified_split(&ds, 1.0, 2, &mut StdRng::seed_from_u64(0)),
            Err(NnError::InvalidConfig(_))
        ));
    }
}
