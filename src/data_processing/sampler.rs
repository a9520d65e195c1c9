// Weighted sampling with replacement, used to balance a skewed binary training set.
// Works like burn's `SamplerDataset`: the wrapper reports a fixed length and every
// `get` draws a fresh index, here from a weighted distribution instead of a uniform one.

use std::marker::PhantomData;
use std::sync::Mutex;

use burn::data::dataset::Dataset;
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{ClassifierError, Result};

pub struct WeightedSamplerDataset<D, I> {
    dataset: D,
    size: usize,
    distribution: WeightedIndex<f64>,
    rng: Mutex<StdRng>,
    input: PhantomData<I>,
}

impl<D, I> WeightedSamplerDataset<D, I>
where
    D: Dataset<I>,
    I: Clone + Send + Sync,
{
    /// Draws `size` items with replacement, item `i` chosen with probability
    /// proportional to `weights[i]`.
    pub fn new(dataset: D, weights: &[f64], size: usize, seed: u64) -> Result<Self> {
        if weights.len() != dataset.len() {
            return Err(ClassifierError::InvalidConfig(format!(
                "{} sample weights for {} items",
                weights.len(),
                dataset.len()
            )));
        }
        let distribution = WeightedIndex::new(weights)
            .map_err(|err| ClassifierError::InvalidConfig(format!("sample weights: {err}")))?;

        Ok(Self {
            dataset,
            size,
            distribution,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            input: PhantomData,
        })
    }

    fn sample_index(&self) -> usize {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        self.distribution.sample(&mut *rng)
    }
}

impl<D, I> Dataset<I> for WeightedSamplerDataset<D, I>
where
    D: Dataset<I>,
    I: Clone + Send + Sync,
{
    fn get(&self, index: usize) -> Option<I> {
        if index >= self.size {
            return None;
        }
        self.dataset.get(self.sample_index())
    }

    fn len(&self) -> usize {
        self.size
    }
}

/// Per-sample weights that give both classes the same total mass: each positive
/// example gets `1 / n_pos` and each negative example `1 / n_neg`. A class with no
/// examples contributes nothing.
pub fn balanced_sample_weights(labels: &[usize]) -> Vec<f64> {
    let positives = labels.iter().filter(|&&label| label != 0).count();
    let negatives = labels.len() - positives;

    labels
        .iter()
        .map(|&label| {
            if label != 0 {
                1.0 / positives as f64
            } else {
                1.0 / negatives as f64
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::data::dataset::InMemDataset;

    #[test]
    fn balanced_weights_give_each_class_equal_mass() {
        let weights = balanced_sample_weights(&[0, 0, 0, 1]);
        assert_eq!(weights, vec![1.0 / 3.0, 1.0 / 3.0, 1.0 / 3.0, 1.0]);

        let positive_mass: f64 = weights[3..].iter().sum();
        let negative_mass: f64 = weights[..3].iter().sum();
        assert!((positive_mass - negative_mass).abs() < 1e-12);
    }

    #[test]
    fn sampler_has_requested_length_and_only_draws_weighted_items() {
        let dataset = InMemDataset::new(vec!['a', 'b', 'c']);
        let sampler = WeightedSamplerDataset::new(dataset, &[0.0, 1.0, 0.0], 10, 7).unwrap();

        assert_eq!(sampler.len(), 10);
        assert!((0..10).all(|i| sampler.get(i) == Some('b')));
        assert_eq!(sampler.get(10), None);
    }

    #[test]
    fn sampler_balances_a_skewed_dataset() {
        let labels: Vec<usize> = (0..100).map(|i| usize::from(i < 10)).collect();
        let weights = balanced_sample_weights(&labels);
        let sampler =
            WeightedSamplerDataset::new(InMemDataset::new(labels), &weights, 2_000, 42).unwrap();

        let positives = (0..sampler.len())
            .filter_map(|i| sampler.get(i))
            .filter(|&label| label == 1)
            .count();
        // Expected 1000; allow generous slack for sampling noise.
        assert!((800..1200).contains(&positives), "positives = {positives}");
    }

    #[test]
    fn sampler_rejects_mismatched_or_zero_weights() {
        assert!(WeightedSamplerDataset::new(InMemDataset::new(vec![1, 2]), &[1.0], 4, 0).is_err());
        assert!(
            WeightedSamplerDataset::new(InMemDataset::new(vec![1, 2]), &[0.0, 0.0], 4, 0).is_err()
        );
    }
}
