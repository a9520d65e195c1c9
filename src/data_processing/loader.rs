// Data loaders over encoded datasets: random order (or class-balanced sampling) for
// training, dataset order for validation and prediction.

use std::sync::Arc;

use burn::data::dataloader::{DataLoader, DataLoaderBuilder};
use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;

use super::batcher::{ClassificationBatch, ClassificationBatcher};
use super::dataset::{ClassificationDataset, ClassificationItem};
use super::sampler::{balanced_sample_weights, WeightedSamplerDataset};
use crate::error::{ClassifierError, Result};

/// Number of batches a loader yields per pass over `num_items` items.
pub fn num_batches(num_items: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    num_items.div_ceil(batch_size)
}

/// Training loader. With `balanced` set, items are drawn with replacement so that
/// both classes are equally likely; otherwise the dataset is reshuffled every epoch.
pub fn train_loader<B: Backend>(
    dataset: ClassificationDataset,
    batch_size: usize,
    balanced: bool,
    seed: u64,
    device: B::Device,
) -> Result<Arc<dyn DataLoader<ClassificationBatch<B>>>> {
    check_batch_size(batch_size)?;
    let builder = DataLoaderBuilder::new(ClassificationBatcher::<B>::new(device))
        .batch_size(batch_size)
        .num_workers(1);

    if balanced {
        let labels = dataset.labels().ok_or(ClassifierError::MissingLabels)?;
        let weights = balanced_sample_weights(&labels);
        let size = dataset.len();
        tracing::debug!("Balanced sampler over {size} items");
        let sampler = WeightedSamplerDataset::<_, ClassificationItem>::new(
            dataset, &weights, size, seed,
        )?;
        Ok(builder.build(sampler))
    } else {
        Ok(builder.shuffle(seed).build(dataset))
    }
}

/// Sequential loader for evaluation and prediction.
pub fn eval_loader<B: Backend>(
    dataset: ClassificationDataset,
    batch_size: usize,
    device: B::Device,
) -> Result<Arc<dyn DataLoader<ClassificationBatch<B>>>> {
    check_batch_size(batch_size)?;
    Ok(DataLoaderBuilder::new(ClassificationBatcher::<B>::new(device))
        .batch_size(batch_size)
        .num_workers(1)
        .build(dataset))
}

fn check_batch_size(batch_size: usize) -> Result<()> {
    if batch_size == 0 {
        return Err(ClassifierError::InvalidConfig("batch size must be positive".into()));
    }
    Ok(())
}
