// Stacks pre-tokenized items into `ClassificationBatch` tensors on the batcher's device.
// Every item already has the same length, so rows are laid out back to back and the
// flat buffer is reshaped to [batch_size, seq_length]. Labels are attached only when
// every item in the batch has one.

use super::dataset::ClassificationItem;
use burn::{
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Data, ElementConversion, Int, Shape, Tensor},
};
use derive_new::new;

/// Batcher for encoded classification items
#[derive(new)]
pub struct ClassificationBatcher<B: Backend> {
    device: B::Device, // Device the batch tensors are created on
}

/// One batch of encoded sentences
#[derive(Debug, Clone, new)]
pub struct ClassificationBatch<B: Backend> {
    pub input_ids: Tensor<B, 2, Int>,      // [batch_size, seq_length]
    pub attention_mask: Tensor<B, 2, Int>, // 1 for real tokens, 0 for padding
    pub labels: Option<Tensor<B, 1, Int>>, // [batch_size] when the batch is labeled
}

impl<B: Backend> ClassificationBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.input_ids.dims()[0]
    }
}

impl<B: Backend> Batcher<ClassificationItem, ClassificationBatch<B>> for ClassificationBatcher<B> {
    fn batch(&self, items: Vec<ClassificationItem>) -> ClassificationBatch<B> {
        let batch_size = items.len();
        let seq_length = items.first().map_or(0, |item| item.input_ids.len());

        let mut input_ids = Vec::with_capacity(batch_size * seq_length);
        let mut attention_mask = Vec::with_capacity(batch_size * seq_length);
        let mut labels = Vec::with_capacity(batch_size);

        items.iter().for_each(|item| {
            input_ids.extend(item.input_ids.iter().map(|&id| (id as i64).elem::<B::IntElem>()));
            attention_mask.extend(
                item.attention_mask
                    .iter()
                    .map(|&mask| (mask as i64).elem::<B::IntElem>()),
            );
            if let Some(label) = item.label {
                labels.push((label as i64).elem::<B::IntElem>());
            }
        });

        let labels = (labels.len() == batch_size).then(|| {
            Tensor::from_data(Data::new(labels, Shape::new([batch_size])), &self.device)
        });

        ClassificationBatch {
            input_ids: self.stack(input_ids, batch_size, seq_length),
            attention_mask: self.stack(attention_mask, batch_size, seq_length),
            labels,
        }
    }
}

impl<B: Backend> ClassificationBatcher<B> {
    fn stack(&self, values: Vec<B::IntElem>, batch_size: usize, seq_length: usize) -> Tensor<B, 2, Int> {
        Tensor::<B, 1, Int>::from_data(
            Data::new(values, Shape::new([batch_size * seq_length])),
            &self.device,
        )
        .reshape([batch_size, seq_length])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray<f32>;

    fn item(ids: [u32; 4], label: Option<usize>) -> ClassificationItem {
        let mask = ids.iter().map(|&id| u32::from(id != 0)).collect();
        ClassificationItem::new(ids.to_vec(), mask, label)
    }

    fn values(tensor: Tensor<TestBackend, 2, Int>) -> Vec<i64> {
        tensor.into_data().convert::<i64>().value
    }

    #[test]
    fn batch_preserves_count_order_and_labels() {
        let batcher = ClassificationBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![
            item([2, 11, 3, 0], Some(1)),
            item([2, 9, 6, 3], Some(0)),
            item([2, 3, 0, 0], Some(1)),
        ]);

        assert_eq!(batch.input_ids.dims(), [3, 4]);
        assert_eq!(batch.attention_mask.dims(), [3, 4]);
        assert_eq!(
            values(batch.input_ids.clone()),
            vec![2, 11, 3, 0, 2, 9, 6, 3, 2, 3, 0, 0]
        );
        assert_eq!(
            values(batch.attention_mask.clone()),
            vec![1, 1, 1, 0, 1, 1, 1, 1, 1, 1, 0, 0]
        );

        let labels = batch.labels.clone().unwrap();
        assert_eq!(labels.into_data().convert::<i64>().value, vec![1, 0, 1]);
        assert_eq!(batch.batch_size(), 3);
    }

    #[test]
    fn batch_without_all_labels_has_none() {
        let batcher = ClassificationBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![item([2, 11, 3, 0], Some(1)), item([2, 3, 0, 0], None)]);

        assert!(batch.labels.is_none());
        assert_eq!(batch.batch_size(), 2);
    }
}
