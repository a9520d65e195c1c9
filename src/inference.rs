// Evaluation and prediction on a non-autodiff backend. `evaluate` scores labeled batches
// (weighted cross entropy and accuracy, averaged over batches); `predict` returns the
// softmax probabilities of every example in loader order.

use burn::{
    data::dataloader::DataLoader,
    tensor::{activation::softmax, backend::Backend, ElementConversion, Tensor},
};
use serde::{Deserialize, Serialize};

use crate::data_processing::{
    eval_loader, preprocessing_for_bert, ClassificationBatch, ClassificationDataset, Tokenizer,
};
use crate::error::{ClassifierError, Result};
use crate::model::BertClassifier;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Mean weighted cross entropy over batches.
    pub loss: f64,
    /// Mean batch accuracy, in percent.
    pub accuracy: f64,
}

/// Scores the model on every batch of `loader`.
pub fn evaluate<B: Backend>(
    model: &BertClassifier<B>,
    loader: &dyn DataLoader<ClassificationBatch<B>>,
    class_weights: &[f32],
) -> Result<Evaluation> {
    let mut losses = Vec::new();
    let mut accuracies = Vec::new();

    for batch in loader.iter() {
        let batch_size = batch.batch_size();
        let output = model.forward_classification(batch, class_weights)?;

        let predictions = output.output.argmax(1).reshape([batch_size]);
        let correct = predictions
            .equal(output.targets)
            .int()
            .sum()
            .into_scalar()
            .elem::<f64>();

        losses.push(output.loss.into_scalar().elem::<f64>());
        accuracies.push(correct / batch_size as f64 * 100.0);
    }

    if losses.is_empty() {
        return Err(ClassifierError::EmptyLoader);
    }

    let evaluation = Evaluation {
        loss: mean(&losses),
        accuracy: mean(&accuracies),
    };
    tracing::debug!(
        loss = evaluation.loss,
        accuracy = evaluation.accuracy,
        batches = losses.len(),
        "Evaluation done"
    );
    Ok(evaluation)
}

/// Class probabilities for every example of `loader`, one row per example.
pub fn predict<B: Backend>(
    model: &BertClassifier<B>,
    loader: &dyn DataLoader<ClassificationBatch<B>>,
) -> Result<Vec<Vec<f32>>> {
    let logits: Vec<Tensor<B, 2>> = loader
        .iter()
        .map(|batch| model.forward(batch.input_ids, batch.attention_mask))
        .collect();

    if logits.is_empty() {
        return Ok(Vec::new());
    }

    let probabilities = softmax(Tensor::cat(logits, 0), 1);
    let [_, num_classes] = probabilities.dims();
    let values = probabilities.into_data().convert::<f32>().value;

    Ok(values
        .chunks(num_classes)
        .map(|row| row.to_vec())
        .collect())
}

/// Cleans, encodes and batches raw sentences, then predicts their class probabilities.
pub fn predict_texts<B: Backend, S: AsRef<str>>(
    model: &BertClassifier<B>,
    tokenizer: &dyn Tokenizer,
    sentences: &[S],
    max_len: usize,
    batch_size: usize,
    device: B::Device,
) -> Result<Vec<Vec<f32>>> {
    tracing::info!("Tokenizing {} sentences", sentences.len());
    let encoded = preprocessing_for_bert(sentences, tokenizer, max_len)?;
    let loader = eval_loader::<B>(ClassificationDataset::unlabeled(encoded), batch_size, device)?;
    predict(model, loader.as_ref())
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
