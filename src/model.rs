// BERT sequence classifier: the final hidden state of the `[CLS]` token goes through a
// small feed-forward head (linear -> ReLU -> linear) that produces one logit per class.
// The encoder can be frozen so that only the head is trained.

use std::path::Path;

use crate::data_processing::ClassificationBatch;
use crate::encoder::{BertEncoder, BertEncoderConfig, HubCheckpoint};
use crate::error::{ClassifierError, Result};
use burn::{
    config::Config,
    module::Module,
    nn::{loss::CrossEntropyLossConfig, Dropout, DropoutConfig, Linear, LinearConfig},
    tensor::{
        activation::{relu, softmax},
        backend::Backend,
        Int, Tensor,
    },
    train::ClassificationOutput,
};

#[derive(Config)]
pub struct BertClassifierConfig {
    pub encoder: BertEncoderConfig,
    #[config(default = 50)]
    pub head_hidden: usize,
    #[config(default = 2)]
    pub num_classes: usize,
    #[config(default = false)]
    pub freeze_encoder: bool,
    #[config(default = 0.0)]
    pub dropout: f64,
}

#[derive(Module, Debug)]
pub struct BertClassifier<B: Backend> {
    encoder: BertEncoder<B>,
    hidden: Linear<B>,
    dropout: Dropout,
    output: Linear<B>,
    n_classes: usize,
}

impl BertClassifierConfig {
    /// Classifier on a randomly initialized encoder.
    pub fn init<B: Backend>(&self, device: &B::Device) -> BertClassifier<B> {
        self.init_with_encoder(self.encoder.init(device), device)
    }

    /// Classifier on an encoder loaded from a PyTorch BERT checkpoint.
    pub fn init_pretrained<B: Backend>(
        &self,
        weights: impl AsRef<Path>,
        device: &B::Device,
    ) -> Result<BertClassifier<B>> {
        let encoder = self.encoder.init_pretrained(weights, device)?;
        Ok(self.init_with_encoder(encoder, device))
    }

    /// Classifier on a pretrained encoder identified by its hub name, e.g.
    /// `bert-base-uncased`. The encoder architecture comes from the hub's `config.json`
    /// and replaces `self.encoder`.
    pub fn init_pretrained_from_hub<B: Backend>(
        &self,
        model_id: &str,
        device: &B::Device,
    ) -> Result<BertClassifier<B>> {
        self.init_from_checkpoint(HubCheckpoint::fetch(model_id)?, device)
    }

    pub fn init_from_checkpoint<B: Backend>(
        &self,
        checkpoint: HubCheckpoint,
        device: &B::Device,
    ) -> Result<BertClassifier<B>> {
        let config = Self {
            encoder: checkpoint.config,
            ..self.clone()
        };
        config.init_pretrained(checkpoint.weights, device)
    }

    /// Stacks a fresh head on an existing encoder, freezing it if configured.
    pub fn init_with_encoder<B: Backend>(
        &self,
        encoder: BertEncoder<B>,
        device: &B::Device,
    ) -> BertClassifier<B> {
        let encoder = if self.freeze_encoder {
            tracing::info!("Freezing encoder parameters");
            encoder.no_grad()
        } else {
            encoder
        };

        BertClassifier {
            hidden: LinearConfig::new(encoder.hidden_size(), self.head_hidden).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.head_hidden, self.num_classes).init(device),
            encoder,
            n_classes: self.num_classes,
        }
    }
}

impl<B: Backend> BertClassifier<B> {
    /// Logits of shape [batch_size, num_classes].
    pub fn forward(&self, input_ids: Tensor<B, 2, Int>, attention_mask: Tensor<B, 2, Int>) -> Tensor<B, 2> {
        let cls = self.encoder.cls_hidden_state(input_ids, attention_mask);
        let hidden = self.dropout.forward(relu(self.hidden.forward(cls)));
        self.output.forward(hidden)
    }

    /// Forward pass with class-weighted cross entropy against the batch labels.
    pub fn forward_classification(
        &self,
        item: ClassificationBatch<B>,
        class_weights: &[f32],
    ) -> Result<ClassificationOutput<B>> {
        if class_weights.len() != self.n_classes {
            return Err(ClassifierError::InvalidConfig(format!(
                "{} class weights for {} classes",
                class_weights.len(),
                self.n_classes
            )));
        }
        let labels = item.labels.ok_or(ClassifierError::MissingLabels)?;
        let output = self.forward(item.input_ids, item.attention_mask);

        let loss = CrossEntropyLossConfig::new()
            .with_weights(Some(class_weights.to_vec()))
            .init(&output.device())
            .forward(output.clone(), labels.clone());

        Ok(ClassificationOutput {
            loss,
            output,
            targets: labels,
        })
    }

    /// Class probabilities of shape [batch_size, num_classes].
    pub fn inference(&self, item: ClassificationBatch<B>) -> Tensor<B, 2> {
        softmax(self.forward(item.input_ids, item.attention_mask), 1)
    }

    pub fn num_classes(&self) -> usize {
        self.n_classes
    }

    pub fn encoder(&self) -> &BertEncoder<B> {
        &self.encoder
    }
}

#[cfg(test)]
pub(crate) fn tiny_classifier_config() -> BertClassifierConfig {
    BertClassifierConfig::new(crate::encoder::tiny_encoder_config()).with_head_hidden(8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_processing::{preprocessing_for_bert, test_tokenizer, ClassificationBatcher, ClassificationDataset};
    use burn::backend::NdArray;
    use burn::data::dataloader::batcher::Batcher;
    use burn::data::dataset::Dataset;

    type TestBackend = NdArray<f32>;

    fn batch(labels: Option<&[usize]>) -> ClassificationBatch<TestBackend> {
        let sentences = ["i loved the movie", "terrible plot", "good fun"];
        let encoded = preprocessing_for_bert(&sentences, &test_tokenizer(), 8).unwrap();
        let dataset = match labels {
            Some(labels) => ClassificationDataset::labeled(encoded, labels, 2).unwrap(),
            None => ClassificationDataset::unlabeled(encoded),
        };
        let items = (0..dataset.len()).filter_map(|i| dataset.get(i)).collect();
        ClassificationBatcher::<TestBackend>::new(Default::default()).batch(items)
    }

    #[test]
    fn forward_produces_one_logit_per_class() {
        let model = tiny_classifier_config().init::<TestBackend>(&Default::default());
        let item = batch(None);
        let logits = model.forward(item.input_ids, item.attention_mask);
        assert_eq!(logits.dims(), [3, 2]);
    }

    #[test]
    fn inference_rows_sum_to_one() {
        let model = tiny_classifier_config().init::<TestBackend>(&Default::default());
        let probabilities = model.inference(batch(None));

        let sums = probabilities.sum_dim(1).into_data().convert::<f32>().value;
        assert_eq!(sums.len(), 3);
        assert!(sums.iter().all(|sum| (sum - 1.0).abs() < 1e-5));
    }

    #[test]
    fn forward_classification_returns_a_non_negative_loss() {
        let model = tiny_classifier_config().init::<TestBackend>(&Default::default());
        let output = model
            .forward_classification(batch(Some(&[1, 0, 1])), &[1.0, 3.0])
            .unwrap();

        let loss = output.loss.into_data().convert::<f32>().value[0];
        assert!(loss.is_finite() && loss >= 0.0);
        assert_eq!(output.targets.dims(), [3]);
    }

    #[test]
    fn forward_classification_needs_labels_and_matching_weights() {
        let model = tiny_classifier_config().init::<TestBackend>(&Default::default());

        assert!(matches!(
            model.forward_classification(batch(None), &[1.0, 1.0]),
            Err(ClassifierError::MissingLabels)
        ));
        assert!(matches!(
            model.forward_classification(batch(Some(&[1, 0, 1])), &[1.0]),
            Err(ClassifierError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_defaults_match_the_two_layer_head() {
        let config = BertClassifierConfig::new(BertEncoderConfig::new());
        assert_eq!(config.head_hidden, 50);
        assert_eq!(config.num_classes, 2);
        assert!(!config.freeze_encoder);
        assert_eq!(config.encoder.hidden_size, 768);
    }
}
