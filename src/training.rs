// Fine-tunes a BERT classifier with a hand-written epoch loop: forward pass, weighted
// cross entropy, backward pass, global gradient-norm clipping, AdamW step and a linear
// learning-rate schedule. Progress is printed as a table every `log_interval` batches;
// after each epoch the model can optionally be scored on a validation loader.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::clip::clip_grad_norm;
use crate::data_processing::{
    preprocessing_for_bert, ClassificationBatch, ClassificationDataset, Tokenizer,
};
use crate::error::{ClassifierError, Result};
use crate::inference::evaluate;
use crate::model::{BertClassifier, BertClassifierConfig};
use crate::scheduler::{LinearLrScheduler, LinearLrSchedulerConfig};
use burn::{
    config::Config,
    data::dataloader::DataLoader,
    lr_scheduler::LrScheduler,
    module::AutodiffModule,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use serde::{Deserialize, Serialize};

#[derive(Config)]
pub struct TrainingConfig {
    pub classifier: BertClassifierConfig,
    #[config(default = 5e-5)]
    pub learning_rate: f64,
    #[config(default = 1e-8)]
    pub epsilon: f32,
    #[config(default = 0.0)]
    pub weight_decay: f32,
    #[config(default = 4)]
    pub num_epochs: usize,
    #[config(default = 32)]
    pub batch_size: usize,
    #[config(default = 64)]
    pub max_seq_length: usize,
    #[config(default = 0)]
    pub warmup_steps: usize,
    #[config(default = 1.0)]
    pub max_grad_norm: f64,
    #[config(default = "vec![1.0, 1.0]")]
    pub class_weights: Vec<f32>,
    #[config(default = 20)]
    pub log_interval: usize,
    #[config(default = false)]
    pub evaluation: bool,
    #[config(default = false)]
    pub balanced: bool,
    #[config(default = 42)]
    pub seed: u64,
}

/// Where the encoder weights come from.
#[derive(Clone, Copy, Debug)]
pub enum EncoderWeights<'a> {
    /// Random initialization from `TrainingConfig::classifier`.
    Random,
    /// Local PyTorch checkpoint, architecture from `TrainingConfig::classifier`.
    Checkpoint(&'a Path),
    /// Model on the Hugging Face hub, e.g. `bert-base-uncased`. The architecture is read
    /// from the hub's `config.json`.
    Hub(&'a str),
}

impl TrainingConfig {
    fn optimizer(&self) -> AdamWConfig {
        AdamWConfig::new()
            .with_epsilon(self.epsilon)
            .with_weight_decay(self.weight_decay)
    }

    fn validate(&self) -> Result<()> {
        let num_classes = self.classifier.num_classes;
        if self.class_weights.len() != num_classes {
            return Err(ClassifierError::InvalidConfig(format!(
                "{} class weights for {num_classes} classes",
                self.class_weights.len()
            )));
        }
        if self.batch_size == 0 || self.log_interval == 0 {
            return Err(ClassifierError::InvalidConfig(
                "batch size and log interval must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Cleans and encodes `sentences` to `max_seq_length` tokens. With `labels` the
    /// dataset is labeled and checked against `classifier.num_classes`.
    pub fn dataset<S: AsRef<str>>(
        &self,
        tokenizer: &dyn Tokenizer,
        sentences: &[S],
        labels: Option<&[usize]>,
    ) -> Result<ClassificationDataset> {
        tracing::info!("Tokenizing {} sentences", sentences.len());
        let encoded = preprocessing_for_bert(sentences, tokenizer, self.max_seq_length)?;
        match labels {
            Some(labels) => {
                ClassificationDataset::labeled(encoded, labels, self.classifier.num_classes)
            }
            None => Ok(ClassificationDataset::unlabeled(encoded)),
        }
    }
}

/// Metrics recorded at the end of one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochSummary {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: Option<f64>,
    pub val_accuracy: Option<f64>,
}

pub struct TrainingOutcome<B: AutodiffBackend> {
    pub model: BertClassifier<B>,
    pub history: Vec<EpochSummary>,
}

/// Builds the classifier, its AdamW optimizer and the learning-rate schedule spanning
/// `train_batches * num_epochs` steps.
pub fn initialize_model<B: AutodiffBackend>(
    config: &TrainingConfig,
    device: &B::Device,
    train_batches: usize,
    weights: EncoderWeights<'_>,
) -> Result<(
    BertClassifier<B>,
    impl Optimizer<BertClassifier<B>, B>,
    LinearLrScheduler,
)> {
    config.validate()?;

    let model = match weights {
        EncoderWeights::Random => config.classifier.init(device),
        EncoderWeights::Checkpoint(path) => config.classifier.init_pretrained(path, device)?,
        EncoderWeights::Hub(model_id) => {
            config.classifier.init_pretrained_from_hub(model_id, device)?
        }
    };
    tracing::info!(
        "Model ready: hidden size {}, frozen encoder: {}",
        model.encoder().hidden_size(),
        config.classifier.freeze_encoder
    );

    let optimizer = config.optimizer().init::<B, BertClassifier<B>>();
    let scheduler = LinearLrSchedulerConfig::new(
        config.learning_rate,
        train_batches * config.num_epochs,
    )
    .with_warmup_steps(config.warmup_steps)
    .init();

    Ok((model, optimizer, scheduler))
}

/// Trains for `config.num_epochs` epochs and returns the trained model with one
/// summary per epoch.
///
/// The batch rows of the progress table show the mean loss and the elapsed seconds
/// since the previous row, not since the start of the epoch. Validation loss is
/// computed with uniform class weights, whatever `config.class_weights` is.
pub fn train<B, O, S>(
    mut model: BertClassifier<B>,
    mut optimizer: O,
    mut scheduler: S,
    train_loader: Arc<dyn DataLoader<ClassificationBatch<B>>>,
    val_loader: Option<Arc<dyn DataLoader<ClassificationBatch<B::InnerBackend>>>>,
    config: &TrainingConfig,
) -> Result<TrainingOutcome<B>>
where
    B: AutodiffBackend,
    O: Optimizer<BertClassifier<B>, B>,
    S: LrScheduler<B>,
{
    config.validate()?;
    println!("Start training...\n");

    let eval_weights = vec![1.0f32; config.classifier.num_classes];
    let mut history = Vec::with_capacity(config.num_epochs);

    for epoch in 1..=config.num_epochs {
        print_header();

        let epoch_start = Instant::now();
        let mut window_start = Instant::now();
        let mut total_loss = 0.0;
        let mut window_loss = 0.0;
        let mut window_batches = 0usize;
        let mut num_batches = 0usize;

        let mut batches = train_loader.iter().peekable();
        let mut step = 0usize;
        while let Some(batch) = batches.next() {
            let output = model.forward_classification(batch, &config.class_weights)?;
            let loss = output.loss.clone().into_scalar().elem::<f64>();
            total_loss += loss;
            window_loss += loss;
            window_batches += 1;
            num_batches += 1;

            let grads = output.loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            let (grads, _) = clip_grad_norm::<B, _>(&model, grads, config.max_grad_norm);
            model = optimizer.step(scheduler.step(), model, grads);

            let is_last = batches.peek().is_none();
            if (step % config.log_interval == 0 && step != 0) || is_last {
                print_row(
                    &epoch.to_string(),
                    &step.to_string(),
                    &format!("{:.6}", window_loss / window_batches as f64),
                    "-",
                    "-",
                    window_start.elapsed().as_secs_f64(),
                );
                window_loss = 0.0;
                window_batches = 0;
                window_start = Instant::now();
            }
            step += 1;
        }

        if num_batches == 0 {
            return Err(ClassifierError::EmptyLoader);
        }
        let train_loss = total_loss / num_batches as f64;
        println!("{}", "-".repeat(70));

        let mut summary = EpochSummary {
            epoch,
            train_loss,
            val_loss: None,
            val_accuracy: None,
        };

        if config.evaluation {
            if let Some(val_loader) = &val_loader {
                let evaluation = evaluate(&model.valid(), val_loader.as_ref(), &eval_weights)?;
                print_row(
                    &epoch.to_string(),
                    "-",
                    &format!("{train_loss:.6}"),
                    &format!("{:.6}", evaluation.loss),
                    &format!("{:.2}", evaluation.accuracy),
                    epoch_start.elapsed().as_secs_f64(),
                );
                summary.val_loss = Some(evaluation.loss);
                summary.val_accuracy = Some(evaluation.accuracy);
            }
        }

        tracing::info!(
            epoch,
            train_loss,
            val_loss = summary.val_loss,
            val_accuracy = summary.val_accuracy,
            "Epoch finished"
        );
        history.push(summary);
    }

    println!("{}", "-".repeat(70));
    println!("\n");
    println!("Training complete!");

    Ok(TrainingOutcome { model, history })
}

fn print_header() {
    println!(
        "{:^7} | {:^7} | {:^12} | {:^10} | {:^9} | {:^9}",
        "Epoch", "Batch", "Train Loss", "Val Loss", "Val Acc", "Elapsed"
    );
    println!("{}", "-".repeat(70));
}

fn print_row(epoch: &str, batch: &str, train_loss: &str, val_loss: &str, val_acc: &str, elapsed: f64) {
    println!(
        "{epoch:^7} | {batch:^7} | {train_loss:^12} | {val_loss:^10} | {val_acc:^9} | {elapsed:^9.2}"
    );
}
