// BERT encoder built from burn modules: word + position + token-type embeddings with
// layer norm, followed by a post-norm transformer encoder. Pretrained weights come
// from a Hugging Face PyTorch checkpoint, with parameter names remapped onto this
// module tree.

use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    config::Config,
    module::Module,
    nn::{
        transformer::{TransformerEncoder, TransformerEncoderConfig, TransformerEncoderInput},
        Dropout, DropoutConfig, Embedding, EmbeddingConfig, LayerNorm, LayerNormConfig,
    },
    record::{FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Int, Tensor},
};
use burn_import::pytorch::{LoadArgs, PyTorchFileRecorder};
use hf_hub::api::sync::Api;
use serde::Deserialize;

use crate::error::{ClassifierError, Result};

/// Hugging Face parameter names -> field paths of `BertEncoder`, applied in order.
const KEY_REMAP: &[(&str, &str)] = &[
    ("^bert\\.", ""),
    ("\\.gamma$", ".weight"),
    ("\\.beta$", ".bias"),
    ("^embeddings\\.LayerNorm", "embeddings.layer_norm"),
    (
        "^encoder\\.layer\\.([0-9]+)\\.attention\\.self\\.(query|key|value)",
        "encoder.layers.$1.mha.$2",
    ),
    (
        "^encoder\\.layer\\.([0-9]+)\\.attention\\.output\\.dense",
        "encoder.layers.$1.mha.output",
    ),
    (
        "^encoder\\.layer\\.([0-9]+)\\.attention\\.output\\.LayerNorm",
        "encoder.layers.$1.norm_1",
    ),
    (
        "^encoder\\.layer\\.([0-9]+)\\.intermediate\\.dense",
        "encoder.layers.$1.pwff.linear_inner",
    ),
    (
        "^encoder\\.layer\\.([0-9]+)\\.output\\.dense",
        "encoder.layers.$1.pwff.linear_outer",
    ),
    (
        "^encoder\\.layer\\.([0-9]+)\\.output\\.LayerNorm",
        "encoder.layers.$1.norm_2",
    ),
];

#[derive(Config, Debug)]
pub struct BertEncoderConfig {
    #[config(default = 30522)]
    pub vocab_size: usize,
    #[config(default = 768)]
    pub hidden_size: usize,
    #[config(default = 12)]
    pub num_hidden_layers: usize,
    #[config(default = 12)]
    pub num_attention_heads: usize,
    #[config(default = 3072)]
    pub intermediate_size: usize,
    #[config(default = 512)]
    pub max_position_embeddings: usize,
    #[config(default = 2)]
    pub type_vocab_size: usize,
    #[config(default = 0.1)]
    pub hidden_dropout_prob: f64,
    #[config(default = 1e-12)]
    pub layer_norm_eps: f64,
}

/// Subset of a Hugging Face `config.json` for BERT models.
#[derive(Deserialize)]
struct HfBertConfig {
    vocab_size: usize,
    hidden_size: usize,
    num_hidden_layers: usize,
    num_attention_heads: usize,
    intermediate_size: usize,
    max_position_embeddings: usize,
    type_vocab_size: usize,
    hidden_dropout_prob: f64,
    #[serde(default = "default_layer_norm_eps")]
    layer_norm_eps: f64,
}

fn default_layer_norm_eps() -> f64 {
    1e-12
}

#[derive(Module, Debug)]
pub struct BertEmbeddings<B: Backend> {
    word_embeddings: Embedding<B>,
    position_embeddings: Embedding<B>,
    token_type_embeddings: Embedding<B>,
    layer_norm: LayerNorm<B>,
    dropout: Dropout,
}

#[derive(Module, Debug)]
pub struct BertEncoder<B: Backend> {
    embeddings: BertEmbeddings<B>,
    encoder: TransformerEncoder<B>,
    hidden_size: usize,
}

impl BertEncoderConfig {
    /// Reads the architecture from a Hugging Face `config.json`.
    pub fn from_hf_json(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let hf: HfBertConfig =
            serde_json::from_str(&raw).map_err(|err| ClassifierError::Config(err.to_string()))?;

        Ok(Self::new()
            .with_vocab_size(hf.vocab_size)
            .with_hidden_size(hf.hidden_size)
            .with_num_hidden_layers(hf.num_hidden_layers)
            .with_num_attention_heads(hf.num_attention_heads)
            .with_intermediate_size(hf.intermediate_size)
            .with_max_position_embeddings(hf.max_position_embeddings)
            .with_type_vocab_size(hf.type_vocab_size)
            .with_hidden_dropout_prob(hf.hidden_dropout_prob)
            .with_layer_norm_eps(hf.layer_norm_eps))
    }

    /// Initializes an encoder with random weights.
    pub fn init<B: Backend>(&self, device: &B::Device) -> BertEncoder<B> {
        let embeddings = BertEmbeddings {
            word_embeddings: EmbeddingConfig::new(self.vocab_size, self.hidden_size).init(device),
            position_embeddings: EmbeddingConfig::new(
                self.max_position_embeddings,
                self.hidden_size,
            )
            .init(device),
            token_type_embeddings: EmbeddingConfig::new(self.type_vocab_size, self.hidden_size)
                .init(device),
            layer_norm: LayerNormConfig::new(self.hidden_size)
                .with_epsilon(self.layer_norm_eps)
                .init(device),
            dropout: DropoutConfig::new(self.hidden_dropout_prob).init(),
        };

        let encoder = TransformerEncoderConfig::new(
            self.hidden_size,
            self.intermediate_size,
            self.num_attention_heads,
            self.num_hidden_layers,
        )
        .with_dropout(self.hidden_dropout_prob)
        .init(device);

        BertEncoder {
            embeddings,
            encoder,
            hidden_size: self.hidden_size,
        }
    }

    /// Initializes an encoder and loads weights from a PyTorch BERT checkpoint
    /// (`pytorch_model.bin`).
    pub fn init_pretrained<B: Backend>(
        &self,
        weights: impl AsRef<Path>,
        device: &B::Device,
    ) -> Result<BertEncoder<B>> {
        let weights = weights.as_ref();
        tracing::info!("Importing pretrained weights from {}", weights.display());

        let record: BertEncoderRecord<B> = PyTorchFileRecorder::<FullPrecisionSettings>::default()
            .load(load_args(weights.to_path_buf()), device)
            .map_err(|err| ClassifierError::WeightImport {
                path: weights.display().to_string(),
                reason: err.to_string(),
            })?;

        Ok(self.init(device).load_record(record))
    }
}

/// Architecture and weight file of a BERT model on the Hugging Face hub.
#[derive(Debug, Clone)]
pub struct HubCheckpoint {
    pub config: BertEncoderConfig,
    pub weights: PathBuf,
}

impl HubCheckpoint {
    /// Downloads `config.json` and `pytorch_model.bin` of `model_id` (e.g.
    /// `bert-base-uncased`), or reuses them from the local hub cache.
    pub fn fetch(model_id: &str) -> Result<Self> {
        let api = Api::new().map_err(ClassifierError::hub)?;
        Self::fetch_with(&api, model_id)
    }

    pub fn fetch_with(api: &Api, model_id: &str) -> Result<Self> {
        tracing::info!("Fetching '{model_id}' from the Hugging Face hub");
        let repo = api.model(model_id.to_string());
        let config = repo.get("config.json").map_err(ClassifierError::hub)?;
        let weights = repo.get("pytorch_model.bin").map_err(ClassifierError::hub)?;

        Ok(Self {
            config: BertEncoderConfig::from_hf_json(config)?,
            weights,
        })
    }
}

fn load_args(path: PathBuf) -> LoadArgs {
    KEY_REMAP
        .iter()
        .fold(LoadArgs::new(path), |args, (pattern, replacement)| {
            args.with_key_remap(pattern, replacement)
        })
}

impl<B: Backend> BertEncoder<B> {
    /// Final hidden states, shape [batch_size, seq_length, hidden_size].
    pub fn forward(
        &self,
        input_ids: Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 3> {
        let [batch_size, seq_length] = input_ids.dims();
        let device = input_ids.device();

        let positions = Tensor::arange(0..seq_length, &device)
            .reshape([1, seq_length])
            .repeat(0, batch_size);
        let token_types = Tensor::<B, 2, Int>::zeros([batch_size, seq_length], &device);

        let embedded = self.embeddings.word_embeddings.forward(input_ids)
            + self.embeddings.position_embeddings.forward(positions)
            + self.embeddings.token_type_embeddings.forward(token_types);
        let embedded = self
            .embeddings
            .dropout
            .forward(self.embeddings.layer_norm.forward(embedded));

        let mask_pad = attention_mask.equal_elem(0);
        self.encoder
            .forward(TransformerEncoderInput::new(embedded).mask_pad(mask_pad))
    }

    /// Hidden state of the first (`[CLS]`) token, shape [batch_size, hidden_size].
    pub fn cls_hidden_state(
        &self,
        input_ids: Tensor<B, 2, Int>,
        attention_mask: Tensor<B, 2, Int>,
    ) -> Tensor<B, 2> {
        let [batch_size, _] = input_ids.dims();
        self.forward(input_ids, attention_mask)
            .slice([0..batch_size, 0..1, 0..self.hidden_size])
            .reshape([batch_size, self.hidden_size])
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    pub fn word_embeddings(&self) -> &Embedding<B> {
        &self.embeddings.word_embeddings
    }
}

#[cfg(test)]
pub(crate) fn tiny_encoder_config() -> BertEncoderConfig {
    BertEncoderConfig::new()
        .with_vocab_size(30)
        .with_hidden_size(16)
        .with_num_hidden_layers(1)
        .with_num_attention_heads(2)
        .with_intermediate_size(32)
        .with_max_position_embeddings(16)
}
