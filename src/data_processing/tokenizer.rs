// Tokenizer trait shared by the data pipeline and a BERT uncased implementation backed
// by the `tokenizers` crate. Padding and truncation are delegated to the library:
// `encode_fixed` configures a copy of the pretrained tokenizer with a fixed padding
// strategy and a truncation limit, then runs a batch encode.

use std::path::Path;

use derive_new::new;
use tokenizers::{PaddingParams, PaddingStrategy, TruncationParams};

use crate::error::{ClassifierError, Result};

/// Name of the pretrained checkpoint this crate targets.
pub const BERT_BASE_UNCASED: &str = "bert-base-uncased";

/// Ids and mask for one sentence, both exactly `max_len` long.
#[derive(new, Clone, Debug, PartialEq, Eq)]
pub struct EncodedText {
    pub input_ids: Vec<u32>,
    pub attention_mask: Vec<u32>,
}

pub trait Tokenizer: Send + Sync {
    /// Encodes a sentence with special tokens and without padding or truncation.
    fn encode(&self, value: &str) -> Result<Vec<u32>>;

    /// Encodes sentences with special tokens, truncated and padded to `max_len`.
    fn encode_fixed(&self, values: &[String], max_len: usize) -> Result<Vec<EncodedText>>;

    /// Converts token ids back into a string.
    fn decode(&self, tokens: &[u32]) -> Result<String>;

    /// Size of the vocabulary, including added tokens.
    fn vocab_size(&self) -> usize;

    /// Id used to pad sequences to equal length.
    fn pad_token(&self) -> u32;

    /// String form of the padding token.
    fn pad_token_value(&self) -> Result<String> {
        self.decode(&[self.pad_token()])
    }
}

/// WordPiece tokenizer following the BERT uncased conventions (`[CLS]`, `[SEP]`, `[PAD]`).
#[derive(Clone)]
pub struct BertUncasedTokenizer {
    tokenizer: tokenizers::Tokenizer,
    pad_token: String,
    pad_id: u32,
}

impl BertUncasedTokenizer {
    /// Downloads (or reads from the local cache) the tokenizer of a pretrained model.
    pub fn pretrained(identifier: &str) -> Result<Self> {
        tracing::info!("Loading pretrained tokenizer '{identifier}'");
        let tokenizer = tokenizers::Tokenizer::from_pretrained(identifier, None)
            .map_err(ClassifierError::tokenizer)?;
        Self::from_tokenizer(tokenizer)
    }

    /// Loads a serialized `tokenizer.json`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("Loading tokenizer from {}", path.display());
        let tokenizer =
            tokenizers::Tokenizer::from_file(path).map_err(ClassifierError::tokenizer)?;
        Self::from_tokenizer(tokenizer)
    }

    /// Wraps an already built tokenizer. Any padding or truncation configured on it is
    /// cleared so that `encode` reports natural lengths.
    pub fn from_tokenizer(mut tokenizer: tokenizers::Tokenizer) -> Result<Self> {
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(None)
            .map_err(ClassifierError::tokenizer)?;

        let pad_token = "[PAD]".to_string();
        let pad_id = tokenizer
            .token_to_id(&pad_token)
            .ok_or_else(|| ClassifierError::Tokenizer("vocabulary has no [PAD] token".into()))?;

        Ok(Self {
            tokenizer,
            pad_token,
            pad_id,
        })
    }

    fn fixed_length(&self, max_len: usize) -> Result<tokenizers::Tokenizer> {
        let mut tokenizer = self.tokenizer.clone();
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(max_len),
            pad_id: self.pad_id,
            pad_token: self.pad_token.clone(),
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_len,
                ..Default::default()
            }))
            .map_err(ClassifierError::tokenizer)?;
        Ok(tokenizer)
    }
}

impl Tokenizer for BertUncasedTokenizer {
    fn encode(&self, value: &str) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(value, true)
            .map_err(ClassifierError::tokenizer)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn encode_fixed(&self, values: &[String], max_len: usize) -> Result<Vec<EncodedText>> {
        if max_len < 2 {
            return Err(ClassifierError::InvalidConfig(format!(
                "max_len {max_len} leaves no room for [CLS] and [SEP]"
            )));
        }

        let tokenizer = self.fixed_length(max_len)?;
        let encodings = tokenizer
            .encode_batch(values.to_vec(), true)
            .map_err(ClassifierError::tokenizer)?;

        Ok(encodings
            .into_iter()
            .map(|encoding| {
                EncodedText::new(
                    encoding.get_ids().to_vec(),
                    encoding.get_attention_mask().to_vec(),
                )
            })
            .collect())
    }

    fn decode(&self, tokens: &[u32]) -> Result<String> {
        self.tokenizer
            .decode(tokens, false)
            .map_err(ClassifierError::tokenizer)
    }

    fn vocab_size(&self) -> usize {
        self.tokenizer.get_vocab_size(true)
    }

    fn pad_token(&self) -> u32 {
        self.pad_id
    }
}

#[cfg(test)]
const TEST_VOCAB: &[&str] = &[
    "[PAD]", "[UNK]", "[CLS]", "[SEP]", "[MASK]", "the", "movie", "was", "great", "bad",
    "terrible", "good", "i", "loved", "hated", "it", "not", "very", "plot", "acting", "!",
    ",", ".", "?", "##s", "##ing", "fun", "boring", "and", "a",
];

/// Small in-memory WordPiece tokenizer with the BERT pipeline, no network needed.
#[cfg(test)]
pub(crate) fn test_tokenizer() -> BertUncasedTokenizer {
    use std::collections::HashMap;
    use tokenizers::models::wordpiece::WordPiece;
    use tokenizers::models::ModelWrapper;
    use tokenizers::normalizers::{BertNormalizer, NormalizerWrapper};
    use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
    use tokenizers::pre_tokenizers::PreTokenizerWrapper;
    use tokenizers::processors::bert::BertProcessing;
    use tokenizers::processors::PostProcessorWrapper;

    let vocab: HashMap<String, u32> = TEST_VOCAB
        .iter()
        .enumerate()
        .map(|(id, token)| (token.to_string(), id as u32))
        .collect();
    let model = WordPiece::builder()
        .vocab(vocab)
        .unk_token("[UNK]".to_string())
        .build()
        .unwrap();

    let mut tokenizer = tokenizers::Tokenizer::new(ModelWrapper::from(model));
    tokenizer.with_normalizer(NormalizerWrapper::from(BertNormalizer::default()));
    tokenizer.with_pre_tokenizer(PreTokenizerWrapper::from(BertPreTokenizer));
    tokenizer.with_post_processor(PostProcessorWrapper::from(BertProcessing::new(
        ("[SEP]".to_string(), 3),
        ("[CLS]".to_string(), 2),
    )));

    BertUncasedTokenizer::from_tokenizer(tokenizer).unwrap()
}
