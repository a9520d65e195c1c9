// Pre-tokenized classification examples. Sentences are cleaned and encoded once up
// front (`preprocessing_for_bert`), then held in memory as fixed-length id/mask rows
// with an optional label per row.

use burn::data::dataset::{Dataset, InMemDataset};
use derive_new::new;

use super::preprocess::text_preprocessing_simple;
use super::tokenizer::{EncodedText, Tokenizer};
use crate::error::{ClassifierError, Result};

/// One encoded sentence with its (optional) class label.
#[derive(new, Clone, Debug, PartialEq)]
pub struct ClassificationItem {
    pub input_ids: Vec<u32>,     // Token ids, padded to the configured length
    pub attention_mask: Vec<u32>, // 1 for real tokens, 0 for padding
    pub label: Option<usize>,    // Class index, absent for unlabeled data
}

/// Output of `preprocessing_for_bert`: one id row and one mask row per sentence.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EncodedSentences {
    pub input_ids: Vec<Vec<u32>>,
    pub attention_masks: Vec<Vec<u32>>,
}

impl EncodedSentences {
    pub fn len(&self) -> usize {
        self.input_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_ids.is_empty()
    }
}

impl FromIterator<EncodedText> for EncodedSentences {
    fn from_iter<T: IntoIterator<Item = EncodedText>>(iter: T) -> Self {
        let (input_ids, attention_masks) = iter
            .into_iter()
            .map(|encoded| (encoded.input_ids, encoded.attention_mask))
            .unzip();
        Self {
            input_ids,
            attention_masks,
        }
    }
}

/// Cleans every sentence and encodes it with special tokens, truncated and padded to
/// exactly `max_len` tokens.
pub fn preprocessing_for_bert<S: AsRef<str>>(
    sentences: &[S],
    tokenizer: &dyn Tokenizer,
    max_len: usize,
) -> Result<EncodedSentences> {
    let cleaned: Vec<String> = sentences
        .iter()
        .map(|sentence| text_preprocessing_simple(sentence.as_ref()))
        .collect();

    let encoded = tokenizer.encode_fixed(&cleaned, max_len)?;
    Ok(encoded.into_iter().collect())
}

/// Longest encoded length (special tokens included, nothing truncated) over the
/// training sentences and, when given, the validation sentences.
pub fn max_encoded_len<S: AsRef<str>>(
    tokenizer: &dyn Tokenizer,
    train: &[S],
    val: Option<&[S]>,
) -> Result<usize> {
    let sentences = train.iter().chain(val.unwrap_or_default());

    let mut max_len = 0;
    for sentence in sentences {
        max_len = max_len.max(tokenizer.encode(sentence.as_ref())?.len());
    }
    Ok(max_len)
}

/// In-memory dataset of encoded sentences.
pub struct ClassificationDataset {
    dataset: InMemDataset<ClassificationItem>,
}

impl Dataset<ClassificationItem> for ClassificationDataset {
    fn get(&self, index: usize) -> Option<ClassificationItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}

impl ClassificationDataset {
    /// Pairs every encoded row with its label. Labels must line up one-to-one with the
    /// rows and lie in `0..num_classes`.
    pub fn labeled(
        encoded: EncodedSentences,
        labels: &[usize],
        num_classes: usize,
    ) -> Result<Self> {
        if labels.len() != encoded.len() {
            return Err(ClassifierError::InvalidConfig(format!(
                "{} labels for {} sentences",
                labels.len(),
                encoded.len()
            )));
        }
        if let Some(&label) = labels.iter().find(|&&label| label >= num_classes) {
            return Err(ClassifierError::LabelOutOfRange { label, num_classes });
        }

        Ok(Self::from_parts(encoded, labels.iter().copied().map(Some)))
    }

    /// Rows without labels, for prediction.
    pub fn unlabeled(encoded: EncodedSentences) -> Self {
        let len = encoded.len();
        Self::from_parts(encoded, std::iter::repeat(None).take(len))
    }

    /// Labels of every item, or `None` if any item is unlabeled.
    pub fn labels(&self) -> Option<Vec<usize>> {
        self.dataset.iter().map(|item| item.label).collect()
    }

    fn from_parts(encoded: EncodedSentences, labels: impl Iterator<Item = Option<usize>>) -> Self {
        let items = encoded
            .input_ids
            .into_iter()
            .zip(encoded.attention_masks)
            .zip(labels)
            .map(|((input_ids, attention_mask), label)| {
                ClassificationItem::new(input_ids, attention_mask, label)
            })
            .collect();

        Self {
            dataset: InMemDataset::new(items),
        }
    }
}
