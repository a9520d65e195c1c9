//! Error types shared by tokenization, weight import, training and evaluation.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Failed to import pretrained weights from {path}: {reason}")]
    WeightImport { path: String, reason: String },

    #[error("Hugging Face hub error: {0}")]
    Hub(String),

    #[error("Failed to read model config: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Batch has no labels; evaluation and training need labeled examples")]
    MissingLabels,

    #[error("Label {label} is out of range for {num_classes} classes")]
    LabelOutOfRange { label: usize, num_classes: usize },

    #[error("Data loader yielded no batches")]
    EmptyLoader,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ClassifierError {
    pub(crate) fn tokenizer(err: impl std::fmt::Display) -> Self {
        Self::Tokenizer(err.to_string())
    }

    pub(crate) fn hub(err: impl std::fmt::Display) -> Self {
        Self::Hub(err.to_string())
    }
}

pub type Result<T, E = ClassifierError> = std::result::Result<T, E>;
