pub mod clip;
pub mod data_processing;
pub mod encoder;
pub mod error;
pub mod inference;
pub mod model;
pub mod scheduler;
pub mod training;

pub use data_processing::{
    preprocessing_for_bert, BertUncasedTokenizer, BowVectorizer, ClassificationDataset, Tokenizer,
};
pub use encoder::HubCheckpoint;
pub use error::{ClassifierError, Result};
pub use inference::{evaluate, predict, Evaluation};
pub use model::{BertClassifier, BertClassifierConfig};
pub use scheduler::{LinearLrScheduler, LinearLrSchedulerConfig};
pub use training::{initialize_model, train, EncoderWeights, EpochSummary, TrainingConfig};
