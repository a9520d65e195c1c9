mod batcher;
mod bow;
mod dataset;
mod loader;
mod preprocess;
mod sampler;
mod tokenizer;

pub use batcher::*;
pub use bow::*;
pub use dataset::*;
pub use loader::*;
pub use preprocess::*;
pub use sampler::*;
pub use tokenizer::*;
