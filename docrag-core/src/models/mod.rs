//! Known embedding models and their vector dimensions.

mod registry;

pub use registry::{default_models, EmbeddingModel, ModelRegistry};
