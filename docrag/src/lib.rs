//! docrag - Ask questions about a documentation table
//!
//! This is the convenience wrapper crate that re-exports `docrag-core`.
//!
//! # Quick Start
//!
//! ```toml
//! [dependencies]
//! docrag = "0.1"
//! ```

// Re-export core
pub use docrag_core::*;

/// Prelude module for convenient imports
pub mod prelude {
    pub use docrag_core::chat::{ChatSession, Confidence, REFUSAL};
    pub use docrag_core::rag::{RagEngine, Retriever};
    pub use docrag_core::{
        create_generator, Answerer, AttributeRecord, Config, Extractor, Provider,
    };
}
