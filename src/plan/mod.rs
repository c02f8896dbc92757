//! Plan Generation Core
//!
//! The assessment-to-plan pipeline: context building, prompt templating,
//! the generative-AI boundary with its deterministic fallback, entity-graph
//! assembly with skill-gap analysis, and progress recalculation.

pub mod assembler;
pub mod context;
pub mod fallback;
pub mod llm;
pub mod progress;
pub mod prompt;
pub mod store;
pub mod timeline;
pub mod types;

pub use context::AssessmentContext;
pub use store::Store;
pub use types::*;
