//! tutor-hybrid
//!
//! Query-time orchestration: paraphrase expansion, vector + BM25 retrieval
//! per variant fused with Reciprocal Rank Fusion, cross-variant
//! de-duplication and optional external augmentation.

pub mod context;
pub mod dedup;
pub mod expand;
pub mod fusion;
pub mod orchestrator;
pub mod trigger;

pub use context::{render_context, INSUFFICIENT_CONTEXT};
pub use dedup::Deduplicator;
pub use expand::QueryExpander;
pub use fusion::{reciprocal_rank_fusion, DEFAULT_RRF_K};
pub use orchestrator::{HybridOrchestrator, RetrievalOutcome, RetrieveOptions};
pub use trigger::should_augment;
