//! Collaborator seams. Everything the retrieval core consumes but does not
//! own (embedding model, ANN index, text generation, external knowledge)
//! sits behind one of these traits so tests can substitute fakes.

use async_trait::async_trait;

use crate::types::ExternalRecord;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the backend/model pair (e.g. `ollama:nomic-embed-text`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Returns one L2-normalized row per input. Backend failures must be
    /// reported as errors, never as malformed shapes.
    async fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Scores and row ids for each query vector, best first. An id of `-1`
/// means "no hit" and must be skipped by callers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnResult {
    pub scores: Vec<Vec<f32>>,
    pub ids: Vec<Vec<i64>>,
}

pub trait AnnIndex: Send + Sync {
    fn dim(&self) -> usize;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool { self.len() == 0 }
    fn search(&self, queries: &[Vec<f32>], k: usize) -> anyhow::Result<AnnResult>;
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Supplementary knowledge lookup. Implementations contain every failure and
/// answer `None` instead of erroring.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    async fn lookup(&self, query: &str) -> Option<ExternalRecord>;
}
