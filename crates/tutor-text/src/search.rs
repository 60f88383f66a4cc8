use std::sync::Arc;
use tracing::{debug, instrument};

use tutor_core::error::{Error, Result};
use tutor_core::snapshot::SnapshotCell;
use tutor_core::types::{Chunk, RetrievalHit, SourceKind};

use crate::okapi::Bm25Model;
use crate::tokenize::tokenize;

/// Immutable lexical index: BM25 model plus the chunk metadata it was built
/// from, aligned by position.
pub struct LexicalSnapshot {
    chunks: Vec<Arc<Chunk>>,
    model: Bm25Model,
}

impl LexicalSnapshot {
    pub fn new(chunks: Vec<Arc<Chunk>>, model: Bm25Model) -> Result<Self> {
        if chunks.len() != model.len() {
            return Err(Error::Operation(format!(
                "BM25 corpus has {} documents but metadata has {} chunks",
                model.len(),
                chunks.len()
            )));
        }
        Ok(Self { chunks, model })
    }

    /// Builds the model from every chunk's text in one pass.
    pub fn from_chunks(chunks: Vec<Arc<Chunk>>) -> Self {
        let corpus: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let model = Bm25Model::build(&corpus);
        Self { chunks, model }
    }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }
}

pub struct LexicalSearcher {
    snapshot: SnapshotCell<LexicalSnapshot>,
}

impl LexicalSearcher {
    pub fn new(snapshot: LexicalSnapshot) -> Self {
        Self { snapshot: SnapshotCell::new(snapshot) }
    }

    /// Top `k` chunks by descending BM25 score. A query without tokens, or
    /// one matching nothing, yields an empty list.
    #[instrument(skip_all, fields(k = k))]
    pub fn search(&self, query: &str, k: usize) -> Vec<RetrievalHit> {
        if tokenize(query).is_empty() {
            debug!("query has no lexical tokens");
            return Vec::new();
        }
        let snapshot = self.snapshot.load();
        snapshot
            .model
            .top_k(query, k)
            .into_iter()
            .map(|(idx, score)| RetrievalHit::new(score, Arc::clone(&snapshot.chunks[idx]), SourceKind::Lexical))
            .collect()
    }

    /// Atomically replaces the index; searches already running keep the old one.
    pub fn reload(&self, snapshot: LexicalSnapshot) {
        let previous = self.snapshot.swap(snapshot);
        debug!(previous = previous.len(), current = self.len(), "lexical snapshot swapped");
    }

    pub fn len(&self) -> usize { self.snapshot.load().len() }

    pub fn is_empty(&self) -> bool { self.snapshot.load().is_empty() }
}
