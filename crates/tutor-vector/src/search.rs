use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use tutor_core::error::{Error, Result};
use tutor_core::snapshot::SnapshotCell;
use tutor_core::traits::{AnnIndex, Embedder};
use tutor_core::types::{Chunk, RetrievalHit, SourceKind};

/// Immutable vector index plus the chunk metadata its row ids point into.
pub struct VectorSnapshot {
    index: Arc<dyn AnnIndex>,
    chunks: Vec<Arc<Chunk>>,
}

impl VectorSnapshot {
    /// Row counts may differ; ids past the end of `chunks` are skipped at
    /// query time.
    pub fn new(index: Arc<dyn AnnIndex>, chunks: Vec<Arc<Chunk>>) -> Self {
        if index.len() != chunks.len() {
            warn!(index_rows = index.len(), chunks = chunks.len(), "vector index and metadata are out of sync");
        }
        Self { index, chunks }
    }

    pub fn dim(&self) -> usize { self.index.dim() }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }
}

pub struct VectorSearcher {
    embedder: Arc<dyn Embedder>,
    snapshot: SnapshotCell<VectorSnapshot>,
}

impl VectorSearcher {
    /// Fails with `DimensionMismatch` when the index was built with a
    /// different embedding width than the runtime backend.
    pub fn new(embedder: Arc<dyn Embedder>, snapshot: VectorSnapshot) -> Result<Self> {
        check_dim(embedder.as_ref(), &snapshot)?;
        Ok(Self { embedder, snapshot: SnapshotCell::new(snapshot) })
    }

    /// The `k` nearest chunks by cosine similarity, best first. Embedding or
    /// index failures are logged and produce an empty list.
    #[instrument(skip_all, fields(k = k))]
    pub async fn search(&self, query: &str, k: usize) -> Vec<RetrievalHit> {
        if query.trim().is_empty() || k == 0 {
            return Vec::new();
        }
        let query_vec = match self.embedder.embed_batch(&[query.to_string()]).await {
            Ok(mut rows) if rows.len() == 1 => rows.remove(0),
            Ok(rows) => {
                error!(rows = rows.len(), "embedding backend returned wrong number of rows");
                return Vec::new();
            }
            Err(e) => {
                error!(error = %e, "query embedding failed");
                return Vec::new();
            }
        };

        let snapshot = self.snapshot.load();
        let result = match snapshot.index.search(&[query_vec], k) {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "vector index search failed");
                return Vec::new();
            }
        };

        let (Some(scores), Some(ids)) = (result.scores.first(), result.ids.first()) else {
            return Vec::new();
        };
        let mut hits = Vec::with_capacity(ids.len());
        for (&score, &id) in scores.iter().zip(ids) {
            if id < 0 {
                continue;
            }
            match snapshot.chunks.get(id as usize) {
                Some(chunk) => hits.push(RetrievalHit::new(score, Arc::clone(chunk), SourceKind::Vector)),
                None => warn!(id, chunks = snapshot.chunks.len(), "index row out of range for metadata"),
            }
        }
        hits
    }

    /// Atomically replaces the index after the same dimension check as `new`.
    pub fn reload(&self, snapshot: VectorSnapshot) -> Result<()> {
        check_dim(self.embedder.as_ref(), &snapshot)?;
        let previous = self.snapshot.swap(snapshot);
        debug!(previous = previous.len(), current = self.len(), "vector snapshot swapped");
        Ok(())
    }

    pub fn len(&self) -> usize { self.snapshot.load().len() }

    pub fn is_empty(&self) -> bool { self.snapshot.load().is_empty() }
}

fn check_dim(embedder: &dyn Embedder, snapshot: &VectorSnapshot) -> Result<()> {
    if embedder.dim() != snapshot.dim() {
        return Err(Error::DimensionMismatch { stored: snapshot.dim(), runtime: embedder.dim() });
    }
    Ok(())
}
