use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use tutor_core::error::Result;
use tutor_core::settings::Settings;
use tutor_core::traits::KnowledgeSource;
use tutor_core::types::{ExternalRecord, FusedResult, RetrievalHit};
use tutor_text::{LexicalSearcher, LexicalSnapshot};
use tutor_vector::{VectorSearcher, VectorSnapshot};

use crate::context::render_context;
use crate::dedup::Deduplicator;
use crate::expand::QueryExpander;
use crate::fusion::reciprocal_rank_fusion;
use crate::trigger::should_augment;

/// Per-request switches. Defaults come from `retrieval.*` settings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrieveOptions {
    pub top_k: usize,
    pub multi_query: bool,
    pub variants: usize,
    pub hybrid: bool,
    pub rrf_k: f32,
    pub external: bool,
    /// Deadline for the external lookup, counted from the start of the
    /// request. Local results are returned without it once it passes.
    pub external_timeout: Duration,
}

impl Default for RetrieveOptions {
    fn default() -> Self { Self::from_settings(&Settings::default()) }
}

impl RetrieveOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let r = &settings.retrieval;
        Self {
            top_k: r.top_k,
            multi_query: r.multi_query.enabled,
            variants: r.multi_query.variants,
            hybrid: r.hybrid.enabled,
            rrf_k: r.hybrid.rrf_k,
            external: settings.external.enabled,
            external_timeout: settings.external.request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RetrievalOutcome {
    /// Local results plus the external hit, if any, best first.
    pub results: Vec<FusedResult>,
    pub external: Option<ExternalRecord>,
    pub variants: Vec<String>,
}

impl RetrievalOutcome {
    fn empty() -> Self { Self { results: Vec::new(), external: None, variants: Vec::new() } }

    /// No source contributed anything; callers answer "insufficient context".
    pub fn is_empty(&self) -> bool { self.results.is_empty() }

    pub fn context(&self) -> String { render_context(&self.results) }
}

/// Expands the query, runs vector + lexical retrieval per variant (fused
/// with RRF), de-duplicates across variants and, for topical queries, adds
/// one external record fetched concurrently.
///
/// Every contribution fails independently: a failing variant, retriever or
/// external lookup only removes its own hits.
pub struct HybridOrchestrator {
    vector: Arc<VectorSearcher>,
    lexical: Arc<LexicalSearcher>,
    expander: QueryExpander,
    dedup: Deduplicator,
    external: Option<Arc<dyn KnowledgeSource>>,
}

impl HybridOrchestrator {
    pub fn new(vector: Arc<VectorSearcher>, lexical: Arc<LexicalSearcher>, expander: QueryExpander, dedup: Deduplicator) -> Self {
        Self { vector, lexical, expander, dedup, external: None }
    }

    pub fn with_external(mut self, source: Arc<dyn KnowledgeSource>) -> Self {
        self.external = Some(source);
        self
    }

    /// Swaps in a new index pair. The vector side is checked first so a
    /// dimension mismatch leaves both searchers on the old snapshot.
    pub fn reload(&self, vector: VectorSnapshot, lexical: LexicalSnapshot) -> Result<()> {
        self.vector.reload(vector)?;
        self.lexical.reload(lexical);
        info!(chunks = self.lexical.len(), "index snapshots reloaded");
        Ok(())
    }

    #[instrument(skip_all, fields(top_k = opts.top_k))]
    pub async fn retrieve(&self, query: &str, opts: &RetrieveOptions) -> RetrievalOutcome {
        if query.trim().is_empty() {
            warn!("empty query");
            return RetrievalOutcome::empty();
        }

        // Started first so it overlaps expansion as well as local search.
        let external_task = match &self.external {
            Some(source) if opts.external && should_augment(query) => {
                let source = Arc::clone(source);
                let query = query.to_string();
                let deadline = Instant::now() + opts.external_timeout;
                Some((tokio::spawn(async move { source.lookup(&query).await }), deadline))
            }
            _ => None,
        };

        let variants = if opts.multi_query {
            self.expander.expand(query, opts.variants).await
        } else {
            vec![query.to_string()]
        };
        debug!(?variants, "retrieving");

        let mut tasks = JoinSet::new();
        for (i, variant) in variants.iter().enumerate() {
            let vector = Arc::clone(&self.vector);
            let lexical = Arc::clone(&self.lexical);
            let variant = variant.clone();
            let opts = opts.clone();
            tasks.spawn(async move { (i, retrieve_variant(&vector, &lexical, &variant, &opts).await) });
        }
        let mut per_variant: Vec<Vec<RetrievalHit>> = vec![Vec::new(); variants.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((i, hits)) => per_variant[i] = hits,
                Err(e) => error!(error = %e, "variant retrieval failed"),
            }
        }
        // Variant order, not completion order, keeps the result deterministic.
        let hits: Vec<RetrievalHit> = per_variant.into_iter().flatten().collect();
        let mut results = self.dedup.dedupe(&hits, opts.top_k);

        let external = match external_task {
            Some((mut task, deadline)) => match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(record)) => record,
                Ok(Err(e)) => {
                    error!(error = %e, "external lookup task failed");
                    None
                }
                Err(_) => {
                    task.abort();
                    warn!(timeout = ?opts.external_timeout, "external lookup timed out, using local results only");
                    None
                }
            },
            None => None,
        };
        if let Some(record) = &external {
            results.push(record.to_fused_result());
            results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        }

        if results.is_empty() {
            info!("no usable context from any source");
        }
        RetrievalOutcome { results, external, variants }
    }
}

async fn retrieve_variant(
    vector: &VectorSearcher,
    lexical: &LexicalSearcher,
    query: &str,
    opts: &RetrieveOptions,
) -> Vec<RetrievalHit> {
    if !opts.hybrid {
        return vector.search(query, opts.top_k).await;
    }
    let (dense, sparse) = tokio::join!(vector.search(query, opts.top_k), async { lexical.search(query, opts.top_k) });
    debug!(query, dense = dense.len(), sparse = sparse.len(), "variant retrieved");
    reciprocal_rank_fusion(&[dense, sparse], opts.rrf_k, opts.top_k)
}
