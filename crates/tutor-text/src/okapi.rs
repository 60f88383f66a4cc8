//! Okapi BM25 over the chunk corpus, backed by the `bm25` crate.
//!
//! Document `i` of the model corresponds to chunk `i` of the metadata array.
//! Documents and queries go through the same `tokenize` so lexical matching
//! does not depend on the crate's stemming or stop-word lists.

use bm25::{Embedder, EmbedderBuilder, Scorer};

use crate::tokenize::tokenize;

/// Plugs the crate-wide tokenizer into the BM25 embedder.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl bm25::Tokenizer for WordTokenizer {
    fn tokenize(&self, input_text: &str) -> Vec<String> {
        tokenize(input_text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f32,
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self { Self { k1: 1.5, b: 0.75 } }
}

pub struct Bm25Model {
    embedder: Embedder<u32, WordTokenizer>,
    scorer: Scorer<usize>,
    len: usize,
}

impl Bm25Model {
    pub fn build<S: AsRef<str>>(docs: &[S]) -> Self {
        Self::with_params(docs, Bm25Params::default())
    }

    pub fn with_params<S: AsRef<str>>(docs: &[S], params: Bm25Params) -> Self {
        let total_tokens: usize = docs.iter().map(|d| tokenize(d.as_ref()).len()).sum();
        let avgdl = if total_tokens == 0 { 1.0 } else { total_tokens as f32 / docs.len() as f32 };
        let embedder = EmbedderBuilder::<u32, WordTokenizer>::with_avgdl(avgdl)
            .k1(params.k1)
            .b(params.b)
            .build();

        let mut scorer = Scorer::<usize>::new();
        for (idx, doc) in docs.iter().enumerate() {
            scorer.upsert(&idx, embedder.embed(doc.as_ref()));
        }
        Self { embedder, scorer, len: docs.len() }
    }

    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Score of one document, `0.0` when it shares no term with the query.
    pub fn score(&self, query: &str, doc: usize) -> f32 {
        let query = self.embedder.embed(query);
        self.scorer.score(&doc, &query).unwrap_or(0.0)
    }

    /// Top `k` documents with a positive score, best first. Equal scores keep
    /// corpus order.
    pub fn top_k(&self, query: &str, k: usize) -> Vec<(usize, f32)> {
        let query = self.embedder.embed(query);
        let mut ranked: Vec<(usize, f32)> = self
            .scorer
            .matches(&query)
            .into_iter()
            .filter(|m| m.score > 0.0)
            .map(|m| (m.id, m.score))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal).then(a.0.cmp(&b.0)));
        ranked.truncate(k);
        ranked
    }
}
