//! Domain types used by the lexical, vector and hybrid layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub type ChunkId = String;

/// Score given to an external record when it joins the local results.
pub const EXTERNAL_HIT_SCORE: f32 = 0.95;

/// A passage of an indexed document.
///
/// - `id`: primary identity; optional for legacy metadata rows
/// - `source`: file name or external source label
/// - `page`/`chunk_index`: position inside the source document
/// - `text`: the passage itself
///
/// Chunks are owned by the index snapshot and shared through `Arc`; retrieval
/// never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ChunkId>,
    pub source: String,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub chunk_index: u32,
    pub text: String,
}

impl Chunk {
    /// De-duplication key: `id` when present, otherwise
    /// `source_page_chunkindex`.
    pub fn identity(&self) -> String {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => format!("{}_{}_{}", self.source, self.page, self.chunk_index),
        }
    }
}

/// Indicates which stage produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Vector,
    Lexical,
    Fused,
    External,
}

/// One scored chunk from a single search call. Higher is better; the scale
/// depends on `source`.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalHit {
    pub score: f32,
    pub chunk: Arc<Chunk>,
    pub source: SourceKind,
}

impl RetrievalHit {
    pub fn new(score: f32, chunk: Arc<Chunk>, source: SourceKind) -> Self {
        Self { score, chunk, source }
    }
}

/// Output of fusion/de-duplication. Only the order is a contract: descending
/// by `score`, ties in first-seen order.
#[derive(Debug, Clone, Serialize)]
pub struct FusedResult {
    pub score: f32,
    pub chunk: Arc<Chunk>,
    pub source: SourceKind,
    /// How many hit lists surfaced this chunk.
    pub occurrences: usize,
}

/// Normalized record fetched from the external knowledge API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRecord {
    pub title: String,
    pub extract: String,
    pub url: String,
    pub page_id: Option<u64>,
    pub rev_id: Option<u64>,
    pub retrieved_at: DateTime<Utc>,
    pub license: String,
    pub license_url: String,
}

impl ExternalRecord {
    pub fn attribution(&self) -> String {
        format!(
            "{}. Retrieved from {}. Licensed under {}.",
            self.title, self.url, self.license
        )
    }

    /// Synthetic high-confidence hit carrying the extract.
    pub fn to_fused_result(&self) -> FusedResult {
        let id = match self.page_id {
            Some(page_id) => format!("wikipedia:{page_id}"),
            None => format!("wikipedia:{}", self.title),
        };
        let chunk = Chunk {
            id: Some(id),
            source: format!("Wikipedia: {}", self.title),
            page: 0,
            chunk_index: 0,
            text: self.extract.clone(),
        };
        FusedResult {
            score: EXTERNAL_HIT_SCORE,
            chunk: Arc::new(chunk),
            source: SourceKind::External,
            occurrences: 1,
        }
    }
}
