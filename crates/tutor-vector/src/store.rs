//! On-disk index snapshot.
//!
//! A snapshot directory holds three files written by the ingestion pipeline:
//! - `index.json`: which embedding backend/model built the vectors and their width
//! - `metadata.jsonl`: one `Chunk` per line
//! - `vectors.jsonl`: one JSON array of floats per line, aligned with metadata

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use tutor_core::error::{Error, Result};
use tutor_core::types::Chunk;

use crate::index::FlatIpIndex;
use crate::search::VectorSnapshot;

pub const MANIFEST_FILE: &str = "index.json";
pub const METADATA_FILE: &str = "metadata.jsonl";
pub const VECTORS_FILE: &str = "vectors.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub embed_backend: String,
    pub embed_model: String,
    pub dim: usize,
}

pub struct StoredIndex {
    pub manifest: IndexManifest,
    pub chunks: Vec<Arc<Chunk>>,
    pub vectors: Vec<Vec<f32>>,
}

impl StoredIndex {
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(Error::NotFound(manifest_path.display().to_string()));
        }
        let manifest: IndexManifest = serde_json::from_reader(BufReader::new(File::open(&manifest_path)?))?;

        let chunks: Vec<Arc<Chunk>> = read_jsonl::<Chunk>(&dir.join(METADATA_FILE))?
            .into_iter()
            .map(Arc::new)
            .collect();
        let vectors: Vec<Vec<f32>> = read_jsonl(&dir.join(VECTORS_FILE))?;

        if chunks.len() != vectors.len() {
            return Err(Error::Operation(format!(
                "{} has {} rows but {} has {}",
                METADATA_FILE,
                chunks.len(),
                VECTORS_FILE,
                vectors.len()
            )));
        }
        if let Some((row, v)) = vectors.iter().enumerate().find(|(_, v)| v.len() != manifest.dim) {
            return Err(Error::Operation(format!(
                "vector row {} has dimension {}, manifest says {}",
                row,
                v.len(),
                manifest.dim
            )));
        }
        info!(dir = %dir.display(), chunks = chunks.len(), dim = manifest.dim, "index snapshot loaded");
        Ok(Self { manifest, chunks, vectors })
    }

    /// Compares the stored build settings with the runtime backend. A width
    /// difference is fatal; backend/model differences are returned (and
    /// logged) so the caller can suggest re-ingesting.
    pub fn check_drift(&self, backend: &str, model: &str, dim: usize) -> Result<Vec<String>> {
        if self.manifest.dim != dim {
            return Err(Error::DimensionMismatch { stored: self.manifest.dim, runtime: dim });
        }
        let mut mismatches = Vec::new();
        if self.manifest.embed_backend != backend {
            mismatches.push(format!("backend: stored={} current={}", self.manifest.embed_backend, backend));
        }
        if self.manifest.embed_model != model {
            mismatches.push(format!("model: stored={} current={}", self.manifest.embed_model, model));
        }
        if !mismatches.is_empty() {
            let drift = Error::IndexDrift(mismatches.clone());
            warn!("{drift}. Consider re-ingesting.");
        }
        Ok(mismatches)
    }

    pub fn vector_snapshot(&self) -> Result<VectorSnapshot> {
        let index = FlatIpIndex::from_rows(self.manifest.dim, &self.vectors)
            .map_err(|e| Error::Operation(e.to_string()))?;
        Ok(VectorSnapshot::new(Arc::new(index), self.chunks.clone()))
    }

    /// Writes a snapshot directory in the layout `load` reads.
    pub fn write(dir: &Path, manifest: &IndexManifest, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let mut out = BufWriter::new(File::create(dir.join(MANIFEST_FILE))?);
        serde_json::to_writer_pretty(&mut out, manifest)?;
        out.flush()?;
        write_jsonl(&dir.join(METADATA_FILE), chunks)?;
        write_jsonl(&dir.join(VECTORS_FILE), vectors)?;
        Ok(())
    }
}

fn read_jsonl<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Err(Error::NotFound(path.display().to_string()));
    }
    let mut rows = Vec::new();
    for (n, line) in BufReader::new(File::open(path)?).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row = serde_json::from_str(&line)
            .map_err(|e| Error::Operation(format!("{}:{}: {}", path.display(), n + 1, e)))?;
        rows.push(row);
    }
    Ok(rows)
}

fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for row in rows {
        serde_json::to_writer(&mut out, row)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}
