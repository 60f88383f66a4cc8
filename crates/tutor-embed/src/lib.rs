//! Model backends behind the core `Embedder` / `TextGenerator` traits.
//!
//! The backend is chosen once from configuration (`EmbedBackend`), never
//! re-dispatched per call. `APP_USE_FAKE_EMBEDDINGS=1` forces the
//! deterministic hash backend for fast tests and development.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::info;

use tutor_core::settings::IndexSettings;
use tutor_core::traits::Embedder;

pub mod generate;
pub mod hash;
pub mod http;

pub use generate::OllamaGenerator;
pub use hash::HashEmbedder;
pub use http::{OllamaEmbedder, OpenAiEmbedder};

#[derive(Debug, Clone, PartialEq)]
pub enum EmbedBackend {
    Hash { dim: usize },
    Ollama { url: String, model: String, dim: usize },
    OpenAi { base_url: String, api_key: String, model: String, dim: usize },
}

impl EmbedBackend {
    /// Honors `APP_USE_FAKE_EMBEDDINGS`.
    pub fn from_settings(settings: &IndexSettings) -> Result<Self> {
        Self::select(settings, use_fake_embeddings())
    }

    /// `force_hash` replaces whatever backend is configured with the hash
    /// backend of the same width.
    pub fn select(settings: &IndexSettings, force_hash: bool) -> Result<Self> {
        if force_hash {
            return Ok(Self::Hash { dim: settings.embed_dim });
        }
        let dim = settings.embed_dim;
        match settings.embed_backend.to_ascii_lowercase().as_str() {
            "hash" => Ok(Self::Hash { dim }),
            "ollama" => Ok(Self::Ollama { url: settings.ollama_url.clone(), model: settings.embed_model.clone(), dim }),
            "openai" | "openrouter" => match settings.openai_api_key.as_deref() {
                Some(key) if !key.is_empty() => Ok(Self::OpenAi {
                    base_url: settings.openai_base_url.clone(),
                    api_key: key.to_string(),
                    model: settings.embed_model.clone(),
                    dim,
                }),
                _ => bail!("embedding backend '{}' requires index.openai_api_key", settings.embed_backend),
            },
            other => bail!("unknown embedding backend: {other}"),
        }
    }

    /// Backend name as recorded in an index manifest.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hash { .. } => "hash",
            Self::Ollama { .. } => "ollama",
            Self::OpenAi { .. } => "openai",
        }
    }

    pub fn build(self) -> Arc<dyn Embedder> {
        let embedder: Arc<dyn Embedder> = match self {
            Self::Hash { dim } => Arc::new(HashEmbedder::new(dim)),
            Self::Ollama { url, model, dim } => Arc::new(OllamaEmbedder::new(url, model, dim)),
            Self::OpenAi { base_url, api_key, model, dim } => Arc::new(OpenAiEmbedder::new(base_url, api_key, model, dim)),
        };
        info!(embedder = embedder.id(), dim = embedder.dim(), "embedding backend selected");
        embedder
    }
}

fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Scales `v` to unit L2 norm in place.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-12);
    for x in v { *x /= norm; }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_backend_requires_key() {
        let settings = IndexSettings { embed_backend: "openai".into(), openai_api_key: None, ..IndexSettings::default() };
        assert!(EmbedBackend::select(&settings, false).is_err());

        let settings = IndexSettings { openai_api_key: Some("k".into()), ..settings };
        let backend = EmbedBackend::select(&settings, false).unwrap();
        assert!(matches!(backend, EmbedBackend::OpenAi { .. }));
        assert_eq!(backend.name(), "openai");
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let settings = IndexSettings { embed_backend: "word2vec".into(), ..IndexSettings::default() };
        assert!(EmbedBackend::select(&settings, false).is_err());
    }

    #[test]
    fn forced_hash_overrides_configured_backend() {
        let settings = IndexSettings { embed_backend: "word2vec".into(), embed_dim: 48, ..IndexSettings::default() };
        assert_eq!(EmbedBackend::select(&settings, true).unwrap(), EmbedBackend::Hash { dim: 48 });
    }

    #[test]
    fn normalize_handles_zero_vector() {
        let mut v = vec![0.0f32; 4];
        l2_normalize(&mut v);
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
