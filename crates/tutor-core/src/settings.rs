//! Typed configuration tree. Every field has a default so a missing
//! `config.toml` still yields a usable setup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub retrieval: RetrievalSettings,
    pub external: ExternalSettings,
    pub breaker: BreakerSettings,
    pub cache: CacheSettings,
    pub index: IndexSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub multi_query: MultiQuerySettings,
    pub hybrid: HybridSettings,
    pub dedup: DedupSettings,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 5,
            multi_query: MultiQuerySettings::default(),
            hybrid: HybridSettings::default(),
            dedup: DedupSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiQuerySettings {
    pub enabled: bool,
    pub variants: usize,
}

impl Default for MultiQuerySettings {
    fn default() -> Self { Self { enabled: true, variants: 3 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSettings {
    pub enabled: bool,
    pub rrf_k: f32,
}

impl Default for HybridSettings {
    fn default() -> Self { Self { enabled: true, rrf_k: 60.0 } }
}

/// Occurrence bonus: `min(max_bonus, occurrence_bonus * count)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupSettings {
    pub occurrence_bonus: f32,
    pub max_bonus: f32,
}

impl Default for DedupSettings {
    fn default() -> Self { Self { occurrence_bonus: 0.02, max_bonus: 0.1 } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalSettings {
    pub enabled: bool,
    pub api_endpoint: String,
    pub user_agent: String,
    pub language: String,
    pub http_timeout_secs: f64,
    pub connect_timeout_secs: f64,
    /// Whole-lookup budget, retries and backoff included.
    pub request_timeout_secs: f64,
    pub max_extract_length: usize,
    pub min_extract_length: usize,
    pub max_query_length: usize,
    pub rate_limit_per_sec: f64,
    pub max_retries: u32,
    pub max_backoff_secs: f64,
}

impl Default for ExternalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_endpoint: "https://en.wikipedia.org/w/api.php".to_string(),
            user_agent: String::new(),
            language: "en".to_string(),
            http_timeout_secs: 10.0,
            connect_timeout_secs: 5.0,
            request_timeout_secs: 15.0,
            max_extract_length: 500,
            min_extract_length: 50,
            max_query_length: 300,
            rate_limit_per_sec: 1.0,
            max_retries: 3,
            max_backoff_secs: 10.0,
        }
    }
}

impl ExternalSettings {
    pub fn http_timeout(&self) -> Duration { Duration::from_secs_f64(self.http_timeout_secs) }
    pub fn connect_timeout(&self) -> Duration { Duration::from_secs_f64(self.connect_timeout_secs) }
    pub fn request_timeout(&self) -> Duration { Duration::from_secs_f64(self.request_timeout_secs) }
    pub fn max_backoff(&self) -> Duration { Duration::from_secs_f64(self.max_backoff_secs) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub open_timeout_secs: f64,
    pub success_threshold: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self { Self { failure_threshold: 5, open_timeout_secs: 60.0, success_threshold: 2 } }
}

impl BreakerSettings {
    pub fn open_timeout(&self) -> Duration { Duration::from_secs_f64(self.open_timeout_secs) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub max_size: usize,
    pub ttl_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self { Self { max_size: 500, ttl_secs: 86_400 } }
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration { Duration::from_secs(self.ttl_secs) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub dir: String,
    /// One of `hash`, `ollama`, `openai`.
    pub embed_backend: String,
    pub embed_model: String,
    pub embed_dim: usize,
    pub ollama_url: String,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            dir: "storage".to_string(),
            embed_backend: "hash".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            embed_dim: 384,
            ollama_url: "http://localhost:11434".to_string(),
            openai_base_url: "https://openrouter.ai/api/v1".to_string(),
            openai_api_key: None,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        let r = &self.retrieval;
        if r.top_k == 0 { return Err(invalid("retrieval.top_k must be > 0")); }
        if r.multi_query.variants == 0 { return Err(invalid("retrieval.multi_query.variants must be > 0")); }
        if r.hybrid.rrf_k.is_nan() || r.hybrid.rrf_k < 0.0 { return Err(invalid("retrieval.hybrid.rrf_k must be >= 0")); }
        if r.dedup.occurrence_bonus < 0.0 || r.dedup.max_bonus < 0.0 {
            return Err(invalid("retrieval.dedup bonuses must be >= 0"));
        }

        let e = &self.external;
        if e.rate_limit_per_sec.is_nan() || e.rate_limit_per_sec <= 0.0 { return Err(invalid("external.rate_limit_per_sec must be > 0")); }
        if e.max_retries == 0 { return Err(invalid("external.max_retries must be > 0")); }
        if e.min_extract_length > e.max_extract_length {
            return Err(invalid("external.min_extract_length exceeds max_extract_length"));
        }
        if e.max_query_length == 0 { return Err(invalid("external.max_query_length must be > 0")); }
        for (name, secs) in [
            ("external.http_timeout_secs", e.http_timeout_secs),
            ("external.connect_timeout_secs", e.connect_timeout_secs),
            ("external.request_timeout_secs", e.request_timeout_secs),
            ("external.max_backoff_secs", e.max_backoff_secs),
            ("breaker.open_timeout_secs", self.breaker.open_timeout_secs),
        ] {
            if !secs.is_finite() || secs < 0.0 {
                return Err(Error::InvalidConfig(format!("{name} must be a finite, non-negative number")));
            }
        }

        let b = &self.breaker;
        if b.failure_threshold == 0 || b.success_threshold == 0 {
            return Err(invalid("breaker thresholds must be > 0"));
        }

        if self.cache.max_size == 0 { return Err(invalid("cache.max_size must be > 0")); }
        Ok(())
    }
}

fn invalid(msg: &str) -> Error { Error::InvalidConfig(msg.to_string()) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        s.validate().unwrap();
        assert_eq!(s.retrieval.hybrid.rrf_k, 60.0);
        assert_eq!(s.breaker.failure_threshold, 5);
        assert_eq!(s.cache.ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn rejects_inverted_extract_bounds() {
        let mut s = Settings::default();
        s.external.min_extract_length = 600;
        let err = s.validate().unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("min_extract_length"));
    }

    #[test]
    fn rejects_zero_rate() {
        let mut s = Settings::default();
        s.external.rate_limit_per_sec = 0.0;
        assert!(s.validate().is_err());
    }
}
