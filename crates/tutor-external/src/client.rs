use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use tutor_core::settings::{ExternalSettings, Settings};
use tutor_core::traits::KnowledgeSource;
use tutor_core::types::ExternalRecord;

use crate::breaker::CircuitBreaker;
use crate::cache::{cache_key, TtlCache};
use crate::error::{BreakerError, ExternalError};
use crate::rate_limit::RateLimiter;
use crate::sanitize::sanitize_query;
use crate::wikimedia::WikimediaTransport;

/// Long-lived state for one external dependency. Build it once at process
/// start and clone the handles into every client that talks to the same API.
#[derive(Debug, Clone)]
pub struct ExternalServices {
    pub limiter: Arc<RateLimiter>,
    pub breaker: Arc<CircuitBreaker>,
    pub cache: Arc<TtlCache<ExternalRecord>>,
}

impl ExternalServices {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(settings.external.rate_limit_per_sec)),
            breaker: Arc::new(CircuitBreaker::from_settings("wikimedia", &settings.breaker)),
            cache: Arc::new(TtlCache::from_settings(&settings.cache)),
        }
    }
}

/// Sanitize, check the cache, then rate-limit and fetch through the circuit
/// breaker under one request timeout.
pub struct ExternalKnowledgeClient {
    transport: WikimediaTransport,
    services: ExternalServices,
    language: String,
    max_query_length: usize,
    request_timeout: Duration,
}

impl ExternalKnowledgeClient {
    pub fn new(settings: &ExternalSettings, services: ExternalServices) -> Result<Self, ExternalError> {
        Ok(Self {
            transport: WikimediaTransport::new(settings)?,
            services,
            language: settings.language.clone(),
            max_query_length: settings.max_query_length,
            request_timeout: settings.request_timeout(),
        })
    }

    pub fn services(&self) -> &ExternalServices { &self.services }

    /// `Ok(None)` when the API has nothing usable for the query; `Err` for
    /// transport failures and an open circuit.
    #[instrument(skip(self))]
    pub async fn fetch(&self, query: &str) -> Result<Option<ExternalRecord>, BreakerError<ExternalError>> {
        let clean = sanitize_query(query, self.max_query_length);
        if clean.is_empty() {
            warn!("empty query after sanitization");
            return Ok(None);
        }

        // Keyed on the raw query, not the sanitized one.
        let key = cache_key(query, "query", &self.language);
        if let Some(record) = self.services.cache.get(&key) {
            debug!(title = %record.title, "Wikipedia cache hit");
            return Ok(Some(record));
        }
        debug!("Wikipedia cache miss");

        let url = self.transport.extract_url(&clean).map_err(BreakerError::Inner)?;

        // The request timeout covers the limiter wait. An expiry anywhere
        // inside the breaker call counts as one failure.
        let transport = &self.transport;
        let limiter = &self.services.limiter;
        let call = self.services.breaker.call(|| async move {
            limiter.acquire().await;
            transport.fetch(&url).await
        });
        let timeout = self.request_timeout;
        let body = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(?timeout, "Wikimedia lookup exceeded the request timeout");
                return Err(BreakerError::Inner(ExternalError::Timeout(timeout)));
            }
        };

        let record = self.transport.parse_response(&body);
        if let Some(record) = &record {
            info!(title = %record.title, "Wikipedia fetch successful");
            self.services.cache.set(key, record.clone());
        }
        Ok(record)
    }
}

#[async_trait]
impl KnowledgeSource for ExternalKnowledgeClient {
    async fn lookup(&self, query: &str) -> Option<ExternalRecord> {
        match self.fetch(query).await {
            Ok(record) => record,
            Err(BreakerError::Open) => {
                warn!("circuit breaker open, skipping Wikimedia request");
                None
            }
            Err(BreakerError::Inner(e)) => {
                error!(error = %e, "Wikimedia search failed");
                None
            }
        }
    }
}
