//! tutor-external
//!
//! Resilient access to the Wikimedia API: a token-bucket `RateLimiter`, a
//! `CircuitBreaker`, a TTL cache and the HTTP transport, composed by
//! `ExternalKnowledgeClient`. The shared pieces are constructed once per
//! process (`ExternalServices`) and handed to every client by `Arc`.

pub mod breaker;
pub mod cache;
pub mod client;
pub mod error;
pub mod rate_limit;
pub mod sanitize;
pub mod wikimedia;

pub use breaker::{BreakerState, BreakerStatus, CircuitBreaker};
pub use cache::{cache_key, CacheStats, TtlCache};
pub use client::{ExternalKnowledgeClient, ExternalServices};
pub use error::{BreakerError, ExternalError};
pub use rate_limit::RateLimiter;
pub use sanitize::{clean_wikitext, sanitize_query, truncate_extract, validate_user_agent};
pub use wikimedia::WikimediaTransport;
