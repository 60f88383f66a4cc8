//! HTTP transport for the MediaWiki action API.

use chrono::Utc;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{StatusCode, Url};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use tutor_core::settings::ExternalSettings;
use tutor_core::types::ExternalRecord;

use crate::error::ExternalError;
use crate::sanitize::{clean_wikitext, truncate_extract, validate_user_agent};

pub const LICENSE: &str = "CC BY-SA 3.0";
pub const LICENSE_URL: &str = "https://creativecommons.org/licenses/by-sa/3.0/";

const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

const QUERY_PARAMS: &[&str] = &["titles", "prop", "redirects", "exintro", "explaintext", "rvprop", "maxlag"];
const PARSE_PARAMS: &[&str] = &["page", "prop", "redirects", "maxlag"];
const OPENSEARCH_PARAMS: &[&str] = &["search", "limit", "namespace", "maxlag"];

/// Parameters forwarded per action. Anything else is dropped.
fn allowed_params(action: &str) -> Option<&'static [&'static str]> {
    match action {
        "query" => Some(QUERY_PARAMS),
        "parse" => Some(PARSE_PARAMS),
        "opensearch" => Some(OPENSEARCH_PARAMS),
        _ => None,
    }
}

pub fn article_url(language: &str, title: &str) -> String {
    format!("https://{}.wikipedia.org/wiki/{}", language, title.replace(' ', "_"))
}

pub struct WikimediaTransport {
    client: reqwest::Client,
    endpoint: Url,
    language: String,
    max_retries: u32,
    max_backoff: Duration,
    max_extract_length: usize,
    min_extract_length: usize,
}

impl WikimediaTransport {
    /// Rejects agents that do not satisfy the Wikimedia User-Agent policy.
    pub fn new(settings: &ExternalSettings) -> Result<Self, ExternalError> {
        validate_user_agent(&settings.user_agent)?;
        let endpoint = Url::parse(&settings.api_endpoint)
            .map_err(|e| ExternalError::InvalidEndpoint(format!("{}: {}", settings.api_endpoint, e)))?;
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.trim())
            .timeout(settings.http_timeout())
            .connect_timeout(settings.connect_timeout())
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint,
            language: settings.language.clone(),
            max_retries: settings.max_retries.max(1),
            max_backoff: settings.max_backoff(),
            max_extract_length: settings.max_extract_length,
            min_extract_length: settings.min_extract_length,
        })
    }

    /// Builds a request URL for a whitelisted action. Every request is
    /// JSON, format version 2.
    pub fn build_url(&self, action: &str, params: &[(&str, &str)]) -> Result<Url, ExternalError> {
        let allowed = allowed_params(action).ok_or_else(|| ExternalError::ActionNotAllowed(action.to_string()))?;
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("action", action).append_pair("format", "json").append_pair("formatversion", "2");
            for (key, value) in params {
                if !allowed.contains(key) {
                    warn!(param = *key, action, "ignoring unknown parameter");
                    continue;
                }
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Intro extract plus revision id of the page titled `title`.
    pub fn extract_url(&self, title: &str) -> Result<Url, ExternalError> {
        self.build_url(
            "query",
            &[
                ("titles", title),
                ("prop", "extracts|revisions"),
                ("rvprop", "ids"),
                ("exintro", "true"),
                ("explaintext", "true"),
                ("redirects", "true"),
                ("maxlag", "5"),
            ],
        )
    }

    /// GET with bounded retries. Lag signals (HTTP 503 or a `maxlag` error
    /// body) wait for the server's `Retry-After`; timeouts and other 5xx
    /// back off exponentially. Both waits are capped at `max_backoff`.
    #[instrument(skip_all, fields(attempts = self.max_retries))]
    pub async fn fetch(&self, url: &Url) -> Result<Value, ExternalError> {
        let attempts = self.max_retries;
        for attempt in 0..attempts {
            let last = attempt + 1 == attempts;
            let response = match self.client.get(url.clone()).send().await {
                Ok(response) => response,
                Err(e) if e.is_timeout() => {
                    warn!(attempt = attempt + 1, attempts, "Wikimedia request timed out");
                    if !last {
                        sleep(self.backoff(attempt)).await;
                    }
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            if status == StatusCode::SERVICE_UNAVAILABLE {
                let wait = self.retry_after(response.headers());
                warn!(attempt = attempt + 1, attempts, wait_secs = wait.as_secs_f64(), "maxlag triggered");
                if !last {
                    sleep(wait).await;
                }
                continue;
            }
            if status.is_server_error() {
                if last {
                    return Err(ExternalError::Status(status.as_u16()));
                }
                warn!(attempt = attempt + 1, attempts, status = status.as_u16(), "server error, retrying");
                sleep(self.backoff(attempt)).await;
                continue;
            }
            if !status.is_success() {
                return Err(ExternalError::Status(status.as_u16()));
            }

            let hint = self.retry_after(response.headers());
            let body: Value = response.json().await.map_err(|e| ExternalError::Malformed(e.to_string()))?;
            if body.pointer("/error/code").and_then(Value::as_str) == Some("maxlag") {
                warn!(attempt = attempt + 1, attempts, wait_secs = hint.as_secs_f64(), "maxlag error body");
                if !last {
                    sleep(hint).await;
                }
                continue;
            }
            return Ok(body);
        }
        Err(ExternalError::RetriesExhausted(attempts))
    }

    /// Normalizes a `query` response. `None` means the API answered but had
    /// nothing usable (no page, missing page, extract too short).
    pub fn parse_response(&self, body: &Value) -> Option<ExternalRecord> {
        let Some(pages) = body.pointer("/query/pages").and_then(Value::as_array) else {
            info!("empty response from Wikimedia API");
            return None;
        };
        let Some(page) = pages.first() else {
            info!("no pages in Wikimedia response");
            return None;
        };
        let title = page.get("title").and_then(Value::as_str).unwrap_or_default();
        if page.get("missing").is_some() || page.get("invalid").is_some() {
            info!(title, "page not found");
            return None;
        }

        let extract = clean_wikitext(page.get("extract").and_then(Value::as_str).unwrap_or_default());
        if extract.chars().count() < self.min_extract_length {
            warn!(title, len = extract.chars().count(), "Wikipedia extract too short, skipping");
            return None;
        }

        Some(ExternalRecord {
            title: title.to_string(),
            extract: truncate_extract(&extract, self.max_extract_length),
            url: article_url(&self.language, title),
            page_id: page.get("pageid").and_then(Value::as_u64),
            rev_id: page.pointer("/revisions/0/revid").and_then(Value::as_u64),
            retrieved_at: Utc::now(),
            license: LICENSE.to_string(),
            license_url: LICENSE_URL.to_string(),
        })
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let secs = 2u64.saturating_pow(attempt);
        Duration::from_secs(secs).min(self.max_backoff)
    }

    fn retry_after(&self, headers: &HeaderMap) -> Duration {
        let secs = headers
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
        Duration::from_secs(secs).min(self.max_backoff)
    }
}
