//! HTTP embedding backends. Both re-normalize returned rows and reject
//! responses whose shape does not match the configured dimension.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tutor_core::traits::Embedder;

use crate::l2_normalize;

#[derive(Debug, Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

/// Ollama `/api/embeddings`, one request per text.
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dim: usize,
    id: String,
}

impl OllamaEmbedder {
    pub fn new(url: String, model: String, dim: usize) -> Self {
        let id = format!("ollama:{model}");
        Self { client: reqwest::Client::new(), url: url.trim_end_matches('/').to_string(), model, dim, id }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let endpoint = format!("{}/api/embeddings", self.url);
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let response = self
                .client
                .post(&endpoint)
                .json(&OllamaEmbeddingRequest { model: &self.model, prompt: text })
                .send()
                .await
                .context("Ollama embedding request failed")?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                bail!("Ollama API error {status}: {body}");
            }
            let parsed: OllamaEmbeddingResponse = response.json().await.context("malformed Ollama response")?;
            out.push(checked_row(parsed.embedding, self.dim)?);
        }
        Ok(out)
    }
}

#[derive(Debug, Serialize)]
struct OpenAiEmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbeddingData {
    embedding: Vec<f32>,
}

/// Any OpenAI-compatible `/embeddings` endpoint (OpenAI, OpenRouter, ...).
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dim: usize,
    id: String,
}

impl OpenAiEmbedder {
    pub fn new(base_url: String, api_key: String, model: String, dim: usize) -> Self {
        let id = format!("openai:{model}");
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            dim,
            id,
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&OpenAiEmbeddingRequest { model: &self.model, input: texts })
            .send()
            .await
            .context("embedding request failed")?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("embedding API error {status}: {body}");
        }
        let parsed: OpenAiEmbeddingResponse = response.json().await.context("malformed embedding response")?;
        if parsed.data.len() != texts.len() {
            return Err(anyhow!("embedding API returned {} rows for {} inputs", parsed.data.len(), texts.len()));
        }
        parsed.data.into_iter().map(|d| checked_row(d.embedding, self.dim)).collect()
    }
}

fn checked_row(mut row: Vec<f32>, dim: usize) -> Result<Vec<f32>> {
    if row.len() != dim {
        bail!("backend returned dimension {}, expected {}", row.len(), dim);
    }
    l2_normalize(&mut row);
    Ok(row)
}
