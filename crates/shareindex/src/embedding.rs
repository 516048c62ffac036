//! HTTP embedding provider against an OpenAI-compatible endpoint.
//!
//! Calls `POST {base_url}/v1/embeddings` with the whole batch and returns
//! vectors in input order.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) retry
//! - HTTP 4xx (client error, not 429) fails immediately
//! - Network errors retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use shareindex_core::embedding::EmbeddingProvider;
use shareindex_core::error::{Error, Result};

use crate::config::EmbeddingConfig;

pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: usize,
    max_retries: u32,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("embedding http client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
            api_key: config.api_key.clone(),
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                warn!(attempt, delay_secs = delay.as_secs(), "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let mut req = self.client.post(&url).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }

            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let parsed: EmbeddingsResponse = response.json().await.map_err(|e| {
                            Error::EmbeddingProvider(format!("invalid response body: {e}"))
                        })?;
                        return self.collect_vectors(parsed, texts.len());
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::EmbeddingProvider(format!(
                            "endpoint error {status}: {body_text}"
                        )));
                        continue;
                    }

                    // Non-retryable client error.
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::EmbeddingProvider(format!(
                        "endpoint error {status}: {body_text}"
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::EmbeddingProvider(format!("request failed: {e}")));
                    continue;
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| Error::EmbeddingProvider("embedding failed after retries".into())))
    }

    fn collect_vectors(
        &self,
        response: EmbeddingsResponse,
        expected: usize,
    ) -> Result<Vec<Vec<f32>>> {
        if response.data.len() != expected {
            return Err(Error::EmbeddingProvider(format!(
                "expected {expected} vectors, got {}",
                response.data.len()
            )));
        }

        // The endpoint may return items out of order; indexes restore it.
        let mut items = response.data;
        items.sort_by_key(|item| item.index);

        for item in &items {
            if item.embedding.len() != self.dims {
                return Err(Error::EmbeddingProvider(format!(
                    "expected {} dims, got {}",
                    self.dims,
                    item.embedding.len()
                )));
            }
        }

        Ok(items.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dims(&self) -> usize {
        self.dims
    }
}
