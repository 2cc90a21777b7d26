//! Remote embedding provider — OpenAI embeddings API.
//!
//! Issues one API call per vector space with the configured model and target
//! dimension, wrapped in the shared retry policy. Token usage and estimated
//! cost are reported per call and accumulated by the engine.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::{EmbedOutput, EmbeddingProvider, VectorSpace};
use crate::config::EmbeddingConfig;
use crate::retry::{with_retry, RetryPolicy, RetryableStatus};

const EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";

/// USD per million tokens.
const SMALL_PRICE_PER_MTOK: f64 = 0.02;
const LARGE_PRICE_PER_MTOK: f64 = 0.13;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct RemoteProvider {
    http: reqwest::Client,
    api_key: String,
    small_model: String,
    large_model: String,
    small_dims: usize,
    large_dims: usize,
    retry: RetryPolicy,
}

impl RemoteProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .clone()
            .context("remote embedding provider requires an OpenAI API key")?;

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            api_key,
            small_model: config.small_model.clone(),
            large_model: config.large_model.clone(),
            small_dims: config.remote_small_dims,
            large_dims: config.large_dims,
            retry: RetryPolicy::default(),
        })
    }

    async fn call_api(&self, model: &str, dims: usize, text: &str) -> Result<EmbeddingsResponse> {
        let body = serde_json::json!({
            "model": model,
            "input": [text],
            "dimensions": dims,
        });

        let response = self
            .http
            .post(EMBEDDINGS_URL)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("embedding request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow::Error::new(RetryableStatus(status.as_u16()))
                .context(format!("embedding API returned {status}: {detail}")));
        }

        response
            .json::<EmbeddingsResponse>()
            .await
            .context("failed to decode embedding response")
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    fn model_id(&self, space: VectorSpace) -> &str {
        match space {
            VectorSpace::Small => &self.small_model,
            VectorSpace::Large => &self.large_model,
        }
    }

    fn dims(&self, space: VectorSpace) -> usize {
        match space {
            VectorSpace::Small => self.small_dims,
            VectorSpace::Large => self.large_dims,
        }
    }

    fn dual_native(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str, space: VectorSpace) -> Result<EmbedOutput> {
        let model = self.model_id(space).to_string();
        let dims = self.dims(space);

        let response = with_retry(&self.retry, "openai_embeddings", || {
            self.call_api(&model, dims, text)
        })
        .await?;

        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("embedding response contained no vectors")?;

        anyhow::ensure!(
            vector.len() == dims,
            "embedding API returned {} dimensions, expected {dims}",
            vector.len()
        );

        let tokens = response.usage.total_tokens;
        let price = match space {
            VectorSpace::Small => SMALL_PRICE_PER_MTOK,
            VectorSpace::Large => LARGE_PRICE_PER_MTOK,
        };
        let cost_usd = tokens as f64 / 1_000_000.0 * price;

        Ok(EmbedOutput {
            vector,
            tokens,
            cost_usd,
        })
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
    usage: ApiUsage,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    total_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> RemoteProvider {
        let config = EmbeddingConfig {
            openai_api_key: Some("sk-test-key".into()),
            ..Default::default()
        };
        RemoteProvider::new(&config).unwrap()
    }

    #[test]
    fn models_and_dims_per_space() {
        let provider = provider();
        assert_eq!(provider.model_id(VectorSpace::Small), "text-embedding-3-small");
        assert_eq!(provider.model_id(VectorSpace::Large), "text-embedding-3-large");
        assert_eq!(provider.dims(VectorSpace::Small), 1536);
        assert_eq!(provider.dims(VectorSpace::Large), 3072);
        assert!(provider.dual_native());
    }

    #[test]
    fn missing_key_is_an_error() {
        let config = EmbeddingConfig::default();
        assert!(RemoteProvider::new(&config).is_err());
    }

    #[test]
    fn response_decodes() {
        let json = r#"{
            "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0, "object": "embedding"}],
            "usage": {"prompt_tokens": 5, "total_tokens": 5},
            "model": "text-embedding-3-small",
            "object": "list"
        }"#;
        let decoded: EmbeddingsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(decoded.data[0].embedding, vec![0.1, 0.2, 0.3]);
        assert_eq!(decoded.usage.total_tokens, 5);
    }
}
