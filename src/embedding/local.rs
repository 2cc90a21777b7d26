//! Local ONNX Runtime embedding provider.
//!
//! Runs a sentence-transformer model on CPU via `ort`: tokenization, mean
//! pooling over the attention mask, then L2 normalization. The pipeline loads
//! lazily on first use and is shared read-only afterwards. One vector serves
//! both the small and large spaces; inference is free, so cost stays zero.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::Tokenizer;
use tokio::sync::OnceCell;

use super::{EmbedOutput, EmbeddingProvider, VectorSpace};
use crate::config::EmbeddingConfig;

/// Maximum sequence length (sentence-transformer models train at 256).
const MAX_SEQ_LEN: usize = 256;

/// Loaded model + tokenizer. Created once, then shared.
struct LocalPipeline {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dims: usize,
}

// Safety: Tokenizer is Send+Sync. Session is behind a Mutex.
// The Mutex guarantees exclusive access during run().
unsafe impl Send for LocalPipeline {}
unsafe impl Sync for LocalPipeline {}

pub struct LocalProvider {
    model: String,
    dims: usize,
    cache_dir: PathBuf,
    pipeline: OnceCell<Arc<LocalPipeline>>,
}

impl LocalProvider {
    pub fn new(config: &EmbeddingConfig, cache_dir: PathBuf) -> Self {
        Self {
            model: config.local_model.clone(),
            dims: config.local_dims,
            cache_dir,
            pipeline: OnceCell::new(),
        }
    }

    /// Load the pipeline on first call; later callers share the loaded slot.
    async fn pipeline(&self) -> Result<Arc<LocalPipeline>> {
        self.pipeline
            .get_or_try_init(|| async {
                let cache_dir = self.cache_dir.clone();
                let model = self.model.clone();
                let dims = self.dims;
                let pipeline = tokio::task::spawn_blocking(move || {
                    LocalPipeline::load(&cache_dir, &model, dims)
                })
                .await
                .context("model load task failed")??;
                Ok(Arc::new(pipeline))
            })
            .await
            .cloned()
    }
}

impl LocalPipeline {
    fn load(cache_dir: &PathBuf, model: &str, dims: usize) -> Result<Self> {
        let model_path = cache_dir.join("model.onnx");
        let tokenizer_path = cache_dir.join("tokenizer.json");

        anyhow::ensure!(
            model_path.exists(),
            "ONNX model not found at {}. Run `mnemo model download` first.",
            model_path.display()
        );
        anyhow::ensure!(
            tokenizer_path.exists(),
            "Tokenizer not found at {}. Run `mnemo model download` first.",
            tokenizer_path.display()
        );

        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?
            .commit_from_file(&model_path)
            .context("failed to load ONNX model")?;

        tracing::info!(model = %model, path = %model_path.display(), "ONNX model loaded");

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow::anyhow!("failed to load tokenizer: {e}"))?;

        tokenizer
            .with_truncation(Some(tokenizers::TruncationParams {
                max_length: MAX_SEQ_LEN,
                ..Default::default()
            }))
            .map_err(|e| anyhow::anyhow!("failed to set truncation: {e}"))?;

        tokenizer.with_padding(Some(tokenizers::PaddingParams {
            strategy: tokenizers::PaddingStrategy::BatchLongest,
            ..Default::default()
        }));

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dims,
        })
    }

    /// Tokenize, run the model, mean-pool, and L2-normalize a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("tokenization failed: {e}"))?;

        let seq_len = encoding.get_ids().len();
        let input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&m| m as i64)
            .collect();
        let token_type_ids = vec![0i64; seq_len];

        let shape = vec![1i64, seq_len as i64];
        let input_ids_tensor = Tensor::from_array((shape.clone(), input_ids.into_boxed_slice()))?;
        let attention_mask_tensor = Tensor::from_array((
            shape.clone(),
            attention_mask.clone().into_boxed_slice(),
        ))?;
        let token_type_ids_tensor =
            Tensor::from_array((shape, token_type_ids.into_boxed_slice()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("session lock poisoned: {e}"))?;

        let outputs = session.run(ort::inputs! {
            "input_ids" => input_ids_tensor,
            "attention_mask" => attention_mask_tensor,
            "token_type_ids" => token_type_ids_tensor,
        })?;

        // Output name varies by ONNX export; try the common ones.
        let token_emb_value = outputs
            .get("token_embeddings")
            .or_else(|| outputs.get("last_hidden_state"))
            .unwrap_or_else(|| &outputs[0]);

        let (out_shape, data) = token_emb_value
            .try_extract_tensor::<f32>()
            .context("failed to extract token embeddings tensor")?;

        let out_dims: &[i64] = &out_shape;
        anyhow::ensure!(
            out_dims.len() == 3 && out_dims[2] == self.dims as i64,
            "unexpected token embeddings shape: {out_dims:?}, expected [1, seq, {}]",
            self.dims
        );
        let hidden_dim = out_dims[2] as usize;
        let actual_seq_len = out_dims[1] as usize;

        // Mean pooling over unmasked positions
        let mut sum = vec![0.0f32; hidden_dim];
        let mut count = 0.0f32;
        for s in 0..actual_seq_len {
            let mask = attention_mask[s] as f32;
            if mask > 0.0 {
                let offset = s * hidden_dim;
                for d in 0..hidden_dim {
                    sum[d] += data[offset + d] * mask;
                }
                count += mask;
            }
        }
        if count > 0.0 {
            for value in &mut sum {
                *value /= count;
            }
        }

        Ok(l2_normalize(&sum))
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    fn model_id(&self, _space: VectorSpace) -> &str {
        &self.model
    }

    fn dims(&self, _space: VectorSpace) -> usize {
        self.dims
    }

    fn dual_native(&self) -> bool {
        false
    }

    async fn embed(&self, text: &str, _space: VectorSpace) -> Result<EmbedOutput> {
        let pipeline = self.pipeline().await?;
        let text = text.to_string();
        let vector = tokio::task::spawn_blocking(move || pipeline.embed(&text))
            .await
            .context("embedding task failed")??;

        Ok(EmbedOutput {
            vector,
            tokens: 0,
            cost_usd: 0.0,
        })
    }
}

/// L2-normalize a vector. Returns a zero vector if the input norm is zero.
fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_l2_normalize() {
        let v = vec![3.0, 4.0];
        let normalized = l2_normalize(&v);
        assert!((normalized[0] - 0.6).abs() < 1e-6);
        assert!((normalized[1] - 0.8).abs() < 1e-6);
        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero_vector() {
        let v = vec![0.0, 0.0, 0.0];
        let normalized = l2_normalize(&v);
        assert_eq!(normalized, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn provider_reports_single_space() {
        let config = EmbeddingConfig::default();
        let provider = LocalProvider::new(&config, PathBuf::from("/tmp/models"));
        assert_eq!(provider.model_id(VectorSpace::Small), "Xenova/all-MiniLM-L6-v2");
        assert_eq!(provider.model_id(VectorSpace::Large), "Xenova/all-MiniLM-L6-v2");
        assert_eq!(provider.dims(VectorSpace::Small), 384);
        assert_eq!(provider.dims(VectorSpace::Large), 384);
        assert!(!provider.dual_native());
    }

    #[tokio::test]
    async fn missing_model_files_error_mentions_download() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmbeddingConfig::default();
        let provider = LocalProvider::new(&config, dir.path().to_path_buf());
        let err = provider
            .embed("hello", VectorSpace::Small)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("mnemo model download"));
    }
}
