//! BERT sentence encoder run with candle.
//!
//! Loads a sentence-transformers checkpoint (config, `tokenizer.json`,
//! weights) from the Hugging Face hub cache and produces mean-pooled,
//! L2-normalized sentence vectors, which is what the `*-cos-v1` models are
//! trained to emit.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use hf_hub::api::sync::ApiBuilder;
use tokenizers::{PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tracing::{debug, info};

use super::Embedder;
use crate::error::EmbeddingError;
use crate::logging::RANKING;

/// Asymmetric query-vs-passage model (384 dimensions).
pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/multi-qa-MiniLM-L6-cos-v1";

/// Texts per forward pass inside one `embed_batch` call.
const FORWARD_BATCH: usize = 32;

pub struct BertEmbedder {
    model_id: String,
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    hidden_size: usize,
}

impl BertEmbedder {
    /// Downloads (or reuses the cached copy of) `model_id` and loads it.
    pub fn from_pretrained(model_id: &str, max_seq_len: usize) -> Result<Self, EmbeddingError> {
        let api = ApiBuilder::new()
            .with_progress(false)
            .build()
            .map_err(|e| EmbeddingError::ModelLoad(format!("hf-hub: {e}")))?;
        let repo = api.model(model_id.to_string());

        info!(target: RANKING, "Fetching embedding model files for {}", model_id);
        let config_path = repo
            .get("config.json")
            .map_err(|e| EmbeddingError::ModelLoad(format!("config.json: {e}")))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| EmbeddingError::ModelLoad(format!("tokenizer.json: {e}")))?;
        let weights_path = repo
            .get("model.safetensors")
            .or_else(|_| repo.get("pytorch_model.bin"))
            .map_err(|e| EmbeddingError::ModelLoad(format!("model weights: {e}")))?;

        Self::from_files(
            model_id,
            &config_path,
            &tokenizer_path,
            &weights_path,
            max_seq_len,
        )
    }

    /// Loads from local files. `weights_path` may be safetensors or a
    /// PyTorch pickle.
    pub fn from_files(
        model_id: &str,
        config_path: &Path,
        tokenizer_path: &Path,
        weights_path: &Path,
        max_seq_len: usize,
    ) -> Result<Self, EmbeddingError> {
        let device = Device::Cpu;

        let config_str = std::fs::read_to_string(config_path).map_err(|e| {
            EmbeddingError::ModelLoad(format!("reading {}: {e}", config_path.display()))
        })?;
        let config: BertConfig = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::ModelLoad(format!("parsing BERT config: {e}")))?;
        let hidden_size = serde_json::from_str::<serde_json::Value>(&config_str)
            .ok()
            .and_then(|v| v.get("hidden_size").and_then(|h| h.as_u64()))
            .ok_or_else(|| EmbeddingError::ModelLoad("config has no hidden_size".to_string()))?
            as usize;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| EmbeddingError::ModelLoad(format!("tokenizer: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: max_seq_len,
                ..Default::default()
            }))
            .map_err(|e| EmbeddingError::ModelLoad(format!("tokenizer truncation: {e}")))?;

        let vb = if weights_path.extension().is_some_and(|e| e == "safetensors") {
            // SAFETY: the file is a read-only cache entry that is not modified
            // while mapped.
            unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device) }
        } else {
            VarBuilder::from_pth(weights_path, DType::F32, &device)
        }
        .map_err(|e| EmbeddingError::ModelLoad(format!("weights: {e}")))?;

        let model = BertModel::load(vb, &config)
            .map_err(|e| EmbeddingError::ModelLoad(format!("BERT model: {e}")))?;

        info!(
            target: RANKING,
            model = model_id,
            hidden_size,
            max_seq_len,
            "Embedding model loaded"
        );

        Ok(Self {
            model_id: model_id.to_string(),
            model,
            tokenizer,
            device,
            hidden_size,
        })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::Tokenization(e.to_string()))?;

        let ids = encodings
            .iter()
            .map(|enc| Tensor::new(enc.get_ids(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()
            .map_err(inference)?;
        let masks = encodings
            .iter()
            .map(|enc| Tensor::new(enc.get_attention_mask(), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()
            .map_err(inference)?;

        let input_ids = Tensor::stack(&ids, 0).map_err(inference)?;
        let attention_mask = Tensor::stack(&masks, 0).map_err(inference)?;
        let token_type_ids = input_ids.zeros_like().map_err(inference)?;

        // [batch, seq, hidden]
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(inference)?;

        let pooled = mean_pool(&hidden, &attention_mask).map_err(inference)?;
        let normalized = normalize_rows(&pooled).map_err(inference)?;
        normalized.to_vec2::<f32>().map_err(inference)
    }
}

/// Mean over tokens, ignoring padding positions.
fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
    let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
    let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
    let counts = mask.sum(1)?.clamp(1e-9f32, f32::MAX)?;
    summed.broadcast_div(&counts)
}

fn normalize_rows(v: &Tensor) -> candle_core::Result<Tensor> {
    let norms = v.sqr()?.sum_keepdim(1)?.sqrt()?.clamp(1e-12f32, f32::MAX)?;
    v.broadcast_div(&norms)
}

fn inference(e: candle_core::Error) -> EmbeddingError {
    EmbeddingError::Inference(e.to_string())
}

impl Embedder for BertEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn embedding_dim(&self) -> usize {
        self.hidden_size
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(FORWARD_BATCH) {
            out.extend(self.embed_chunk(chunk)?);
        }
        debug!(target: RANKING, texts = texts.len(), "embedded batch");
        if out.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: out.len(),
            });
        }
        Ok(out)
    }
}
