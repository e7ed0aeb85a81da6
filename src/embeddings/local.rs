use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_transformers::models::bert::{BertModel, Config};
use tokenizers::{Tokenizer, TruncationParams};

use super::{EmbeddingError, EmbeddingFunction, Result};

const MAX_SEQUENCE_LENGTH: usize = 512;

/// Local sentence-embedding model (all-MiniLM-L6-v2 by default)
///
/// The model directory must hold `tokenizer.json`, `config.json` and
/// `pytorch_model.bin`. Inference runs on the blocking thread pool so a
/// long embedding call never stalls the request executor.
#[derive(Clone)]
pub struct LocalEmbedder {
    encoder: Arc<BertEncoder>,
}

struct BertEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dimension: usize,
}

impl std::fmt::Debug for LocalEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEmbedder")
            .field("device", &self.encoder.device)
            .field("dimension", &self.encoder.dimension)
            .field("model", &"<BertModel>")
            .field("tokenizer", &"<Tokenizer>")
            .finish()
    }
}

impl LocalEmbedder {
    pub const NAME: &'static str = "default";

    pub fn from_dir(model_path: impl AsRef<Path>) -> Result<Self> {
        let device = Device::Cpu;
        let encoder = BertEncoder::load(model_path.as_ref(), device)?;
        Ok(Self {
            encoder: Arc::new(encoder),
        })
    }
}

impl BertEncoder {
    fn load(model_dir: &Path, device: Device) -> Result<Self> {
        let tokenizer_path = required_file(model_dir, "tokenizer.json")?;
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EmbeddingError::ModelLoading(format!("Failed to load tokenizer: {}", e)))?;
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..Default::default()
            }))
            .map_err(|e| EmbeddingError::ModelLoading(format!("Failed to configure truncation: {}", e)))?;

        let config_path = required_file(model_dir, "config.json")?;
        let config_str = std::fs::read_to_string(&config_path)
            .map_err(|e| EmbeddingError::ModelLoading(format!("Failed to read config: {}", e)))?;
        let config: Config = serde_json::from_str(&config_str)
            .map_err(|e| EmbeddingError::ModelLoading(format!("Failed to parse config: {}", e)))?;
        let dimension = config.hidden_size;

        let model_file = required_file(model_dir, "pytorch_model.bin")?;
        let weights = candle_nn::VarBuilder::from_pth(&model_file, DType::F32, &device)
            .map_err(|e| EmbeddingError::ModelLoading(format!("Failed to load weights: {}", e)))?;
        let model = BertModel::load(weights, &config)
            .map_err(|e| EmbeddingError::ModelLoading(format!("Failed to create model: {}", e)))?;

        Ok(Self {
            model,
            tokenizer,
            device,
            dimension,
        })
    }

    /// Mean-pooled, L2-normalized sentence embedding
    fn encode(&self, text: &str) -> Result<Vec<f64>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| EmbeddingError::Tokenization(e.to_string()))?;
        let token_ids = encoding.get_ids();

        let input_ids = Tensor::new(token_ids, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| EmbeddingError::Inference(format!("Failed to create input tensor: {}", e)))?;
        let token_type_ids = Tensor::zeros((1, token_ids.len()), DType::U32, &self.device)
            .map_err(|e| EmbeddingError::Inference(format!("Failed to create token type ids: {}", e)))?;

        let outputs = self
            .model
            .forward(&input_ids, &token_type_ids, None)
            .map_err(|e| EmbeddingError::Inference(format!("Model inference failed: {}", e)))?;
        let token_embeddings: Vec<Vec<f32>> = outputs
            .squeeze(0)
            .and_then(|t| t.to_vec2())
            .map_err(|e| EmbeddingError::Inference(format!("Failed to read model output: {}", e)))?;

        let mut pooled = vec![0.0f64; self.dimension];
        for token in &token_embeddings {
            for (acc, value) in pooled.iter_mut().zip(token) {
                *acc += *value as f64;
            }
        }
        let count = token_embeddings.len().max(1) as f64;
        pooled.iter_mut().for_each(|v| *v /= count);

        let norm = pooled.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            pooled.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(pooled)
    }
}

fn required_file(model_dir: &Path, file_name: &str) -> Result<std::path::PathBuf> {
    let path = model_dir.join(file_name);
    if !path.exists() {
        return Err(EmbeddingError::ModelLoading(format!(
            "{} not found. Please ensure the model is downloaded to {}",
            path.display(),
            model_dir.display()
        )));
    }
    Ok(path)
}

#[async_trait]
impl EmbeddingFunction for LocalEmbedder {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn dimension(&self) -> usize {
        self.encoder.dimension
    }

    async fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>> {
        let encoder = Arc::clone(&self.encoder);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || texts.iter().map(|text| encoder.encode(text)).collect())
            .await
            .map_err(|e| EmbeddingError::Inference(format!("Embedding task failed: {}", e)))?
    }
}
