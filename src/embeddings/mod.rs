//! # Embedding Providers
//!
//! Text-to-vector functions used when a record or query arrives without an
//! explicit vector. Every collection is bound to one provider when it is first
//! opened; the [`EmbeddingRegistry`] holds the providers available to the
//! process and names the default one.

mod local;
mod openai;

pub use local::LocalEmbedder;
pub use openai::{
    OpenAIConfig, OpenAIEmbedder, DEFAULT_BASE_URL as OPENAI_DEFAULT_BASE_URL,
    DEFAULT_MODEL as OPENAI_DEFAULT_MODEL,
};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use crate::config::Settings;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Model loading failed: {0}")]
    ModelLoading(String),
    #[error("Tokenization failed: {0}")]
    Tokenization(String),
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Embedding API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("Embedding request failed: {0}")]
    Request(String),
    #[error("Provider returned {actual} embeddings for {expected} inputs")]
    ResponseCount { expected: usize, actual: usize },
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        EmbeddingError::Request(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// A text-to-vector provider
#[async_trait]
pub trait EmbeddingFunction: Send + Sync {
    /// Registry key for this provider
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Embed all texts in one call, returning one vector per text in order
    async fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<Vec<f64>>>;

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f64>> {
        let mut embeddings = self.generate_embeddings_batch(&[text.to_string()]).await?;
        match embeddings.len() {
            1 => Ok(embeddings.remove(0)),
            actual => Err(EmbeddingError::ResponseCount { expected: 1, actual }),
        }
    }
}

/// Providers available to the process, keyed by name
///
/// Built once at startup and shared by every collection; the default
/// provider is used whenever a caller does not name one.
#[derive(Clone)]
pub struct EmbeddingRegistry {
    default_name: String,
    providers: BTreeMap<String, Arc<dyn EmbeddingFunction>>,
}

impl std::fmt::Debug for EmbeddingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingRegistry")
            .field("default", &self.default_name)
            .field("providers", &self.names())
            .finish()
    }
}

impl EmbeddingRegistry {
    pub fn new(default: Arc<dyn EmbeddingFunction>) -> Self {
        let default_name = default.name().to_string();
        let mut providers = BTreeMap::new();
        providers.insert(default_name.clone(), default);
        Self {
            default_name,
            providers,
        }
    }

    /// Register an additional provider under its own name
    pub fn with_provider(mut self, provider: Arc<dyn EmbeddingFunction>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }

    /// Build the registry described by `settings`: the local model as the
    /// default, plus the hosted provider when a credential is configured.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let local = LocalEmbedder::from_dir(&settings.model_path)?;
        info!(
            "Loaded local embedding model from {} (dimension {})",
            settings.model_path.display(),
            local.dimension()
        );
        let registry = Self::new(Arc::new(local));

        match settings.openai_config() {
            Some(config) => {
                info!("Hosted embedding provider enabled with model {}", config.model);
                Ok(registry.with_provider(Arc::new(OpenAIEmbedder::new(config))))
            }
            None => {
                info!("OPENAI_API_KEY not set, hosted embedding provider disabled");
                Ok(registry)
            }
        }
    }

    pub fn default_provider(&self) -> Arc<dyn EmbeddingFunction> {
        Arc::clone(&self.providers[&self.default_name])
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EmbeddingFunction>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}
