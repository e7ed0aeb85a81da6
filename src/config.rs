//! Process configuration: command-line flags with environment fallbacks.

use std::path::PathBuf;

use clap::Parser;

use crate::embeddings::{OpenAIConfig, OPENAI_DEFAULT_BASE_URL, OPENAI_DEFAULT_MODEL};
use crate::index::DistanceMetric;

#[derive(Parser, Debug, Clone)]
#[command(
    version,
    about = "embedding-store - HTTP front end for a persistent vector store",
    long_about = None
)]
pub struct Settings {
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Directory holding one file per collection
    #[arg(long, env = "VECTOR_DB_PATH", default_value = "./vector_db")]
    pub db_path: PathBuf,

    /// Directory of the local sentence-embedding model
    #[arg(long, env = "EMBEDDING_MODEL_PATH", default_value = "./models/all-MiniLM-L6-v2")]
    pub model_path: PathBuf,

    /// Distance metric for newly created collections
    #[arg(long, env = "DISTANCE_METRIC", value_enum, default_value_t = DistanceMetric::L2)]
    pub distance: DistanceMetric,

    /// Enables the hosted embedding provider when set
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = OPENAI_DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    #[arg(long, env = "OPENAI_EMBEDDING_MODEL", default_value = OPENAI_DEFAULT_MODEL)]
    pub openai_model: String,
}

impl Settings {
    /// Hosted provider configuration; `None` when no credential is set
    pub fn openai_config(&self) -> Option<OpenAIConfig> {
        let api_key = self.openai_api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())?;
        Some(
            OpenAIConfig::new(api_key)
                .with_base_url(&self.openai_base_url)
                .with_model(&self.openai_model),
        )
    }
}
