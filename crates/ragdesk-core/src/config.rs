use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use anyhow::{Result, anyhow};

use crate::api::{QueryRequest, UploadOptions};
use crate::provider::{ChunkMode, ModelProvider};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Client-side preferences: where the backend lives, how to chunk uploads,
/// and how to retrieve when asking.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub model_provider: ModelProvider,
    pub chunk_mode: ChunkMode,
    pub chunk_size: u32,
    pub overlap: u32,
    pub top_k: u32,
    pub use_rerank: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model_provider: ModelProvider::OpenAI,
            chunk_mode: ChunkMode::Sliding,
            chunk_size: 500,
            overlap: 100,
            top_k: 5,
            use_rerank: true,
        }
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(config_path, config_content)?;
        Ok(())
    }

    /// What the upload form sends. Size and overlap go out as stored, whatever
    /// the chunk mode.
    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            chunk_mode: self.chunk_mode,
            chunk_size: self.chunk_size,
            overlap: self.overlap,
            model_provider: self.model_provider,
        }
    }

    pub fn query_request(&self, question: &str) -> QueryRequest {
        QueryRequest {
            question: question.to_string(),
            model_provider: self.model_provider,
            top_k: self.top_k,
            use_rerank: self.use_rerank,
        }
    }

    pub fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("ragdesk").join("config.json"))
    }
}

/// Directory for the transcript and log file.
pub fn data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;

    Ok(data_dir.join("ragdesk"))
}
