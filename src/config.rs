use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_output")]
    pub output_folder: String,

    #[serde(default = "default_build")]
    pub build_folder: String,

    #[serde(default = "default_revalidate")]
    pub revalidate: bool,

    pub llm: LlmConfig,

    pub images: ImageConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LlmConfig {
    pub provider: String, // "gemini", "ollama" or "openai"
    #[serde(default = "default_retry_count")]
    pub retry_count: usize,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_seconds: u64,
    pub gemini: Option<GeminiConfig>,
    pub ollama: Option<OllamaConfig>,
    pub openai: Option<OpenAIConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageConfig {
    #[serde(default = "default_image_provider")]
    pub provider: String, // "gemini" or "openai"

    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,

    #[serde(default = "default_output_mime")]
    pub output_mime: String,

    /// How many page images may render at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    pub gemini: Option<GeminiImageConfig>,
    pub openai: Option<OpenAIImageConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GeminiImageConfig {
    pub api_key: String,
    #[serde(default = "default_imagen_model")]
    pub model: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIImageConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default = "default_image_size")]
    pub size: String,
}

fn default_output() -> String {
    "output".to_string()
}
fn default_build() -> String {
    "build".to_string()
}
fn default_revalidate() -> bool {
    true
}
fn default_retry_count() -> usize {
    3
}
fn default_retry_delay() -> u64 {
    10
}
fn default_image_provider() -> String {
    "gemini".to_string()
}
fn default_aspect_ratio() -> String {
    "1:1".to_string()
}
fn default_output_mime() -> String {
    "image/jpeg".to_string()
}
fn default_concurrency() -> usize {
    2
}
fn default_imagen_model() -> String {
    "imagen-3.0-generate-002".to_string()
}
fn default_image_size() -> String {
    "1024x1024".to_string()
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Path::new("config.yml");
        if !path.exists() {
            anyhow::bail!("config.yml not found. Please create one.");
        }

        let content = fs::read_to_string(path).context("Failed to read config.yml")?;
        let config: Config =
            serde_yaml_ng::from_str(&content).context("Failed to parse config.yml")?;
        Ok(config)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.output_folder)?;
        fs::create_dir_all(&self.build_folder)?;
        Ok(())
    }
}
