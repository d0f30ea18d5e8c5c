use crate::config::Config;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

#[derive(Debug, Clone)]
pub struct ImageOptions {
    pub count: u32,
    pub mime_type: String,
    pub aspect_ratio: String,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            count: 1,
            mime_type: "image/jpeg".to_string(),
            aspect_ratio: "1:1".to_string(),
        }
    }
}

/// One prompt in, raw encoded image bytes out. Callers own caching and
/// failure sentinels; a client only ever reports success or an error.
#[async_trait]
pub trait ImageClient: Send + Sync + Debug {
    async fn generate(&self, prompt: &str, opts: &ImageOptions) -> Result<Vec<u8>>;
}

pub fn create_image_client(config: &Config) -> Result<Box<dyn ImageClient>> {
    match config.images.provider.as_str() {
        "gemini" => {
            let cfg = config
                .images
                .gemini
                .as_ref()
                .context("Gemini image config missing")?;
            Ok(Box::new(GeminiImageClient::new(&cfg.api_key, &cfg.model)))
        }
        "openai" => {
            let cfg = config
                .images
                .openai
                .as_ref()
                .context("OpenAI image config missing")?;
            Ok(Box::new(OpenAIImageClient::new(
                &cfg.api_key,
                &cfg.model,
                cfg.base_url.as_deref(),
                &cfg.size,
            )))
        }
        _ => Err(anyhow!(
            "Unknown image provider: {}",
            config.images.provider
        )),
    }
}

// --- Gemini (Imagen) ---

#[derive(Debug)]
struct GeminiImageClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiImageClient {
    fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct ImagenRequest {
    instances: Vec<ImagenInstance>,
    parameters: ImagenParameters,
}

#[derive(Serialize)]
struct ImagenInstance {
    prompt: String,
}

#[derive(Serialize)]
struct ImagenParameters {
    #[serde(rename = "sampleCount")]
    sample_count: u32,
    #[serde(rename = "outputMimeType")]
    output_mime_type: String,
    #[serde(rename = "aspectRatio")]
    aspect_ratio: String,
}

#[derive(Deserialize)]
struct ImagenResponse {
    #[serde(default)]
    predictions: Vec<ImagenPrediction>,
}

#[derive(Deserialize)]
struct ImagenPrediction {
    #[serde(rename = "bytesBase64Encoded")]
    bytes_base64_encoded: Option<String>,
}

#[async_trait]
impl ImageClient for GeminiImageClient {
    async fn generate(&self, prompt: &str, opts: &ImageOptions) -> Result<Vec<u8>> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:predict?key={}",
            self.model, self.api_key
        );

        let request_body = ImagenRequest {
            instances: vec![ImagenInstance {
                prompt: prompt.to_string(),
            }],
            parameters: ImagenParameters {
                sample_count: opts.count,
                output_mime_type: opts.mime_type.clone(),
                aspect_ratio: opts.aspect_ratio.clone(),
            },
        };

        let resp = self.client.post(&url).json(&request_body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("Imagen API error ({}): {}", status, error_text));
        }

        let result: ImagenResponse = resp.json().await.context("Failed to parse Imagen response")?;
        decode_prediction(&result)
    }
}

fn decode_prediction(response: &ImagenResponse) -> Result<Vec<u8>> {
    let prediction = response
        .predictions
        .first()
        .ok_or_else(|| anyhow!("Imagen response contained no predictions"))?;
    let encoded = prediction
        .bytes_base64_encoded
        .as_deref()
        .ok_or_else(|| anyhow!("Imagen prediction missing image bytes"))?;
    general_purpose::STANDARD
        .decode(encoded)
        .context("Failed to decode Imagen image bytes")
}

// --- OpenAI ---

#[derive(Debug)]
struct OpenAIImageClient {
    api_key: String,
    model: String,
    base_url: String,
    size: String,
    client: reqwest::Client,
}

impl OpenAIImageClient {
    fn new(api_key: &str, model: &str, base_url: Option<&str>, size: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or("https://api.openai.com/v1")
                .trim_end_matches('/')
                .to_string(),
            size: size.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

#[derive(Serialize)]
struct OpenAIImageRequest {
    model: String,
    prompt: String,
    n: u32,
    size: String,
    response_format: String,
}

#[derive(Deserialize)]
struct OpenAIImageResponse {
    #[serde(default)]
    data: Vec<OpenAIImageData>,
}

#[derive(Deserialize)]
struct OpenAIImageData {
    b64_json: Option<String>,
}

#[async_trait]
impl ImageClient for OpenAIImageClient {
    async fn generate(&self, prompt: &str, opts: &ImageOptions) -> Result<Vec<u8>> {
        let url = format!("{}/images/generations", self.base_url);

        let request_body = OpenAIImageRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            n: opts.count,
            size: self.size.clone(),
            response_format: "b64_json".to_string(),
        };

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await?;
            return Err(anyhow!("OpenAI image API error ({}): {}", status, error_text));
        }

        let result: OpenAIImageResponse = resp
            .json()
            .await
            .context("Failed to parse OpenAI image response")?;
        let encoded = result
            .data
            .first()
            .and_then(|d| d.b64_json.as_deref())
            .ok_or_else(|| anyhow!("OpenAI image response missing b64_json"))?;
        general_purpose::STANDARD
            .decode(encoded)
            .context("Failed to decode OpenAI image bytes")
    }
}
