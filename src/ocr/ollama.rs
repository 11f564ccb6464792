//! Ollama vision-model backend
//!
//! Ollama's calling convention hands the model an image file, so each
//! request stages the normalized PNG in a uniquely named temporary file.
//! The file lives exactly as long as the [`StagedImage`] guard: every exit
//! path out of [`OllamaBackend::extract`] removes it.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::decoder::NormalizedImage;
use super::provider::ExtractionBackend;
use super::types::{BackendError, BackendHealth, BackendOutput, ExtractionOptions};
use crate::config::{BackendKind, OllamaConfig};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    images: Vec<String>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

/// A normalized image written to disk for the duration of one request
pub struct StagedImage {
    file: NamedTempFile,
}

impl StagedImage {
    pub fn write(dir: &Path, png: &[u8]) -> std::io::Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("ocr-")
            .suffix(".png")
            .tempfile_in(dir)?;
        file.write_all(png)?;
        file.flush()?;

        debug!("Staged image at {}", file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

impl Drop for StagedImage {
    fn drop(&mut self) {
        // NamedTempFile unlinks the file once this guard is gone
        debug!("Removing staged image {}", self.file.path().display());
    }
}

/// Ollama vision model backend
pub struct OllamaBackend {
    client: Client,
    /// Ollama API URL
    base_url: String,
    /// Model name (e.g., "minicpm-v:8b", "llava")
    model: String,
    staging_dir: PathBuf,
}

impl OllamaBackend {
    pub fn new(config: &OllamaConfig, staging_dir: PathBuf) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| {
                BackendError::Unavailable(format!("Failed to build HTTP client: {}", e))
            })?;

        let base_url = config.url.trim_end_matches('/').to_string();
        info!(
            "Ollama backend configured: url={}, model={}, staging={}",
            base_url,
            config.model,
            staging_dir.display()
        );

        Ok(Self {
            client,
            base_url,
            model: config.model.clone(),
            staging_dir,
        })
    }

    async fn fetch_tags(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(format!("Failed to reach Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Api(format!("Failed to parse model list: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn chat(&self, prompt: &str, staged: &StagedImage) -> Result<String, BackendError> {
        let image_base64 = STANDARD.encode(tokio::fs::read(staged.path()).await?);

        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
                images: vec![image_base64],
            }],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(format!("Failed to reach Ollama: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api(format!(
                "Ollama returned {}: {}",
                status, body
            )));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Api(format!("Failed to parse response: {}", e)))?;

        Ok(chat.message.content)
    }
}

/// Ollama lists untagged pulls as `<name>:latest`
fn model_installed(installed: &[String], model: &str) -> bool {
    installed.iter().any(|name| {
        name == model || (!model.contains(':') && *name == format!("{}:latest", model))
    })
}

#[async_trait]
impl ExtractionBackend for OllamaBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ollama
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> BackendHealth {
        match self.fetch_tags().await {
            Err(e) => BackendHealth::Unhealthy {
                error: e.to_string(),
            },
            Ok(models) if !model_installed(&models, &self.model) => BackendHealth::Degraded {
                message: format!(
                    "Model {} is not installed, run: ollama pull {}",
                    self.model, self.model
                ),
            },
            Ok(_) => BackendHealth::Healthy {
                message: "Local OCR server is running".to_string(),
            },
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        self.fetch_tags().await
    }

    async fn extract(
        &self,
        image: &NormalizedImage,
        options: &ExtractionOptions,
    ) -> Result<BackendOutput, BackendError> {
        let staged = StagedImage::write(&self.staging_dir, image.png_bytes())?;
        info!(
            "Image saved: {}x{} pixels, calling Ollama model: {}",
            image.width(),
            image.height(),
            self.model
        );

        let text = self.chat(&options.prompt, &staged).await?;
        info!("Extraction successful, response length: {}", text.len());

        Ok(BackendOutput {
            text,
            confidence: None,
            lines: None,
            model: self.model.clone(),
        })
    }
}
