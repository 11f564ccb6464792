//! Extraction Service
//!
//! Ties the decoder, the configured backend and the face heuristic together.
//! Routes only talk to this type.

use std::sync::Arc;

use serde_json::Value;

use super::decoder::ImageDecoder;
use super::heuristics::FaceHeuristic;
use super::provider::ExtractionBackend;
use super::types::{BackendError, BackendHealth, ExtractionOptions, ExtractionResult};
use crate::config::ExtractionConfig;
use crate::error::{AppError, Result};

pub const MISSING_IMAGE: &str = "No image provided";
pub const MISSING_IMAGES: &str = "No images provided";

/// Decode → extract → face heuristic pipeline
pub struct ExtractionService {
    backend: Arc<dyn ExtractionBackend>,
    decoder: ImageDecoder,
    faces: FaceHeuristic,
    default_prompt: String,
}

impl ExtractionService {
    pub fn new(backend: Arc<dyn ExtractionBackend>, config: &ExtractionConfig) -> Self {
        Self {
            backend,
            decoder: ImageDecoder::new(config.max_image_bytes),
            faces: FaceHeuristic::new(&config.face_keywords),
            default_prompt: config.default_prompt.clone(),
        }
    }

    pub fn backend(&self) -> &dyn ExtractionBackend {
        self.backend.as_ref()
    }

    /// Extract text from one base64 image
    ///
    /// A missing or blank image is rejected before the backend is touched.
    pub async fn extract(
        &self,
        image: Option<&str>,
        prompt: Option<&str>,
    ) -> Result<ExtractionResult> {
        let encoded = image
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::InvalidInput(MISSING_IMAGE.to_string()))?;

        let options = self.options(prompt);
        self.run(encoded, &options).await
    }

    /// Extract every entry independently, preserving input order
    ///
    /// Items run one after another; one failing item never affects the others.
    pub async fn extract_batch(
        &self,
        images: &[Value],
        prompt: Option<&str>,
    ) -> Vec<Result<ExtractionResult>> {
        let options = self.options(prompt);
        let mut results = Vec::with_capacity(images.len());

        for (index, entry) in images.iter().enumerate() {
            let result = match entry.as_str() {
                Some(encoded) if !encoded.trim().is_empty() => self.run(encoded, &options).await,
                Some(_) => Err(AppError::InvalidInput(MISSING_IMAGE.to_string())),
                None => Err(AppError::InvalidInput(format!(
                    "Image at index {} is not a base64 string",
                    index
                ))),
            };

            if let Err(e) = &result {
                tracing::warn!("Batch item {} failed: {}", index, e);
            }
            results.push(result);
        }

        tracing::info!(
            "Batch complete: {}/{} images succeeded",
            results.iter().filter(|r| r.is_ok()).count(),
            results.len()
        );
        results
    }

    pub async fn health_check(&self) -> BackendHealth {
        self.backend.health_check().await
    }

    pub async fn list_models(&self) -> std::result::Result<Vec<String>, BackendError> {
        self.backend.list_models().await
    }

    fn options(&self, prompt: Option<&str>) -> ExtractionOptions {
        let prompt = prompt
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.default_prompt);

        ExtractionOptions {
            prompt: prompt.to_string(),
        }
    }

    async fn run(&self, encoded: &str, options: &ExtractionOptions) -> Result<ExtractionResult> {
        let image = self.decoder.decode(encoded)?;
        tracing::debug!(
            "Processing {}x{} image with {}",
            image.width(),
            image.height(),
            self.backend.model_name()
        );

        let output = self.backend.extract(&image, options).await?;
        let faces = self.faces.evaluate(&output.text);

        Ok(ExtractionResult {
            text: output.text,
            confidence: output.confidence,
            lines: output.lines,
            faces,
            model: output.model,
            backend: self.backend.kind(),
        })
    }
}
