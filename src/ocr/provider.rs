//! OCR Providers
//!
//! Defines the backend trait and the line-recognition adapter. The Ollama
//! backend lives in `ollama.rs`, the PaddleOCR engine in `paddle/`.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::decoder::NormalizedImage;
use super::types::{BackendError, BackendHealth, BackendOutput, ExtractionOptions, RecognizedLine};
use crate::config::BackendKind;

/// Text extraction backend
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Get the backend type
    fn kind(&self) -> BackendKind;

    /// Model identifier reported to clients
    fn model_name(&self) -> &str;

    /// Check whether the engine can currently serve requests
    async fn health_check(&self) -> BackendHealth;

    /// List the models the engine can serve
    async fn list_models(&self) -> Result<Vec<String>, BackendError>;

    /// Extract text from a normalized image
    async fn extract(
        &self,
        image: &NormalizedImage,
        options: &ExtractionOptions,
    ) -> Result<BackendOutput, BackendError>;
}

/// Synchronous engine returning recognized text lines in detection order
pub trait LineRecognizer: Send + 'static {
    /// Engine name (e.g. "paddleocr")
    fn name(&self) -> &str;

    fn recognize(&mut self, image: &image::RgbImage) -> anyhow::Result<Vec<RecognizedLine>>;
}

/// Join line texts and average their confidences
///
/// Zero lines yield an empty string and a confidence of exactly 0.
pub fn aggregate_lines(lines: &[RecognizedLine]) -> (String, f32) {
    let text = lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let confidence = if lines.is_empty() {
        0.0
    } else {
        lines.iter().map(|line| line.confidence).sum::<f32>() / lines.len() as f32
    };

    (text, confidence)
}

/// Backend adapter for a [`LineRecognizer`]
///
/// The engine is CPU-bound and not safe for concurrent runs, so every call
/// takes the lock on the blocking thread pool.
pub struct LineRecognitionBackend<R: LineRecognizer> {
    engine: Arc<Mutex<R>>,
    model_name: String,
}

impl<R: LineRecognizer> LineRecognitionBackend<R> {
    pub fn new(engine: R) -> Self {
        let model_name = engine.name().to_string();
        Self {
            engine: Arc::new(Mutex::new(engine)),
            model_name,
        }
    }
}

#[async_trait]
impl<R: LineRecognizer> ExtractionBackend for LineRecognitionBackend<R> {
    fn kind(&self) -> BackendKind {
        BackendKind::Paddle
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn health_check(&self) -> BackendHealth {
        // Models are loaded before the server starts
        BackendHealth::Healthy {
            message: format!("{} model loaded", self.model_name),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        Ok(vec![self.model_name.clone()])
    }

    async fn extract(
        &self,
        image: &NormalizedImage,
        _options: &ExtractionOptions,
    ) -> Result<BackendOutput, BackendError> {
        let engine = Arc::clone(&self.engine);
        let pixels = image.pixels().clone();

        let lines = tokio::task::spawn_blocking(move || engine.lock().recognize(&pixels))
            .await
            .map_err(|e| BackendError::Processing(format!("Recognition task failed: {}", e)))?
            .map_err(|e| BackendError::Processing(format!("{:#}", e)))?;

        let (text, confidence) = aggregate_lines(&lines);
        tracing::info!(
            "OCR complete. Extracted {} characters from {} lines",
            text.len(),
            lines.len()
        );

        Ok(BackendOutput {
            text,
            confidence: Some(confidence),
            lines: Some(lines.len()),
            model: self.model_name.clone(),
        })
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;

    /// Canned-output recognizer for tests
    pub struct MockRecognizer {
        pub lines: Vec<RecognizedLine>,
        pub fail: bool,
    }

    impl LineRecognizer for MockRecognizer {
        fn name(&self) -> &str {
            "mock-ocr"
        }

        fn recognize(&mut self, _image: &image::RgbImage) -> anyhow::Result<Vec<RecognizedLine>> {
            if self.fail {
                anyhow::bail!("inference exploded");
            }
            Ok(self.lines.clone())
        }
    }
}
