//! OCR Module
//!
//! Extracts text from base64-encoded images through one of two backends:
//! - PaddleOCR line recognition on ONNX Runtime (`paddle` feature)
//! - Ollama vision models (local LLM)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ocr_gateway::ocr::{ExtractionService, LineRecognitionBackend, PaddleOcrEngine};
//!
//! let engine = PaddleOcrEngine::load(&config.backend.paddle)?;
//! let backend = Arc::new(LineRecognitionBackend::new(engine));
//! let service = ExtractionService::new(backend, &config.extraction);
//!
//! let result = service.extract(Some(base64_png), None).await?;
//! println!("{} (faces: {})", result.text, result.faces.has_faces);
//! ```

mod decoder;
mod heuristics;
mod ollama;
mod provider;
mod service;
mod types;

#[cfg(feature = "paddle")]
pub mod paddle;

pub use decoder::{
    strip_data_url, DecodeError, ImageDecoder, NormalizedImage, DEFAULT_MAX_IMAGE_BYTES,
};
pub use heuristics::FaceHeuristic;
pub use ollama::{OllamaBackend, StagedImage};
pub use provider::{aggregate_lines, ExtractionBackend, LineRecognitionBackend, LineRecognizer};
pub use service::{ExtractionService, MISSING_IMAGE, MISSING_IMAGES};
pub use types::{
    BackendError, BackendHealth, BackendOutput, ExtractionOptions, ExtractionResult, FaceIndicator,
    RecognizedLine,
};

#[cfg(feature = "paddle")]
pub use paddle::PaddleOcrEngine;
