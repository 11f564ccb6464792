//! OCR Types
//!
//! Request, result and error types shared by both extraction backends.

use serde::Serialize;

use crate::config::BackendKind;

/// Per-request options handed to a backend
#[derive(Debug, Clone)]
pub struct ExtractionOptions {
    /// Free-text instruction (only the generative backend reads it)
    pub prompt: String,
}

/// A single line reported by a line-recognition engine
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedLine {
    pub text: String,
    /// Confidence score (0.0-1.0)
    pub confidence: f32,
}

impl RecognizedLine {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// What a backend hands back before the face heuristic runs
#[derive(Debug, Clone)]
pub struct BackendOutput {
    pub text: String,
    /// Mean line confidence; `None` for generative engines
    pub confidence: Option<f32>,
    /// Recognized line count; `None` for generative engines
    pub lines: Option<usize>,
    pub model: String,
}

/// Keyword-based face indicator
///
/// This is a guess derived from the extracted text, not a vision-based
/// face detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceIndicator {
    pub has_faces: bool,
    pub face_count: u32,
}

/// Final result of one extraction
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub text: String,
    pub confidence: Option<f32>,
    pub lines: Option<usize>,
    pub faces: FaceIndicator,
    pub model: String,
    pub backend: BackendKind,
}

/// Engine readiness as reported by a health check
#[derive(Debug, Clone, PartialEq)]
pub enum BackendHealth {
    Healthy { message: String },
    /// Reachable but unable to serve (e.g. model not installed)
    Degraded { message: String },
    Unhealthy { error: String },
}

impl BackendHealth {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Healthy { .. } => "healthy",
            Self::Degraded { .. } => "degraded",
            Self::Unhealthy { .. } => "unhealthy",
        }
    }
}

/// Backend error types
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("OCR engine not available: {0}")]
    Unavailable(String),

    #[error("OCR processing failed: {0}")]
    Processing(String),

    #[error("Engine API error: {0}")]
    Api(String),

    #[error("Failed to stage image: {0}")]
    Staging(#[from] std::io::Error),
}
