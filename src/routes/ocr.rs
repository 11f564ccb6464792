//! Text extraction routes
//!
//! `POST /ocr` handles one image, `POST /ocr/batch` a list of images. Batch
//! items fail individually; the envelope only fails when `images` itself is
//! missing or the body is not valid JSON.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::BackendKind;
use crate::error::{AppError, Result};
use crate::ocr::{ExtractionResult, MISSING_IMAGES};
use crate::state::AppState;

/// Create the OCR router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/ocr", post(extract))
        .route("/ocr/batch", post(extract_batch))
}

#[derive(Debug, Deserialize)]
pub struct OcrRequest {
    /// Base64 image, optionally with a data-URL prefix
    pub image: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    /// Entries are validated one by one
    pub images: Option<Vec<Value>>,
    pub prompt: Option<String>,
}

/// Successful extraction
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResponse {
    pub success: bool,
    pub text: String,
    pub has_faces: bool,
    pub face_count: u32,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<usize>,
    /// Same string as `text`, kept for generative-backend clients
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl From<ExtractionResult> for OcrResponse {
    fn from(result: ExtractionResult) -> Self {
        let content = match result.backend {
            BackendKind::Ollama => Some(result.text.clone()),
            BackendKind::Paddle => None,
        };

        Self {
            success: true,
            text: result.text,
            has_faces: result.faces.has_faces,
            face_count: result.faces.face_count,
            model: result.model,
            confidence: result.confidence.map(round_confidence),
            lines: result.lines,
            content,
        }
    }
}

/// A batch entry that could not be processed
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub text: String,
    pub has_faces: bool,
    pub face_count: u32,
    /// Zero for the line backend, absent for the generative backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub error: String,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Extracted(OcrResponse),
    Failed(FailedItem),
}

impl BatchItem {
    pub fn new(result: Result<ExtractionResult>, backend: BackendKind) -> Self {
        match result {
            Ok(extracted) => BatchItem::Extracted(extracted.into()),
            Err(e) => BatchItem::Failed(FailedItem {
                text: String::new(),
                has_faces: false,
                face_count: 0,
                confidence: match backend {
                    BackendKind::Paddle => Some(0.0),
                    BackendKind::Ollama => None,
                },
                error: e.to_string(),
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub results: Vec<BatchItem>,
}

/// Extract text from a single image
async fn extract(
    State(state): State<AppState>,
    payload: std::result::Result<Json<OcrRequest>, JsonRejection>,
) -> Result<Json<OcrResponse>> {
    let Json(request) = payload.map_err(invalid_body)?;

    let result = state
        .service()
        .extract(request.image.as_deref(), request.prompt.as_deref())
        .await?;

    tracing::info!(
        "Extracted {} characters with {} (faces: {})",
        result.text.len(),
        result.model,
        result.faces.has_faces
    );
    Ok(Json(result.into()))
}

/// Extract text from several images, one result per entry
async fn extract_batch(
    State(state): State<AppState>,
    payload: std::result::Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>> {
    let Json(request) = payload.map_err(invalid_body)?;
    let images = request
        .images
        .ok_or_else(|| AppError::InvalidInput(MISSING_IMAGES.to_string()))?;

    tracing::info!("Processing batch of {} images", images.len());

    let service = state.service();
    let backend = service.backend().kind();
    let results = service
        .extract_batch(&images, request.prompt.as_deref())
        .await
        .into_iter()
        .map(|result| BatchItem::new(result, backend))
        .collect();

    Ok(Json(BatchResponse { results }))
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(rejection.body_text())
    } else {
        AppError::InvalidInput(rejection.body_text())
    }
}

fn round_confidence(confidence: f32) -> f64 {
    (f64::from(confidence) * 100.0).round() / 100.0
}
