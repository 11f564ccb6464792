//! PaddleOCR engine on ONNX Runtime
//!
//! Models run back to back on the CPU:
//! - `detection` - DB text detector producing line boxes
//! - `classification` - optional orientation classifier flipping rotated lines
//! - `recognition` - CRNN recognizer decoding each cropped line
//!
//! Expected files in the model directory:
//! - det_model.onnx
//! - rec_model.onnx
//! - cls_model.onnx (optional)
//! - a dictionary, one character per line (ppocr_keys_v1.txt by default,
//!   en_dict.txt for the English-only models)

mod classification;
mod detection;
mod recognition;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use ndarray::Array4;
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use tracing::{debug, info, warn};

pub use classification::AngleClassifier;
pub use detection::{DetectionParams, TextBox, TextDetector};
pub use recognition::{ctc_greedy_decode, TextRecognizer};

use super::provider::LineRecognizer;
use super::types::RecognizedLine;
use crate::config::PaddleConfig;

pub const DETECTION_MODEL_FILE: &str = "det_model.onnx";
pub const RECOGNITION_MODEL_FILE: &str = "rec_model.onnx";
pub const CLASSIFIER_MODEL_FILE: &str = "cls_model.onnx";

/// Detection + orientation + recognition pipeline
pub struct PaddleOcrEngine {
    detector: TextDetector,
    classifier: Option<AngleClassifier>,
    recognizer: TextRecognizer,
    drop_score: f32,
}

impl PaddleOcrEngine {
    /// Load the models and dictionary from `config.model_dir`
    pub fn load(config: &PaddleConfig) -> Result<Self> {
        let dir = &config.model_dir;
        info!("Initializing PaddleOCR from {}", dir.display());

        let detector = TextDetector::new(
            build_session(&dir.join(DETECTION_MODEL_FILE), config.intra_threads)?,
            DetectionParams {
                threshold: config.det_threshold,
                box_threshold: config.box_threshold,
                ..DetectionParams::default()
            },
        );

        let classifier = if config.use_angle_cls {
            let path = dir.join(CLASSIFIER_MODEL_FILE);
            if path.exists() {
                Some(AngleClassifier::new(build_session(&path, config.intra_threads)?))
            } else {
                warn!(
                    "{} not found, text line orientation will not be corrected",
                    path.display()
                );
                None
            }
        } else {
            None
        };

        let recognizer = TextRecognizer::new(
            build_session(&dir.join(RECOGNITION_MODEL_FILE), config.intra_threads)?,
            &dictionary_path(config),
        )?;

        info!(
            "PaddleOCR initialized ({} characters in dictionary)",
            recognizer.dictionary_size()
        );

        Ok(Self {
            detector,
            classifier,
            recognizer,
            drop_score: config.drop_score,
        })
    }
}

impl LineRecognizer for PaddleOcrEngine {
    fn name(&self) -> &str {
        "paddleocr"
    }

    fn recognize(&mut self, image: &RgbImage) -> Result<Vec<RecognizedLine>> {
        let boxes = self.detector.detect(image)?;
        debug!("Detected {} text regions", boxes.len());

        let mut lines = Vec::with_capacity(boxes.len());
        for text_box in &boxes {
            let Some(mut crop) = text_box.crop(image) else {
                continue;
            };
            if let Some(classifier) = self.classifier.as_mut() {
                crop = classifier.orient(crop)?;
            }

            let (text, confidence) = self.recognizer.recognize(&crop)?;
            let text = text.trim();
            if text.is_empty() || confidence < self.drop_score {
                debug!("Dropping line {:?} (confidence {:.2})", text, confidence);
                continue;
            }

            lines.push(RecognizedLine::new(text, confidence));
        }

        Ok(lines)
    }
}

/// Dictionary location; relative names resolve against the model directory
fn dictionary_path(config: &PaddleConfig) -> PathBuf {
    config.model_dir.join(&config.dictionary)
}

/// CPU-only ONNX session
fn build_session(model_path: &Path, intra_threads: usize) -> Result<Session> {
    if !model_path.exists() {
        anyhow::bail!("PaddleOCR model not found: {}", model_path.display());
    }

    let session = Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(intra_threads)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load model from {}", model_path.display()))?;

    debug!("Loaded {}", model_path.display());
    Ok(session)
}

/// Name of the first model input, falling back to Paddle's export default
fn input_name(session: &Session) -> String {
    session
        .inputs
        .first()
        .map(|input| input.name.clone())
        .unwrap_or_else(|| "x".to_string())
}

/// HWC u8 image to a normalized NCHW tensor
fn to_nchw(image: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
    let (width, height) = image.dimensions();
    let mut tensor = Array4::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in image.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
        }
    }

    tensor
}
