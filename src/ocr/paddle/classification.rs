//! Text line orientation classifier
//!
//! Predicts whether a cropped line is upright (label 0) or rotated by 180
//! degrees (label 1). Rotated lines are flipped before recognition.

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use super::input_name;

/// Classifier input is fixed at 3 x 48 x 192, right-padded with zeros
const INPUT_HEIGHT: u32 = 48;
const INPUT_WIDTH: u32 = 192;

/// Minimum probability of the rotated label before a line is flipped
pub const ROTATE_THRESHOLD: f32 = 0.9;

pub struct AngleClassifier {
    session: Session,
    input_name: String,
}

impl AngleClassifier {
    pub fn new(session: Session) -> Self {
        Self {
            input_name: input_name(&session),
            session,
        }
    }

    /// Return the line upright, flipping it when the model is confident
    pub fn orient(&mut self, line: RgbImage) -> Result<RgbImage> {
        let (width, height) = line.dimensions();
        if width == 0 || height == 0 {
            return Ok(line);
        }

        let input = Value::from_array(padded_input(&line))
            .context("Failed to create classifier input tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .context("Angle classification failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract classifier output")?;
        let probs: Vec<f32> = output.iter().copied().collect();

        if is_rotated(&probs, ROTATE_THRESHOLD) {
            tracing::debug!("Flipping upside-down line ({}x{})", width, height);
            Ok(imageops::rotate180(&line))
        } else {
            Ok(line)
        }
    }
}

/// Resize to the classifier height, normalize to [-1, 1], zero-pad the width
fn padded_input(line: &RgbImage) -> Array4<f32> {
    let (width, height) = line.dimensions();
    let scaled = (INPUT_HEIGHT as f32 * width as f32 / height as f32).ceil() as u32;
    let resized_width = scaled.clamp(1, INPUT_WIDTH);
    let resized = imageops::resize(line, resized_width, INPUT_HEIGHT, FilterType::Triangle);

    let mut tensor = Array4::zeros((1, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - 0.5) / 0.5;
        }
    }
    tensor
}

/// `probs` is `[upright, rotated]`
fn is_rotated(probs: &[f32], threshold: f32) -> bool {
    match probs {
        [upright, rotated, ..] => rotated > upright && *rotated >= threshold,
        _ => false,
    }
}
