//! CRNN line recognition with CTC greedy decoding

use std::path::Path;

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{Array2, ArrayView2};
use ort::session::Session;
use ort::value::Value;

use super::{input_name, to_nchw};

/// Recognizer input height
pub const INPUT_HEIGHT: u32 = 48;

const MIN_WIDTH: u32 = 16;
const MAX_WIDTH: u32 = 1280;

pub struct TextRecognizer {
    session: Session,
    input_name: String,
    /// Index 0 is the CTC blank
    dictionary: Vec<char>,
}

impl TextRecognizer {
    pub fn new(session: Session, dictionary_path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(dictionary_path).with_context(|| {
            format!("Failed to read dictionary {}", dictionary_path.display())
        })?;

        let dictionary = parse_dictionary(&contents);
        if dictionary.len() <= 2 {
            anyhow::bail!("Dictionary {} is empty", dictionary_path.display());
        }

        Ok(Self {
            input_name: input_name(&session),
            session,
            dictionary,
        })
    }

    /// Number of entries including the blank and trailing space
    pub fn dictionary_size(&self) -> usize {
        self.dictionary.len()
    }

    /// Recognize a single cropped line
    pub fn recognize(&mut self, line: &RgbImage) -> Result<(String, f32)> {
        let (width, height) = line.dimensions();
        if width == 0 || height == 0 {
            return Ok((String::new(), 0.0));
        }

        let resized = imageops::resize(
            line,
            input_width(width, height),
            INPUT_HEIGHT,
            FilterType::Triangle,
        );
        let input = Value::from_array(to_nchw(&resized, [0.5; 3], [0.5; 3]))
            .context("Failed to create recognition input tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .context("Recognition inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract recognition output")?;

        // [1, T, C]
        let shape = output.shape();
        if shape.len() != 3 {
            anyhow::bail!("Unexpected recognition output shape: {:?}", shape);
        }
        let probs = Array2::from_shape_vec((shape[1], shape[2]), output.iter().copied().collect())
            .context("Recognition output is not a single sequence")?;

        Ok(ctc_greedy_decode(probs.view(), &self.dictionary))
    }
}

/// Width keeping the aspect ratio at [`INPUT_HEIGHT`]
fn input_width(width: u32, height: u32) -> u32 {
    let scaled = (INPUT_HEIGHT as f32 * width as f32 / height as f32).ceil() as u32;
    scaled.clamp(MIN_WIDTH, MAX_WIDTH)
}

/// Blank at index 0, one character per line, space appended last
fn parse_dictionary(contents: &str) -> Vec<char> {
    let mut dictionary = vec!['\0'];
    dictionary.extend(
        contents
            .lines()
            .map(|line| line.trim_end_matches('\r').chars().next().unwrap_or(' ')),
    );
    dictionary.push(' ');
    dictionary
}

/// Collapse repeats, drop blanks; confidence is the mean of emitted steps
pub fn ctc_greedy_decode(probs: ArrayView2<f32>, dictionary: &[char]) -> (String, f32) {
    let mut text = String::new();
    let mut scores = Vec::new();
    let mut prev = 0usize;

    for step in probs.outer_iter() {
        let (idx, score) = step
            .iter()
            .copied()
            .enumerate()
            .fold((0usize, f32::MIN), |best, (i, p)| if p > best.1 { (i, p) } else { best });

        if idx != 0 && idx != prev {
            if let Some(&c) = dictionary.get(idx) {
                text.push(c);
                scores.push(score);
            }
        }
        prev = idx;
    }

    let confidence = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f32>() / scores.len() as f32
    };

    (text, confidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn dictionary() -> Vec<char> {
        parse_dictionary("a\nb\nc")
    }

    #[test]
    fn test_parse_dictionary() {
        let dict = parse_dictionary("a\r\nb\n\nc");
        assert_eq!(dict, vec!['\0', 'a', 'b', ' ', 'c', ' ']);
    }

    #[test]
    fn test_decode_collapses_repeats_and_blanks() {
        // a a _ a b b -> "aab"
        let probs = array![
            [0.1, 0.8, 0.05, 0.05, 0.0],
            [0.1, 0.9, 0.0, 0.0, 0.0],
            [0.9, 0.1, 0.0, 0.0, 0.0],
            [0.2, 0.6, 0.1, 0.1, 0.0],
            [0.0, 0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0, 0.0],
        ];

        let (text, confidence) = ctc_greedy_decode(probs.view(), &dictionary());
        assert_eq!(text, "aab");
        assert!((confidence - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_decode_space_index() {
        let probs = array![[0.0, 0.0, 0.0, 0.0, 1.0], [0.0, 0.0, 0.0, 1.0, 0.0]];
        let (text, _) = ctc_greedy_decode(probs.view(), &dictionary());
        assert_eq!(text, " c");
    }

    #[test]
    fn test_decode_all_blank() {
        let probs = array![[1.0, 0.0, 0.0, 0.0, 0.0], [0.9, 0.1, 0.0, 0.0, 0.0]];
        let (text, confidence) = ctc_greedy_decode(probs.view(), &dictionary());
        assert!(text.is_empty());
        assert_eq!(confidence, 0.0);
    }

    #[test]
    fn test_input_width_keeps_aspect_and_clamps() {
        assert_eq!(input_width(100, 48), 100);
        assert_eq!(input_width(200, 24), 400);
        assert_eq!(input_width(4, 48), MIN_WIDTH);
        assert_eq!(input_width(10_000, 10), MAX_WIDTH);
    }
}
