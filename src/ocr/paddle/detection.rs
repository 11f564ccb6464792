//! DB text detection
//!
//! The detector outputs a per-pixel text probability map. Pixels above the
//! threshold are grouped into 4-connected regions; each surviving region
//! becomes one axis-aligned line box, expanded by the DB unclip distance.

use anyhow::{Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{Array2, ArrayView2};
use ort::session::Session;
use ort::value::Value;

use super::{input_name, to_nchw};

/// Longer image side is capped to this before detection
pub const MAX_SIDE_LEN: u32 = 960;

/// Detector input sides must be multiples of this
const STRIDE: u32 = 32;

const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Boxes whose top edges differ by less than this are on the same row
const ROW_TOLERANCE: f32 = 10.0;

#[derive(Debug, Clone, Copy)]
pub struct DetectionParams {
    /// Probability map binarization threshold
    pub threshold: f32,
    /// Minimum mean probability inside a region
    pub box_threshold: f32,
    /// DB unclip ratio
    pub unclip_ratio: f32,
    /// Regions with a shorter side (in map pixels) are noise
    pub min_size: usize,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            box_threshold: 0.6,
            unclip_ratio: 1.5,
            min_size: 3,
        }
    }
}

/// A detected line box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
    /// Mean probability of the region
    pub score: f32,
}

impl TextBox {
    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            x0: self.x0 * sx,
            y0: self.y0 * sy,
            x1: self.x1 * sx,
            y1: self.y1 * sy,
            score: self.score,
        }
    }

    /// Cut this box out of `image`; `None` when it covers less than 2x2 pixels
    pub fn crop(&self, image: &RgbImage) -> Option<RgbImage> {
        let (width, height) = image.dimensions();
        let x0 = (self.x0.floor().max(0.0) as u32).min(width);
        let y0 = (self.y0.floor().max(0.0) as u32).min(height);
        let x1 = (self.x1.ceil().max(0.0) as u32).min(width);
        let y1 = (self.y1.ceil().max(0.0) as u32).min(height);

        if x1 < x0 + 2 || y1 < y0 + 2 {
            return None;
        }

        Some(imageops::crop_imm(image, x0, y0, x1 - x0, y1 - y0).to_image())
    }
}

pub struct TextDetector {
    session: Session,
    input_name: String,
    params: DetectionParams,
}

impl TextDetector {
    pub fn new(session: Session, params: DetectionParams) -> Self {
        let input_name = input_name(&session);
        Self {
            session,
            input_name,
            params,
        }
    }

    /// Detect line boxes in source-image coordinates, in reading order
    pub fn detect(&mut self, image: &RgbImage) -> Result<Vec<TextBox>> {
        let (src_w, src_h) = image.dimensions();
        if src_w == 0 || src_h == 0 {
            return Ok(Vec::new());
        }

        let (det_w, det_h) = detection_size(src_w, src_h);
        let resized = imageops::resize(image, det_w, det_h, FilterType::Triangle);
        let input = Value::from_array(to_nchw(&resized, MEAN, STD))
            .context("Failed to create detection input tensor")?;

        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => input])
            .context("Detection inference failed")?;

        let output = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract detection output")?;

        // [1, 1, H, W] or [1, H, W]
        let shape = output.shape();
        if shape.len() < 2 {
            anyhow::bail!("Unexpected detection output shape: {:?}", shape);
        }
        let (map_h, map_w) = (shape[shape.len() - 2], shape[shape.len() - 1]);
        let map = Array2::from_shape_vec((map_h, map_w), output.iter().copied().collect())
            .context("Detection output is not a single probability map")?;

        let sx = src_w as f32 / map_w as f32;
        let sy = src_h as f32 / map_h as f32;
        let boxes = boxes_from_probability_map(map.view(), &self.params)
            .into_iter()
            .map(|b| b.scaled(sx, sy))
            .collect();

        Ok(sort_reading_order(boxes))
    }
}

/// Detector input size: longer side capped, both sides rounded to the stride
pub fn detection_size(width: u32, height: u32) -> (u32, u32) {
    let longer = width.max(height) as f32;
    let scale = if longer > MAX_SIDE_LEN as f32 {
        MAX_SIDE_LEN as f32 / longer
    } else {
        1.0
    };

    let round = |side: u32| {
        let scaled = (side as f32 * scale).round() as u32;
        (((scaled + STRIDE / 2) / STRIDE) * STRIDE).max(STRIDE)
    };

    (round(width), round(height))
}

/// Group above-threshold pixels into boxes (map coordinates, unsorted)
pub fn boxes_from_probability_map(map: ArrayView2<f32>, params: &DetectionParams) -> Vec<TextBox> {
    let (height, width) = map.dim();
    let mut visited = vec![false; height * width];
    let mut boxes = Vec::new();
    let mut stack = Vec::new();

    for start_y in 0..height {
        for start_x in 0..width {
            let start = start_y * width + start_x;
            if visited[start] || map[[start_y, start_x]] <= params.threshold {
                continue;
            }

            let (mut min_x, mut max_x, mut min_y, mut max_y) = (start_x, start_x, start_y, start_y);
            let mut sum = 0.0f32;
            let mut count = 0usize;

            visited[start] = true;
            stack.push((start_x, start_y));

            while let Some((x, y)) = stack.pop() {
                sum += map[[y, x]];
                count += 1;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);

                let neighbors = [
                    (x.wrapping_sub(1), y),
                    (x + 1, y),
                    (x, y.wrapping_sub(1)),
                    (x, y + 1),
                ];
                for (nx, ny) in neighbors {
                    if nx >= width || ny >= height {
                        continue;
                    }
                    let idx = ny * width + nx;
                    if !visited[idx] && map[[ny, nx]] > params.threshold {
                        visited[idx] = true;
                        stack.push((nx, ny));
                    }
                }
            }

            let box_w = (max_x - min_x + 1) as f32;
            let box_h = (max_y - min_y + 1) as f32;
            if box_w.min(box_h) < params.min_size as f32 {
                continue;
            }

            let score = sum / count as f32;
            if score < params.box_threshold {
                continue;
            }

            // DB unclip: offset = area * ratio / perimeter
            let offset = box_w * box_h * params.unclip_ratio / (2.0 * (box_w + box_h));
            boxes.push(TextBox {
                x0: (min_x as f32 - offset).max(0.0),
                y0: (min_y as f32 - offset).max(0.0),
                x1: ((max_x + 1) as f32 + offset).min(width as f32),
                y1: ((max_y + 1) as f32 + offset).min(height as f32),
                score,
            });
        }
    }

    boxes
}

/// Top-to-bottom, then left-to-right within a row
pub fn sort_reading_order(mut boxes: Vec<TextBox>) -> Vec<TextBox> {
    boxes.sort_by(|a, b| a.y0.total_cmp(&b.y0).then(a.x0.total_cmp(&b.x0)));

    for i in 0..boxes.len().saturating_sub(1) {
        for j in (0..=i).rev() {
            let same_row = (boxes[j + 1].y0 - boxes[j].y0).abs() < ROW_TOLERANCE;
            if same_row && boxes[j + 1].x0 < boxes[j].x0 {
                boxes.swap(j, j + 1);
            } else {
                break;
            }
        }
    }

    boxes
}
