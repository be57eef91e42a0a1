//! Detector backend that replays recorded detection lists from a JSON file,
//! one list per cycle, wrapping around at the end.
//!
//! File format: an array of cycles, each an array of detections:
//! `[[{"box": [x1, y1, x2, y2], "class_id": 0, "confidence": 0.92}, ...], ...]`

use crate::capture::Frame;
use crate::detect::{Detection, Detector, DetectorInitError};
use crate::error::AppError;
use crate::geometry::Rect;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ReplayDetection {
    #[serde(rename = "box")]
    rect: [i32; 4],
    class_id: u32,
    confidence: f32,
}

#[derive(Debug)]
pub struct ReplayDetector {
    cycles: Vec<Vec<Detection>>,
    cursor: usize,
}

impl ReplayDetector {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DetectorInitError> {
        let contents = std::fs::read_to_string(path)?;
        let raw: Vec<Vec<ReplayDetection>> = serde_json::from_str(&contents)?;
        let cycles = raw
            .into_iter()
            .map(|cycle| {
                cycle
                    .into_iter()
                    .map(|entry| Detection {
                        rect: Rect::from_corners(entry.rect),
                        class_id: entry.class_id,
                        confidence: entry.confidence,
                    })
                    .collect()
            })
            .collect();
        Ok(Self::from_cycles(cycles))
    }

    pub fn from_cycles(cycles: Vec<Vec<Detection>>) -> Self {
        Self { cycles, cursor: 0 }
    }
}

impl Detector for ReplayDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, AppError> {
        if self.cycles.is_empty() {
            return Ok(Vec::new());
        }
        let detections = self.cycles[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.cycles.len();
        Ok(detections)
    }
}
