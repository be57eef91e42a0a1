use crate::capture::Frame;
use crate::error::AppError;
use crate::geometry::Rect;
use std::path::Path;
use thiserror::Error;

pub mod mock;
pub mod replay;

/// One detected object instance. Consumed within a single cycle and never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub rect: Rect,
    pub class_id: u32,
    pub confidence: f32,
}

/// Black-box object detector. Accuracy, model format and inference runtime
/// are a collaborator concern; a failure is fatal to that cycle only.
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, AppError>;
}

/// Detector that never reports anything. Stands in when no backend is
/// configured so the rest of the pipeline still runs.
#[derive(Debug, Default)]
pub struct NullDetector;

impl Detector for NullDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, AppError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Error)]
pub enum DetectorInitError {
    #[error("failed to read replay file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse replay file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid detector config: {0}")]
    Invalid(String),
}

/// Build a detector backend from its config name.
pub fn create_detector(
    source: &str,
    replay_path: Option<&Path>,
) -> Result<Box<dyn Detector + Send>, DetectorInitError> {
    match source {
        "stub" => Ok(Box::new(NullDetector)),
        "replay" => {
            let path = replay_path.ok_or_else(|| {
                DetectorInitError::Invalid("replay source requires replay_path".to_string())
            })?;
            Ok(Box::new(replay::ReplayDetector::load(path)?))
        }
        other => Err(DetectorInitError::Invalid(format!(
            "unknown detector source: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_detector_reports_nothing() -> Result<(), AppError> {
        let mut detector = NullDetector;
        let detections = detector.detect(&Frame::blank(8, 8))?;
        assert!(detections.is_empty());
        Ok(())
    }

    #[test]
    fn unknown_source_is_rejected() {
        let result = create_detector("onnx", None);
        assert!(matches!(result, Err(DetectorInitError::Invalid(_))));
    }

    #[test]
    fn replay_source_requires_path() {
        let result = create_detector("replay", None);
        assert!(matches!(result, Err(DetectorInitError::Invalid(_))));
    }
}
