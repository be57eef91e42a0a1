use crate::capture::Frame;
use crate::detect::{Detection, Detector};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub enum MockDetectionStep {
    Detections(Vec<Detection>),
    Fail,
}

/// Scripted detector for tests: plays back one step per cycle and reports
/// nothing once the script is exhausted.
pub struct MockDetector {
    steps: Vec<MockDetectionStep>,
    next_index: usize,
}

impl MockDetector {
    pub fn with_steps(steps: Vec<MockDetectionStep>) -> Self {
        Self {
            steps,
            next_index: 0,
        }
    }

    pub fn never_detects() -> Self {
        Self::with_steps(Vec::new())
    }

    fn next_step(&mut self) -> MockDetectionStep {
        let step = self
            .steps
            .get(self.next_index)
            .cloned()
            .unwrap_or(MockDetectionStep::Detections(Vec::new()));
        self.next_index += 1;
        step
    }
}

impl Detector for MockDetector {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, AppError> {
        match self.next_step() {
            MockDetectionStep::Detections(detections) => Ok(detections),
            MockDetectionStep::Fail => {
                Err(AppError::Detection("mock detection failed".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    #[test]
    fn steps_play_back_in_order() -> Result<(), AppError> {
        let detection = Detection {
            rect: Rect::new(0, 0, 10, 10),
            class_id: 1,
            confidence: 0.8,
        };
        let mut detector = MockDetector::with_steps(vec![
            MockDetectionStep::Detections(vec![detection]),
            MockDetectionStep::Fail,
        ]);
        let frame = Frame::blank(8, 8);

        assert_eq!(detector.detect(&frame)?.len(), 1);
        assert!(detector.detect(&frame).is_err());
        assert!(detector.detect(&frame)?.is_empty());
        Ok(())
    }
}
