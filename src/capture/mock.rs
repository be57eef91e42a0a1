use crate::capture::{Frame, FrameSource};
use crate::error::AppError;

#[derive(Debug, Clone)]
pub enum MockCaptureStep {
    Frame(Frame),
    Fail,
}

/// Scripted frame source for tests: plays back one step per cycle and keeps
/// returning blank frames once the script is exhausted.
pub struct MockFrameSource {
    steps: Vec<MockCaptureStep>,
    next_index: usize,
}

impl MockFrameSource {
    pub fn with_steps(steps: Vec<MockCaptureStep>) -> Self {
        Self {
            steps,
            next_index: 0,
        }
    }

    pub fn always_ok() -> Self {
        Self::with_steps(Vec::new())
    }

    fn next_step(&mut self) -> MockCaptureStep {
        let step = self
            .steps
            .get(self.next_index)
            .cloned()
            .unwrap_or(MockCaptureStep::Frame(Frame::blank(64, 64)));
        self.next_index += 1;
        step
    }
}

impl FrameSource for MockFrameSource {
    fn capture_frame(&mut self) -> Result<Frame, AppError> {
        match self.next_step() {
            MockCaptureStep::Frame(frame) => Ok(frame),
            MockCaptureStep::Fail => Err(AppError::Capture("mock capture failed".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_failure_then_exhaustion_falls_back_to_blank() {
        let mut source = MockFrameSource::with_steps(vec![MockCaptureStep::Fail]);

        let err = source.capture_frame().unwrap_err();
        assert_eq!(err.to_string(), "capture error: mock capture failed");

        let frame = source.capture_frame().expect("fallback frame");
        assert_eq!(frame.width, 64);
    }
}
