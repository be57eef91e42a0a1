use crate::error::AppError;

pub mod mock;

/// One captured frame, packed RGB.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Frame {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize) * 3],
        }
    }
}

/// Source of frames for the detection loop. A failure is fatal to that cycle
/// only; the next cycle retries naturally.
pub trait FrameSource {
    fn capture_frame(&mut self) -> Result<Frame, AppError>;
}

/// Stand-in source that produces blank frames when no real capture backend is
/// configured. Useful together with the replay detector, which ignores frame
/// content entirely.
#[derive(Debug)]
pub struct StubFrameSource {
    width: u32,
    height: u32,
}

impl StubFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for StubFrameSource {
    fn default() -> Self {
        Self::new(1920, 1080)
    }
}

impl FrameSource for StubFrameSource {
    fn capture_frame(&mut self) -> Result<Frame, AppError> {
        Ok(Frame::blank(self.width, self.height))
    }
}
