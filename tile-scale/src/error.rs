// SPDX-License-Identifier: MIT
// Error type shared by the scorer, planner and CPU extractor.

use fast_image_resize as fir;

use crate::image::Rect;

#[derive(Debug)]
pub enum ScaleError {
    /// Zero-area patch handed to the scorer.
    InvalidPatch { width: u32, height: u32 },
    /// Crop rectangle leaves the source canvas.
    OutOfBounds { rect: Rect, width: u32, height: u32 },
    /// Raw buffer length does not match `width * height * channels`.
    BadBuffer { expected: usize, actual: usize },
    Fir(fir::ResizeError),
    ImageBuf(fir::ImageBufferError),
}

impl From<fir::ResizeError> for ScaleError { fn from(e: fir::ResizeError) -> Self { Self::Fir(e) } }
impl From<fir::ImageBufferError> for ScaleError { fn from(e: fir::ImageBufferError) -> Self { Self::ImageBuf(e) } }

impl std::fmt::Display for ScaleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScaleError::InvalidPatch { width, height } => {
                write!(f, "Invalid patch: zero area ({}x{})", width, height)
            }
            ScaleError::OutOfBounds { rect, width, height } => write!(
                f,
                "Crop {}x{}+{}+{} exceeds image bounds {}x{}",
                rect.w, rect.h, rect.x, rect.y, width, height
            ),
            ScaleError::BadBuffer { expected, actual } => {
                write!(f, "Pixel buffer has {} bytes, expected {}", actual, expected)
            }
            ScaleError::Fir(e) => write!(f, "Fast image resize error: {}", e),
            ScaleError::ImageBuf(e) => write!(f, "Image buffer error: {}", e),
        }
    }
}

impl std::error::Error for ScaleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScaleError::Fir(e) => Some(e),
            ScaleError::ImageBuf(e) => Some(e),
            _ => None,
        }
    }
}
