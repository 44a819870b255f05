// SPDX-License-Identifier: MIT
// CPU patch extractor built on fast_image_resize (SIMD-accelerated).
// Gray8/RGB8 in → square Gray8/RGB8 out, same channel layout as the source.

use std::str::FromStr;

use fast_image_resize as fir;
use fir::images::{Image as FirImage, ImageRef};
use fir::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use serde::{Deserialize, Serialize};

use crate::error::ScaleError;
use crate::image::{Channels, Image, Rect};

/// Convolution filter used when resizing a window to the output side.
///
/// Every option averages over the source footprint, so large windows are
/// downscaled without aliasing. Nearest-neighbour is deliberately absent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resample {
    /// Box filter (area averaging)
    Box,
    Bilinear,
    CatmullRom,
    #[default]
    Lanczos3,
}

impl Resample {
    fn alg(self) -> ResizeAlg {
        let filter = match self {
            Resample::Box => FilterType::Box,
            Resample::Bilinear => FilterType::Bilinear,
            Resample::CatmullRom => FilterType::CatmullRom,
            Resample::Lanczos3 => FilterType::Lanczos3,
        };
        ResizeAlg::Convolution(filter)
    }
}

impl FromStr for Resample {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "box" | "area" => Ok(Resample::Box),
            "bilinear" => Ok(Resample::Bilinear),
            "catmull-rom" | "catmullrom" | "bicubic" => Ok(Resample::CatmullRom),
            "lanczos3" | "lanczos" => Ok(Resample::Lanczos3),
            _ => Err(format!(
                "Invalid resample filter: {}. Use: box, bilinear, catmull-rom, lanczos3",
                s
            )),
        }
    }
}

fn pixel_type(channels: Channels) -> PixelType {
    match channels {
        Channels::Gray => PixelType::U8,
        Channels::Rgb => PixelType::U8x3,
    }
}

/// Pre-allocated scratch holding the tightly packed crop of the current window.
pub struct Staging {
    pub(crate) buf: Vec<u8>,
}
impl Staging {
    pub fn with_capacity(cap: usize) -> Self { Self { buf: Vec::with_capacity(cap) } }
    pub fn as_slice(&self) -> &[u8] { &self.buf }
}

/// Crops windows and resizes them to a uniform square.
///
/// Holds a reusable resizer and staging buffer, so one extractor should serve a whole
/// image run. Not shared across threads; each worker builds its own.
pub struct PatchExtractor {
    resizer: Resizer,
    staging: Staging,
    resample: Resample,
}

impl Default for PatchExtractor {
    fn default() -> Self {
        Self::new(Resample::default())
    }
}

impl PatchExtractor {
    pub fn new(resample: Resample) -> Self {
        Self {
            resizer: Resizer::new(),
            staging: Staging::with_capacity(0),
            resample,
        }
    }

    pub fn resample(&self) -> Resample {
        self.resample
    }

    /// Crop `rect` and resize it to `output_side × output_side`.
    ///
    /// Returns tightly packed pixels with the source's channel layout.
    /// Fails with `OutOfBounds` if `rect` leaves the image.
    pub fn extract(&mut self, image: &Image, rect: Rect, output_side: u32) -> Result<Vec<u8>, ScaleError> {
        let view = image.view(rect)?;
        if view.is_empty() {
            return Err(ScaleError::InvalidPatch { width: rect.w, height: rect.h });
        }
        view.copy_into(&mut self.staging.buf);

        let pt = pixel_type(image.channels());
        let src = ImageRef::new(rect.w, rect.h, self.staging.as_slice(), pt)?;
        let mut dst = FirImage::new(output_side, output_side, pt);

        let opts = ResizeOptions::new().resize_alg(self.resample.alg());
        self.resizer.resize(&src, &mut dst, &opts)?;

        Ok(dst.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_fill(w: u32, h: u32, px: [u8; 3]) -> Image {
        let data = (0..w * h).flat_map(|_| px).collect();
        Image::new(w, h, Channels::Rgb, data).unwrap()
    }

    #[test]
    fn output_is_square_at_requested_side() {
        let img = Image::filled_gray(120, 90, 40);
        let mut ex = PatchExtractor::default();
        let out = ex.extract(&img, Rect::square(10, 5, 80), 32).unwrap();
        assert_eq!(out.len(), 32 * 32);
    }

    #[test]
    fn channel_layout_is_preserved() {
        let img = rgb_fill(64, 64, [200, 100, 50]);
        let mut ex = PatchExtractor::new(Resample::Box);
        let out = ex.extract(&img, Rect::square(0, 0, 64), 16).unwrap();
        assert_eq!(out.len(), 16 * 16 * 3);
        for px in out.chunks_exact(3) {
            for (got, want) in px.iter().zip([200u8, 100, 50]) {
                assert!(got.abs_diff(want) <= 1, "{got} vs {want}");
            }
        }
    }

    #[test]
    fn crop_selects_the_requested_window() {
        // Left half 0, right half 255; cropping the right half yields only 255.
        let data = (0..64 * 32).map(|i| if i % 64 >= 32 { 255 } else { 0 }).collect();
        let img = Image::new(64, 32, Channels::Gray, data).unwrap();
        let mut ex = PatchExtractor::new(Resample::Box);
        let out = ex.extract(&img, Rect::square(32, 0, 32), 8).unwrap();
        assert!(out.iter().all(|&v| v >= 254));
    }

    #[test]
    fn upscales_small_windows() {
        let img = Image::filled_gray(16, 16, 77);
        let mut ex = PatchExtractor::default();
        let out = ex.extract(&img, Rect::square(0, 0, 16), 64).unwrap();
        assert_eq!(out.len(), 64 * 64);
        assert!(out.iter().all(|&v| v.abs_diff(77) <= 1));
    }

    #[test]
    fn out_of_bounds_crop_is_rejected() {
        let img = Image::filled_gray(50, 50, 0);
        let mut ex = PatchExtractor::default();
        let err = ex.extract(&img, Rect::square(20, 20, 40), 16).unwrap_err();
        assert!(matches!(err, ScaleError::OutOfBounds { width: 50, height: 50, .. }));
    }

    #[test]
    fn resample_parses() {
        assert_eq!("area".parse::<Resample>(), Ok(Resample::Box));
        assert_eq!("Lanczos3".parse::<Resample>(), Ok(Resample::Lanczos3));
        assert!("nearest".parse::<Resample>().is_err());
    }
}
