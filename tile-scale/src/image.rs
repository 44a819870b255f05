// SPDX-License-Identifier: MIT
//! # Source Image Buffers
//!
//! Tightly packed 8-bit pixel buffers with one (gray) or three (RGB) channels,
//! plus the rectangle and borrowed-window types the planner and extractor pass around.
//!
//! An [`Image`] is immutable once constructed. Windows into it are expressed as
//! [`PatchView`]s, which borrow the parent buffer instead of copying pixels.

use serde::{Deserialize, Serialize};

use crate::error::ScaleError;

/// Pixel layout of an [`Image`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channels {
    /// Single 8-bit luminance channel
    Gray,
    /// Interleaved 8-bit R, G, B
    Rgb,
}

impl Channels {
    /// Bytes per pixel for this layout.
    #[inline]
    pub fn count(self) -> usize {
        match self {
            Channels::Gray => 1,
            Channels::Rgb => 3,
        }
    }
}

/// Rect in source pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rect {
    /// Square rect of side `size` with its origin at (`x`, `y`).
    pub fn square(x: u32, y: u32, size: u32) -> Self {
        Self { x, y, w: size, h: size }
    }

    #[inline]
    pub fn area(&self) -> u64 {
        u64::from(self.w) * u64::from(self.h)
    }

    /// True when the rect lies entirely inside a `width × height` canvas.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        u64::from(self.x) + u64::from(self.w) <= u64::from(width)
            && u64::from(self.y) + u64::from(self.h) <= u64::from(height)
    }
}

/// Owned, tightly packed 8-bit image.
#[derive(Clone, Debug)]
pub struct Image {
    width: u32,
    height: u32,
    channels: Channels,
    data: Vec<u8>,
}

impl Image {
    /// Wrap a raw buffer. Fails when `data.len() != width * height * channels`.
    pub fn new(width: u32, height: u32, channels: Channels, data: Vec<u8>) -> Result<Self, ScaleError> {
        let need = (width as usize) * (height as usize) * channels.count();
        if data.len() != need {
            return Err(ScaleError::BadBuffer { expected: need, actual: data.len() });
        }
        Ok(Self { width, height, channels, data })
    }

    /// Single-channel image filled with `value`.
    pub fn filled_gray(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            channels: Channels::Gray,
            data: vec![value; (width as usize) * (height as usize)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> Channels {
        self.channels
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Bytes per row.
    #[inline]
    pub fn pitch(&self) -> usize {
        (self.width as usize) * self.channels.count()
    }

    /// Borrow a window of this image. Fails with `OutOfBounds` if `rect` leaves the canvas.
    pub fn view(&self, rect: Rect) -> Result<PatchView<'_>, ScaleError> {
        if !rect.fits_within(self.width, self.height) {
            return Err(ScaleError::OutOfBounds {
                rect,
                width: self.width,
                height: self.height,
            });
        }
        Ok(PatchView { image: self, rect })
    }

    /// Borrow the whole image as a single window.
    pub fn full_view(&self) -> PatchView<'_> {
        PatchView {
            image: self,
            rect: Rect { x: 0, y: 0, w: self.width, h: self.height },
        }
    }
}

/// Borrowed rectangular window into an [`Image`]. Always inside the parent's bounds.
#[derive(Clone, Copy, Debug)]
pub struct PatchView<'a> {
    image: &'a Image,
    rect: Rect,
}

impl<'a> PatchView<'a> {
    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn width(&self) -> u32 {
        self.rect.w
    }

    pub fn height(&self) -> u32 {
        self.rect.h
    }

    pub fn channels(&self) -> Channels {
        self.image.channels
    }

    pub fn is_empty(&self) -> bool {
        self.rect.area() == 0
    }

    /// Pixel bytes of row `r` (relative to the window).
    #[inline]
    pub fn row(&self, r: u32) -> &'a [u8] {
        let cn = self.image.channels.count();
        let off = (self.rect.y + r) as usize * self.image.pitch() + self.rect.x as usize * cn;
        &self.image.data[off..off + self.rect.w as usize * cn]
    }

    /// Copy the window into `dst` as tightly packed rows, resizing `dst` to fit.
    pub fn copy_into(&self, dst: &mut Vec<u8>) {
        let row_bytes = self.rect.w as usize * self.image.channels.count();
        dst.clear();
        dst.reserve(row_bytes * self.rect.h as usize);
        for r in 0..self.rect.h {
            dst.extend_from_slice(self.row(r));
        }
    }

    /// 8-bit luminance of the window, row-major.
    ///
    /// RGB uses the fixed-point BT.601 weights `(4899 R + 9617 G + 1868 B + 8192) >> 14`.
    pub fn to_luma(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.rect.area() as usize);
        for r in 0..self.rect.h {
            let row = self.row(r);
            match self.image.channels {
                Channels::Gray => out.extend_from_slice(row),
                Channels::Rgb => out.extend(row.chunks_exact(3).map(|px| {
                    let y = 4899 * u32::from(px[0]) + 9617 * u32::from(px[1]) + 1868 * u32::from(px[2]) + 8192;
                    (y >> 14) as u8
                })),
            }
        }
        out
    }
}
