// SPDX-License-Identifier: MIT
//! # tile-scale: Saliency-Guided Multi-Scale Tiling
//!
//! This crate decomposes a large image into uniform square patches for downstream model
//! input. Windows are walked over the source at several scales, each window is scored for
//! information density, and every window is resized to one common output side.
//!
//! ## Key Components
//!
//! - [`image`]: immutable gray/RGB pixel buffers and borrowed windows
//! - [`saliency`]: edge-density + uniform-LBP entropy scoring, optionally memoized
//! - [`planner`]: per-scale fixed-stride grid walk producing scored [`planner::GridCell`]s
//! - [`cpu`]: crop + resize on the CPU using fast_image_resize
//!
//! Everything here is synchronous and free of I/O. Decoding and persistence live in the
//! `salient_tiles` driver crate.
//!
//! ## Usage Example
//!
//! ```rust
//! use tile_scale::cpu::PatchExtractor;
//! use tile_scale::image::Image;
//! use tile_scale::planner::{plan, PlanCfg};
//!
//! let image = Image::filled_gray(1000, 1000, 128);
//! let cells = plan(&image, &[2560, 1280, 640], PlanCfg::default()).unwrap();
//! assert_eq!(cells.len(), 1);
//!
//! let mut extractor = PatchExtractor::default();
//! let pixels = extractor.extract(&image, cells[0].rect(), 320).unwrap();
//! assert_eq!(pixels.len(), 320 * 320);
//! ```

pub mod cpu;
pub mod error;
pub mod image;
pub mod planner;
pub mod saliency;

pub use cpu::{PatchExtractor, Resample};
pub use error::ScaleError;
pub use image::{Channels, Image, PatchView, Rect};
pub use planner::{GridCell, PlanCfg, StrideMode, WindowPlanner};
pub use saliency::{CachedScorer, SaliencyScorer, SaliencyWeights};
