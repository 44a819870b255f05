//! # Configuration
//!
//! One explicit, validated configuration structure per run. The CLI, JSON config files and
//! library callers all build a [`TilingConfig`]; [`TilingConfig::validate`] runs before any
//! image is touched.
//!
//! ## Options
//!
//! | Option | Type | Default | Constraint |
//! |--------|------|---------|------------|
//! | `window_sizes` | `Vec<u32>` | `[2560, 1280, 640]` | non-empty, all > 0; processed in order |
//! | `output_size` | `u32` | `640` | > 0 |
//! | `saliency_threshold_low` | `f64` | `0.25` | in [0, 1] |
//! | `saliency_threshold_high` | `f64` | `0.6` | in [0, 1], > low |
//! | `overlap_ratio` | `f64` | `0.75` | in (0, 1]; fraction of the window advanced per step |
//! | `stride_mode` | `fixed`/`adaptive` | `fixed` | |
//! | `saliency_weights` | object | `{0.6, 0.4, 4.0}` | weights ≥ 0, `texture_norm` > 0 |
//! | `resample` | filter | `lanczos3` | |
//! | `output_format` | extension | `jpg` | jpg, jpeg, png, bmp, tif, tiff or webp |
//! | `write_manifest` | `bool` | `false` | |
//! | `jobs` | `usize` | rayon default | > 0 |
//! | `max_decode_pixels` | `u64` | `2^30` | > 0; larger sources fail to decode |
//!
//! ## Examples
//!
//! ```rust
//! use salient_tiles::config::TilingConfig;
//!
//! let config = TilingConfig::default();
//! assert!(config.validate().is_ok());
//!
//! let config = TilingConfig::new(vec![640], 320, 0.3, 0.2);
//! assert!(config.validate().is_err());
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tile_scale::{PlanCfg, Resample, SaliencyWeights, StrideMode};

use crate::error::{TileError, TileResult};
use crate::io;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// Window sides in source pixels, one per scale, processed in this order.
    pub window_sizes: Vec<u32>,

    /// Side of every emitted patch.
    pub output_size: u32,

    /// Cells scoring below this get the sparse stride factor.
    pub saliency_threshold_low: f64,

    /// Cells scoring above this get the dense stride factor.
    pub saliency_threshold_high: f64,

    /// Fraction of the window advanced per grid step (0.75 = 25% overlap).
    pub overlap_ratio: f64,

    /// Whether stride factors feed back into the grid walk.
    pub stride_mode: StrideMode,

    pub saliency_weights: SaliencyWeights,

    pub resample: Resample,

    /// File extension (and encoder) for persisted patches.
    pub output_format: String,

    /// Write a `{base}_patches.json` manifest next to persisted patches.
    pub write_manifest: bool,

    /// Worker threads for directory mode. `None` uses the rayon default.
    pub jobs: Option<usize>,

    /// Decode budget in pixels. Decoder allocations are capped at 8 bytes per budgeted
    /// pixel, so the default admits any 8-bit source up to 2^30 pixels.
    pub max_decode_pixels: u64,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self {
            window_sizes: vec![2560, 1280, 640],
            output_size: 640,
            saliency_threshold_low: 0.25,
            saliency_threshold_high: 0.6,
            overlap_ratio: 0.75,
            stride_mode: StrideMode::Fixed,
            saliency_weights: SaliencyWeights::default(),
            resample: Resample::default(),
            output_format: "jpg".to_string(),
            write_manifest: false,
            jobs: None,
            max_decode_pixels: io::DEFAULT_MAX_DECODE_PIXELS,
        }
    }
}

impl TilingConfig {
    /// Defaults with the four core options replaced.
    pub fn new(
        window_sizes: Vec<u32>,
        output_size: u32,
        saliency_threshold_low: f64,
        saliency_threshold_high: f64,
    ) -> Self {
        Self {
            window_sizes,
            output_size,
            saliency_threshold_low,
            saliency_threshold_high,
            ..Self::default()
        }
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json_str(json: &str) -> TileResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| TileError::config("config", "<json>", e.to_string()))
    }

    /// Load a JSON config file. Does not validate.
    pub fn from_json_file(path: &Path) -> TileResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TileError::config("config", path.display().to_string(), e.to_string())
        })?;
        Self::from_json_str(&text).map_err(|e| e.with_context(path.display().to_string()))
    }

    /// Validates every option. Performs no I/O.
    pub fn validate(&self) -> TileResult<()> {
        if self.window_sizes.is_empty() {
            return Err(TileError::config("window_sizes", "[]", "at least one window size is required"));
        }
        if let Some(w) = self.window_sizes.iter().find(|&&w| w == 0) {
            return Err(TileError::config("window_sizes", w.to_string(), "window sizes must be positive"));
        }
        if self.output_size == 0 {
            return Err(TileError::config("output_size", "0", "output size must be positive"));
        }
        for (field, v) in [
            ("saliency_threshold_low", self.saliency_threshold_low),
            ("saliency_threshold_high", self.saliency_threshold_high),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(TileError::config(field, v.to_string(), "must be within [0, 1]"));
            }
        }
        if self.saliency_threshold_high <= self.saliency_threshold_low {
            return Err(TileError::config(
                "saliency_threshold_high",
                self.saliency_threshold_high.to_string(),
                format!(
                    "must be strictly greater than saliency_threshold_low ({})",
                    self.saliency_threshold_low
                ),
            ));
        }
        if !(self.overlap_ratio > 0.0 && self.overlap_ratio <= 1.0) {
            return Err(TileError::config(
                "overlap_ratio",
                self.overlap_ratio.to_string(),
                "must be within (0, 1]",
            ));
        }
        let w = &self.saliency_weights;
        for (field, v) in [
            ("saliency_weights.edge_weight", w.edge_weight),
            ("saliency_weights.texture_weight", w.texture_weight),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(TileError::config(field, v.to_string(), "must be a finite non-negative number"));
            }
        }
        if !(w.texture_norm.is_finite() && w.texture_norm > 0.0) {
            return Err(TileError::config(
                "saliency_weights.texture_norm",
                w.texture_norm.to_string(),
                "must be a finite positive number",
            ));
        }
        if !io::is_patch_format(&self.output_format) {
            return Err(TileError::config(
                "output_format",
                self.output_format.clone(),
                format!("not a patch format (use one of {})", io::PATCH_FORMATS.join(", ")),
            ));
        }
        if self.jobs == Some(0) {
            return Err(TileError::config("jobs", "0", "worker count must be positive"));
        }
        if self.max_decode_pixels == 0 {
            return Err(TileError::config("max_decode_pixels", "0", "pixel budget must be positive"));
        }
        Ok(())
    }

    /// Planner parameters derived from this config.
    pub fn plan_cfg(&self) -> PlanCfg {
        PlanCfg {
            overlap_ratio: self.overlap_ratio,
            threshold_low: self.saliency_threshold_low,
            threshold_high: self.saliency_threshold_high,
            stride_mode: self.stride_mode,
            weights: self.saliency_weights,
        }
    }
}
