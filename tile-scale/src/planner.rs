// SPDX-License-Identifier: MIT
//! # Multi-Scale Window Planning
//!
//! Walks a square window over the source image once per configured scale and records
//! every visited position as a [`GridCell`] annotated with its saliency.
//!
//! ## Grid Walk
//!
//! For a window of side `w`:
//! - the scale is skipped (no cells, no error) when `w > min(width, height)`;
//! - `stride = max(1, round(w × overlap_ratio))`. The ratio is the fraction of the window
//!   advanced per step, so the default 0.75 leaves a 25% overlap;
//! - `y` visits `0, stride, 2·stride, …` while `y ≤ height − w`, and `x` likewise, row-major;
//! - a trailing strip narrower than a full step is dropped, never padded.
//!
//! Scales are emitted in list order, so the output is scale-major then row-major.
//!
//! ## Stride Factor
//!
//! Each cell also gets a stride factor derived from its saliency (0.9 below the low
//! threshold, 0.5 above the high threshold, 0.75 in between). Under
//! [`StrideMode::Fixed`] the factor is metadata only and every step uses the fixed
//! stride. [`StrideMode::Adaptive`] feeds it back: the factor of the current cell sets the
//! next horizontal step, and the smallest factor of a finished row sets the next
//! vertical step. That changes how many cells a scale yields.

use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ScaleError;
use crate::image::{Image, Rect};
use crate::saliency::{CachedScorer, SaliencyScorer, SaliencyWeights};

/// Stride factor for cells below the low saliency threshold.
pub const SPARSE_FACTOR: f64 = 0.9;
/// Stride factor for cells between the thresholds.
pub const MEDIUM_FACTOR: f64 = 0.75;
/// Stride factor for cells above the high saliency threshold.
pub const DENSE_FACTOR: f64 = 0.5;

/// Whether per-cell stride factors influence the grid walk.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrideMode {
    /// Fixed stride per scale; factors are descriptive only.
    #[default]
    Fixed,
    /// Each cell's factor sets the next step.
    Adaptive,
}

impl FromStr for StrideMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(StrideMode::Fixed),
            "adaptive" => Ok(StrideMode::Adaptive),
            _ => Err(format!("Invalid stride mode: {}. Use: fixed, adaptive", s)),
        }
    }
}

/// Planning parameters for one run.
#[derive(Clone, Copy, Debug)]
pub struct PlanCfg {
    /// Fraction of the window advanced per step (0.75 = 25% overlap)
    pub overlap_ratio: f64,
    pub threshold_low: f64,
    pub threshold_high: f64,
    pub stride_mode: StrideMode,
    pub weights: SaliencyWeights,
}

impl Default for PlanCfg {
    fn default() -> Self {
        Self {
            overlap_ratio: 0.75,
            threshold_low: 0.25,
            threshold_high: 0.6,
            stride_mode: StrideMode::Fixed,
            weights: SaliencyWeights::default(),
        }
    }
}

/// One window position at one scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct GridCell {
    pub x: u32,
    pub y: u32,
    /// Window side in source pixels
    pub size: u32,
    /// Position of this cell's scale in the configured list
    pub scale_index: usize,
    pub saliency: f64,
    pub stride_factor: f64,
}

impl GridCell {
    pub fn rect(&self) -> Rect {
        Rect::square(self.x, self.y, self.size)
    }
}

/// `max(1, round(window × overlap_ratio))`, ties to even.
pub fn base_stride(window: u32, overlap_ratio: f64) -> u32 {
    ((f64::from(window) * overlap_ratio).round_ties_even() as u32).max(1)
}

/// Map a saliency score onto its stride factor.
pub fn stride_factor(score: f64, threshold_low: f64, threshold_high: f64) -> f64 {
    if score < threshold_low {
        SPARSE_FACTOR
    } else if score > threshold_high {
        DENSE_FACTOR
    } else {
        MEDIUM_FACTOR
    }
}

/// Window origins along one axis: `0, stride, …` while `≤ extent − window`.
/// Empty when the window does not fit.
pub fn grid_origins(extent: u32, window: u32, stride: u32) -> impl Iterator<Item = u32> {
    let last = extent.checked_sub(window);
    last.into_iter()
        .flat_map(move |last| (0..=last).step_by(stride.max(1) as usize))
}

/// Stateful planner for one image run; owns the score memo table.
pub struct WindowPlanner {
    cfg: PlanCfg,
    scorer: CachedScorer,
}

impl WindowPlanner {
    pub fn new(cfg: PlanCfg) -> Self {
        Self {
            cfg,
            scorer: CachedScorer::new(SaliencyScorer::new(cfg.weights)),
        }
    }

    pub fn cfg(&self) -> &PlanCfg {
        &self.cfg
    }

    /// Scores answered from the memo table so far.
    pub fn cache_hits(&self) -> usize {
        self.scorer.hits()
    }

    /// Plan every scale in list order.
    pub fn plan(&mut self, image: &Image, scales: &[u32]) -> Result<Vec<GridCell>, ScaleError> {
        let mut cells = Vec::new();
        for (scale_index, &window) in scales.iter().enumerate() {
            let before = cells.len();
            self.plan_scale(image, scale_index, window, &mut cells)?;
            debug!(
                "scale {} (window {}px): {} cells",
                scale_index,
                window,
                cells.len() - before
            );
        }
        Ok(cells)
    }

    /// Append the cells of one scale to `out`.
    pub fn plan_scale(
        &mut self,
        image: &Image,
        scale_index: usize,
        window: u32,
        out: &mut Vec<GridCell>,
    ) -> Result<(), ScaleError> {
        let (w, h) = (image.width(), image.height());
        if window > w.min(h) {
            debug!("skipping window {}px: larger than {}x{} source", window, w, h);
            return Ok(());
        }
        match self.cfg.stride_mode {
            StrideMode::Fixed => {
                let stride = base_stride(window, self.cfg.overlap_ratio);
                let xs: Vec<u32> = grid_origins(w, window, stride).collect();
                for y in grid_origins(h, window, stride) {
                    for &x in &xs {
                        let cell = self.cell(image, scale_index, x, y, window)?;
                        out.push(cell);
                    }
                }
            }
            StrideMode::Adaptive => {
                let (max_x, max_y) = (w - window, h - window);
                let mut y = 0u32;
                loop {
                    let mut x = 0u32;
                    let mut row_factor = SPARSE_FACTOR;
                    loop {
                        let cell = self.cell(image, scale_index, x, y, window)?;
                        row_factor = row_factor.min(cell.stride_factor);
                        out.push(cell);
                        x += base_stride(window, cell.stride_factor);
                        if x > max_x {
                            break;
                        }
                    }
                    y += base_stride(window, row_factor);
                    if y > max_y {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn cell(&mut self, image: &Image, scale_index: usize, x: u32, y: u32, size: u32) -> Result<GridCell, ScaleError> {
        let view = image.view(Rect::square(x, y, size))?;
        let saliency = self.scorer.score(&view)?;
        Ok(GridCell {
            x,
            y,
            size,
            scale_index,
            saliency,
            stride_factor: stride_factor(saliency, self.cfg.threshold_low, self.cfg.threshold_high),
        })
    }
}

/// One-shot planning with a fresh memo table.
pub fn plan(image: &Image, scales: &[u32], cfg: PlanCfg) -> Result<Vec<GridCell>, ScaleError> {
    WindowPlanner::new(cfg).plan(image, scales)
}
