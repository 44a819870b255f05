// SPDX-License-Identifier: MIT
//! # Patch Saliency Scoring
//!
//! Scores a pixel window by how much visual information it carries, combining two terms:
//!
//! 1. **Edge density**: mean 3×3 Sobel gradient magnitude over the luminance plane,
//!    divided by 255. Borders are reflected (`dcb|abcd|cba`, reflect-101).
//! 2. **Texture complexity**: Shannon entropy (bits) of the histogram of uniform
//!    local binary patterns, 8 neighbours at radius 1, 10 buckets (9 uniform codes
//!    plus one catch-all for non-uniform patterns).
//!
//! The combined score is
//! `edge_weight × edge_density + texture_weight × texture_complexity / texture_norm`,
//! clamped into `[0, 1]`. `texture_norm` (4.0 by default) is a fixed normalisation
//! constant, not derived from the bucket count; it sets the balance between the terms.
//!
//! Scoring is pure: the same pixels always produce the same score and the scorer holds
//! no mutable state. [`CachedScorer`] adds an explicit per-owner memo table for callers
//! that expect repeated identical windows (blank margins, flat backgrounds).

use std::collections::HashMap;
use std::f64::consts::PI;
use std::hash::{DefaultHasher, Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::ScaleError;
use crate::image::PatchView;

/// Number of sampled neighbours for the LBP descriptor.
const LBP_POINTS: usize = 8;
/// Uniform codes `0..=8` plus the non-uniform bucket.
pub const LBP_BINS: usize = LBP_POINTS + 2;
/// Guards the histogram normalisation and the entropy logarithm.
const EPS: f64 = 1e-6;

/// Weights of the two saliency terms.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaliencyWeights {
    pub edge_weight: f64,
    pub texture_weight: f64,
    /// Divisor applied to the entropy (bits) before weighting.
    pub texture_norm: f64,
}

impl Default for SaliencyWeights {
    fn default() -> Self {
        Self {
            edge_weight: 0.6,
            texture_weight: 0.4,
            texture_norm: 4.0,
        }
    }
}

/// Both raw terms alongside the final clamped score.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SaliencyBreakdown {
    pub edge_density: f64,
    pub texture_complexity: f64,
    pub score: f64,
}

/// Stateless information-density scorer.
#[derive(Clone, Copy, Debug)]
pub struct SaliencyScorer {
    weights: SaliencyWeights,
    offsets: [(f64, f64); LBP_POINTS],
}

impl Default for SaliencyScorer {
    fn default() -> Self {
        Self::new(SaliencyWeights::default())
    }
}

impl SaliencyScorer {
    pub fn new(weights: SaliencyWeights) -> Self {
        Self {
            weights,
            offsets: lbp_offsets(),
        }
    }

    pub fn weights(&self) -> SaliencyWeights {
        self.weights
    }

    /// Score a window. Fails with `InvalidPatch` for zero area.
    pub fn score(&self, view: &PatchView<'_>) -> Result<f64, ScaleError> {
        Ok(self.breakdown(view)?.score)
    }

    /// Score a window and keep the intermediate terms.
    pub fn breakdown(&self, view: &PatchView<'_>) -> Result<SaliencyBreakdown, ScaleError> {
        if view.is_empty() {
            return Err(ScaleError::InvalidPatch {
                width: view.width(),
                height: view.height(),
            });
        }
        let luma = view.to_luma();
        Ok(self.breakdown_luma(&luma, view.width() as usize, view.height() as usize))
    }

    /// `luma` must hold exactly `w * h > 0` bytes.
    fn breakdown_luma(&self, luma: &[u8], w: usize, h: usize) -> SaliencyBreakdown {
        let edge_density = edge_density(luma, w, h);
        let texture_complexity = lbp_entropy(luma, w, h, &self.offsets);
        let raw = self.weights.edge_weight * edge_density
            + self.weights.texture_weight * (texture_complexity / self.weights.texture_norm);
        SaliencyBreakdown {
            edge_density,
            texture_complexity,
            score: raw.clamp(0.0, 1.0),
        }
    }
}

/// Bytes of window luminance a [`CachedScorer`] keeps by default.
pub const DEFAULT_CACHE_BUDGET: usize = 64 << 20;

#[derive(Debug)]
struct CacheEntry {
    width: usize,
    height: usize,
    luma: Box<[u8]>,
    score: f64,
}

/// Bucket key for a luminance window.
fn content_key(luma: &[u8], w: usize, h: usize) -> u64 {
    let mut s = DefaultHasher::new();
    (w, h).hash(&mut s);
    luma.hash(&mut s);
    s.finish()
}

/// Scorer with a memo table keyed by window content.
///
/// Entries are bucketed by a content hash and a hit requires the stored luminance to match
/// byte for byte, so a hash collision never returns another window's score. Once `budget`
/// bytes of luminance are stored, new windows are scored but not remembered.
///
/// The table lives as long as its owner (one planner run); nothing is shared
/// between owners, so independent images can be planned on different threads.
#[derive(Debug)]
pub struct CachedScorer {
    scorer: SaliencyScorer,
    table: HashMap<u64, Vec<CacheEntry>>,
    entries: usize,
    stored_bytes: usize,
    budget: usize,
    hits: usize,
}

impl Default for CachedScorer {
    fn default() -> Self {
        Self::new(SaliencyScorer::default())
    }
}

impl CachedScorer {
    pub fn new(scorer: SaliencyScorer) -> Self {
        Self::with_budget(scorer, DEFAULT_CACHE_BUDGET)
    }

    pub fn with_budget(scorer: SaliencyScorer, budget: usize) -> Self {
        Self {
            scorer,
            table: HashMap::new(),
            entries: 0,
            stored_bytes: 0,
            budget,
            hits: 0,
        }
    }

    pub fn scorer(&self) -> &SaliencyScorer {
        &self.scorer
    }

    /// Distinct windows remembered so far.
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Lookups answered from the table.
    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Luminance bytes held by the table.
    pub fn stored_bytes(&self) -> usize {
        self.stored_bytes
    }

    pub fn score(&mut self, view: &PatchView<'_>) -> Result<f64, ScaleError> {
        if view.is_empty() {
            return Err(ScaleError::InvalidPatch {
                width: view.width(),
                height: view.height(),
            });
        }
        let (w, h) = (view.width() as usize, view.height() as usize);
        let luma = view.to_luma();
        let key = content_key(&luma, w, h);
        if let Some(hit) = self.lookup(key, &luma, w, h) {
            self.hits += 1;
            return Ok(hit);
        }
        let score = self.scorer.breakdown_luma(&luma, w, h).score;
        if self.stored_bytes + luma.len() <= self.budget {
            self.stored_bytes += luma.len();
            self.entries += 1;
            self.table.entry(key).or_default().push(CacheEntry {
                width: w,
                height: h,
                luma: luma.into_boxed_slice(),
                score,
            });
        }
        Ok(score)
    }

    fn lookup(&self, key: u64, luma: &[u8], w: usize, h: usize) -> Option<f64> {
        self.table
            .get(&key)?
            .iter()
            .find(|e| e.width == w && e.height == h && *e.luma == *luma)
            .map(|e| e.score)
    }

    /// Insert an entry under an explicit key. Lets tests force two windows into one bucket.
    #[cfg(test)]
    fn insert_raw(&mut self, key: u64, luma: &[u8], w: usize, h: usize, score: f64) {
        self.stored_bytes += luma.len();
        self.entries += 1;
        self.table.entry(key).or_default().push(CacheEntry {
            width: w,
            height: h,
            luma: luma.into(),
            score,
        });
    }
}

#[inline]
fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let i = if i < 0 { -i } else { i };
    (if i >= n { 2 * n - 2 - i } else { i }) as usize
}

/// Mean Sobel magnitude divided by 255.
pub fn edge_density(luma: &[u8], w: usize, h: usize) -> f64 {
    let mut sum = 0.0f64;
    for y in 0..h {
        let top = &luma[reflect101(y as isize - 1, h) * w..][..w];
        let mid = &luma[y * w..][..w];
        let bot = &luma[reflect101(y as isize + 1, h) * w..][..w];
        for x in 0..w {
            let xm = reflect101(x as isize - 1, w);
            let xp = reflect101(x as isize + 1, w);
            let p = |row: &[u8], i: usize| f64::from(row[i]);
            let gx = (p(top, xp) - p(top, xm)) + 2.0 * (p(mid, xp) - p(mid, xm)) + (p(bot, xp) - p(bot, xm));
            let gy = (p(bot, xm) + 2.0 * p(bot, x) + p(bot, xp)) - (p(top, xm) + 2.0 * p(top, x) + p(top, xp));
            sum += (gx * gx + gy * gy).sqrt();
        }
    }
    sum / (w * h) as f64 / 255.0
}

/// Neighbour offsets `(row, col)` on the unit circle, rounded to 5 decimals.
fn lbp_offsets() -> [(f64, f64); LBP_POINTS] {
    let round5 = |v: f64| (v * 1e5).round() / 1e5;
    let mut out = [(0.0, 0.0); LBP_POINTS];
    for (p, o) in out.iter_mut().enumerate() {
        let a = 2.0 * PI * p as f64 / LBP_POINTS as f64;
        *o = (round5(-a.sin()), round5(a.cos()));
    }
    out
}

/// Bilinear sample at fractional (`r`, `c`); taps outside the window read 0.
#[inline]
fn sample(luma: &[u8], w: usize, h: usize, r: f64, c: f64) -> f64 {
    let get = |rr: f64, cc: f64| {
        if rr < 0.0 || cc < 0.0 || rr >= h as f64 || cc >= w as f64 {
            0.0
        } else {
            f64::from(luma[rr as usize * w + cc as usize])
        }
    };
    let (minr, maxr) = (r.floor(), r.ceil());
    let (minc, maxc) = (c.floor(), c.ceil());
    let (dr, dc) = (r - minr, c - minc);
    let top = (1.0 - dc) * get(minr, minc) + dc * get(minr, maxc);
    let bottom = (1.0 - dc) * get(maxr, minc) + dc * get(maxr, maxc);
    (1.0 - dr) * top + dr * bottom
}

/// Rotation-invariant uniform code of an 8-bit neighbour pattern.
#[inline]
fn uniform_code(pattern: u8) -> usize {
    let transitions = (pattern ^ pattern.rotate_left(1)).count_ones();
    if transitions <= 2 {
        pattern.count_ones() as usize
    } else {
        LBP_POINTS + 1
    }
}

/// Uniform-LBP histogram of the window, one count per pixel.
pub fn lbp_histogram(luma: &[u8], w: usize, h: usize) -> [u64; LBP_BINS] {
    lbp_histogram_with(luma, w, h, &lbp_offsets())
}

fn lbp_histogram_with(luma: &[u8], w: usize, h: usize, offsets: &[(f64, f64); LBP_POINTS]) -> [u64; LBP_BINS] {
    let mut hist = [0u64; LBP_BINS];
    for r in 0..h {
        for c in 0..w {
            let centre = f64::from(luma[r * w + c]);
            let mut pattern = 0u8;
            for (p, &(dr, dc)) in offsets.iter().enumerate() {
                let v = sample(luma, w, h, r as f64 + dr, c as f64 + dc);
                if v - centre >= 0.0 {
                    pattern |= 1 << p;
                }
            }
            hist[uniform_code(pattern)] += 1;
        }
    }
    hist
}

fn lbp_entropy(luma: &[u8], w: usize, h: usize, offsets: &[(f64, f64); LBP_POINTS]) -> f64 {
    let hist = lbp_histogram_with(luma, w, h, offsets);
    let denom = hist.iter().sum::<u64>() as f64 + EPS;
    -hist
        .iter()
        .map(|&n| {
            let p = n as f64 / denom;
            p * (p + EPS).log2()
        })
        .sum::<f64>()
}
