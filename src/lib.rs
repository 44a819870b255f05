//! # Salient Tiles
//!
//! Adaptive multi-scale tiling of large images into uniform square patches, guided by a
//! cheap saliency estimate.
//!
//! ## Architecture
//!
//! The heavy lifting lives in the `tile-scale` crate:
//! - `SaliencyScorer`: Sobel edge density plus uniform LBP texture entropy per window
//! - `WindowPlanner`: overlapping grid per window size, annotated with saliency and stride factor
//! - `PatchExtractor`: crop + resize to the fixed output side
//!
//! This crate wraps them with:
//! - `config`: the validated run configuration
//! - `io`: decoding, patch encoding and directory listing
//! - `pipeline`: single-image, single-file and directory entry points
//! - `error`: structured errors with severity and recovery hints
//!
//! ## Example
//!
//! ```rust
//! use salient_tiles::{Channels, Image, TilingConfig, run};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let image = Image::new(640, 640, Channels::Gray, vec![128; 640 * 640])?;
//! let config = TilingConfig::new(vec![640], 320, 0.25, 0.6);
//!
//! let patches = run(&image, &config)?;
//! assert_eq!(patches.len(), 1);
//! assert_eq!(patches.patches()[0].pixels.len(), 320 * 320);
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod config;
pub mod error;
pub mod io;
pub mod pipeline;

pub use config::TilingConfig;
pub use error::{
    ErrorSeverity, HasRecoverySuggestion, HasSeverity, Recoverable, TileError, TileResult,
};
pub use pipeline::{
    BatchReport, FileOutcome, FileSummary, ImageReport, Patch, PatchManifest, PatchSet,
    PipelineDriver, run, run_directory, run_path,
};

/// Re-export the core types callers need to build inputs and read results
pub use tile_scale::{
    Channels, GridCell, Image, Rect, Resample, SaliencyScorer, SaliencyWeights, StrideMode,
};
