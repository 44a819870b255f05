//! # Tiling Pipeline
//!
//! Drives the core components over one image or a directory of images.
//!
//! ## Flow
//!
//! 1. Validate the [`TilingConfig`] (no I/O happens before this succeeds)
//! 2. Decode the source (path entry points only)
//! 3. Per scale, in configured order: plan the grid, then crop + resize every cell
//! 4. Either append each patch to a [`PatchSet`] in generation order, or encode it as
//!    `{base}_patch_{index:04}.{ext}` straight away and keep only its [`GridCell`]
//! 5. Optionally write a JSON manifest next to persisted patches
//!
//! The patch index runs across all scales of one image and restarts at zero for the next
//! image. Nothing is shared between images, so directory mode hands one image to each
//! rayon task and collects results back in lexical file order.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use tile_scale::{Channels, GridCell, Image, PatchExtractor, WindowPlanner};

use crate::config::TilingConfig;
use crate::error::{TileError, TileResult, classify};
use crate::io;

/// One uniform square patch cut from a source image.
#[derive(Clone, Debug)]
pub struct Patch {
    /// Position in the patch set, spanning all scales
    pub index: usize,
    /// Window this patch was cut from, with its saliency annotation
    pub cell: GridCell,
    /// Output side in pixels
    pub side: u32,
    pub channels: Channels,
    /// Tightly packed `side × side × channels` bytes
    pub pixels: Vec<u8>,
}

impl Patch {
    pub fn saliency(&self) -> f64 {
        self.cell.saliency
    }

    pub fn origin(&self) -> (u32, u32) {
        (self.cell.x, self.cell.y)
    }
}

/// Ordered patches of one source image: scale order first, then row-major.
#[derive(Clone, Debug, Default)]
pub struct PatchSet {
    source: Option<String>,
    source_width: u32,
    source_height: u32,
    patches: Vec<Patch>,
}

impl PatchSet {
    fn new(source: Option<String>, image: &Image) -> Self {
        Self {
            source,
            source_width: image.width(),
            source_height: image.height(),
            patches: Vec::new(),
        }
    }

    /// Base name of the source file, when the set came from a path.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn source_dims(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Patch> {
        self.patches.iter()
    }

    pub fn into_patches(self) -> Vec<Patch> {
        self.patches
    }

    /// Descriptive metadata for every patch; `files` pairs up with the patches when given.
    pub fn manifest(&self, files: &[PathBuf]) -> PatchManifest {
        let cells: Vec<GridCell> = self.patches.iter().map(|p| p.cell).collect();
        PatchManifest::new(
            self.source.clone(),
            (self.source_width, self.source_height),
            self.patches.first().map(|p| p.side),
            &cells,
            files,
        )
    }
}

impl<'a> IntoIterator for &'a PatchSet {
    type Item = &'a Patch;
    type IntoIter = std::slice::Iter<'a, Patch>;

    fn into_iter(self) -> Self::IntoIter {
        self.patches.iter()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ManifestEntry {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    pub x: u32,
    pub y: u32,
    pub size: u32,
    pub scale_index: usize,
    pub saliency: f64,
    pub stride_factor: f64,
}

/// JSON sidecar written next to persisted patches.
#[derive(Clone, Debug, Serialize)]
pub struct PatchManifest {
    pub source: Option<String>,
    pub source_width: u32,
    pub source_height: u32,
    pub output_size: Option<u32>,
    pub patches: Vec<ManifestEntry>,
}

impl PatchManifest {
    /// Entry `i` describes `cells[i]`, the patch with index `i`.
    fn new(
        source: Option<String>,
        (source_width, source_height): (u32, u32),
        output_size: Option<u32>,
        cells: &[GridCell],
        files: &[PathBuf],
    ) -> Self {
        let patches = cells
            .iter()
            .enumerate()
            .map(|(index, cell)| ManifestEntry {
                index,
                file: files
                    .get(index)
                    .and_then(|f| f.file_name())
                    .map(|f| f.to_string_lossy().into_owned()),
                x: cell.x,
                y: cell.y,
                size: cell.size,
                scale_index: cell.scale_index,
                saliency: cell.saliency,
                stride_factor: cell.stride_factor,
            })
            .collect();
        Self {
            source,
            source_width,
            source_height,
            output_size,
            patches,
        }
    }
}

/// Result of processing one image file.
///
/// Persisted runs hold no pixels: each patch is encoded as soon as it is cut and only
/// its cell is kept. In-memory runs return the full [`PatchSet`].
#[derive(Debug)]
pub struct ImageReport {
    /// Base name of the source file
    pub source: String,
    pub source_width: u32,
    pub source_height: u32,
    pub output_size: u32,
    /// Cell of every patch; position is the patch index
    pub cells: Vec<GridCell>,
    /// Patches with pixels, only when nothing was persisted
    pub patch_set: Option<PatchSet>,
    /// Written patch files, empty when nothing was persisted
    pub saved: Vec<PathBuf>,
    pub manifest: Option<PathBuf>,
}

impl ImageReport {
    fn new(source: String, image: &Image, output_size: u32) -> Self {
        Self {
            source,
            source_width: image.width(),
            source_height: image.height(),
            output_size,
            cells: Vec::new(),
            patch_set: None,
            saved: Vec::new(),
            manifest: None,
        }
    }

    /// Number of patches produced.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn to_manifest(&self) -> PatchManifest {
        PatchManifest::new(
            Some(self.source.clone()),
            (self.source_width, self.source_height),
            (!self.cells.is_empty()).then_some(self.output_size),
            &self.cells,
            &self.saved,
        )
    }
}

/// Per-file summary kept by directory mode once the pixels are released.
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub patches: usize,
    pub saved: Vec<PathBuf>,
    pub manifest: Option<PathBuf>,
}

impl From<ImageReport> for FileSummary {
    fn from(report: ImageReport) -> Self {
        Self {
            patches: report.len(),
            saved: report.saved,
            manifest: report.manifest,
        }
    }
}

#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: TileResult<FileSummary>,
}

/// Outcome of a directory run, in lexical file order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub files: Vec<FileOutcome>,
    /// Patches produced across all successful files
    pub total_patches: usize,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&Path, &FileSummary)> {
        self.files
            .iter()
            .filter_map(|f| f.result.as_ref().ok().map(|s| (f.path.as_path(), s)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Path, &TileError)> {
        self.files
            .iter()
            .filter_map(|f| f.result.as_ref().err().map(|e| (f.path.as_path(), e)))
    }
}

/// Validated pipeline for one configuration.
#[derive(Debug, Clone)]
pub struct PipelineDriver {
    config: TilingConfig,
}

impl PipelineDriver {
    /// Validate `config` and build a driver. Touches no files.
    pub fn new(config: TilingConfig) -> TileResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TilingConfig {
        &self.config
    }

    /// Tile an in-memory image.
    pub fn run(&self, image: &Image) -> TileResult<PatchSet> {
        let mut set = PatchSet::new(None, image);
        self.tile(image, |patch| {
            set.patches.push(patch);
            Ok(())
        })?;
        Ok(set)
    }

    /// Cut every patch in generation order and hand it to `emit`.
    fn tile(&self, image: &Image, mut emit: impl FnMut(Patch) -> TileResult<()>) -> TileResult<()> {
        let cfg = &self.config;
        let mut planner = WindowPlanner::new(cfg.plan_cfg());
        let mut extractor = PatchExtractor::new(cfg.resample);
        let mut cells = Vec::new();
        let mut index = 0;

        for (scale_index, &window) in cfg.window_sizes.iter().enumerate() {
            cells.clear();
            planner.plan_scale(image, scale_index, window, &mut cells)?;
            debug!("window {}px: {} cells", window, cells.len());
            for cell in &cells {
                let pixels = extractor.extract(image, cell.rect(), cfg.output_size)?;
                emit(Patch {
                    index,
                    cell: *cell,
                    side: cfg.output_size,
                    channels: image.channels(),
                    pixels,
                })?;
                index += 1;
            }
        }
        Ok(())
    }

    /// Decode `path` and tile it.
    ///
    /// With `output`, every patch is written there as soon as it is cut and released;
    /// without it, the patches are returned in [`ImageReport::patch_set`].
    pub fn run_path(&self, path: &Path, output: Option<&Path>) -> TileResult<ImageReport> {
        let image = io::load_image_with_limit(path, self.config.max_decode_pixels)?;
        let base = io::base_name(path);
        let mut report = ImageReport::new(base.clone(), &image, self.config.output_size);

        match output {
            Some(dir) => {
                fs::create_dir_all(dir)
                    .map_err(|e| TileError::io("create output directory", Some(dir), e))?;
                let ext = &self.config.output_format;
                self.tile(&image, |patch| {
                    let file = dir.join(io::patch_file_name(&base, patch.index, ext));
                    io::save_patch(&file, &patch.pixels, patch.side, patch.channels)?;
                    report.cells.push(patch.cell);
                    report.saved.push(file);
                    Ok(())
                })?;
                drop(image);
                if self.config.write_manifest {
                    report.manifest = Some(write_manifest(dir, &base, &report)?);
                }
            }
            None => {
                let mut set = PatchSet::new(Some(base), &image);
                self.tile(&image, |patch| {
                    report.cells.push(patch.cell);
                    set.patches.push(patch);
                    Ok(())
                })?;
                report.patch_set = Some(set);
            }
        }

        info!("✓ Processed {} patches from {}", report.len(), path.display());
        Ok(report)
    }

    /// Tile every supported image in `dir` (sorted by name).
    ///
    /// Only a config error or an unreadable directory fails the call; per-file failures
    /// are recorded in the report and the remaining files are still processed.
    pub fn run_directory(&self, dir: &Path, output: Option<&Path>) -> TileResult<BatchReport> {
        let files = io::list_images(dir)?;
        info!("Found {} images to process", files.len());

        let work = || -> Vec<FileOutcome> {
            files
                .par_iter()
                .map(|path| FileOutcome {
                    path: path.clone(),
                    result: self.run_path(path, output).map(FileSummary::from),
                })
                .collect()
        };
        let outcomes = match self.config.jobs {
            Some(n) => rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build()
                .map_err(|e| TileError::external("rayon", e))?
                .install(work),
            None => work(),
        };

        let mut report = BatchReport::default();
        for outcome in outcomes {
            match &outcome.result {
                Ok(summary) => report.total_patches += summary.patches,
                Err(e) if classify::isolates_in_batch(e) => {
                    warn!("✗ Error processing {}: {}", outcome.path.display(), e)
                }
                Err(e) => error!("✗ Error processing {}: {}", outcome.path.display(), e),
            }
            report.files.push(outcome);
        }
        info!("✓ Processing complete: {} total patches", report.total_patches);
        Ok(report)
    }
}

fn write_manifest(dir: &Path, base: &str, report: &ImageReport) -> TileResult<PathBuf> {
    let path = dir.join(format!("{}_patches.json", base));
    let file = File::create(&path).map_err(|e| TileError::io("create manifest", Some(&path), e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &report.to_manifest())?;
    Ok(path)
}

/// Validate `config` and tile an in-memory image.
pub fn run(image: &Image, config: &TilingConfig) -> TileResult<PatchSet> {
    PipelineDriver::new(config.clone())?.run(image)
}

/// Validate `config`, then decode and tile one file, persisting into `output` when given.
pub fn run_path(path: &Path, config: &TilingConfig, output: Option<&Path>) -> TileResult<ImageReport> {
    PipelineDriver::new(config.clone())?.run_path(path, output)
}

/// Validate `config`, then process every image in `dir`.
pub fn run_directory(dir: &Path, config: &TilingConfig, output: Option<&Path>) -> TileResult<BatchReport> {
    PipelineDriver::new(config.clone())?.run_directory(dir, output)
}
