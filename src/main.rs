use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use clap::Parser;
use log::info;
use salient_tiles::{PipelineDriver, Resample, StrideMode, TilingConfig};

/// Cut large images into uniform square patches, denser where there is detail.
#[derive(Parser, Debug)]
#[command(name = "tiles")]
#[command(about = "🧩 Adaptive multi-scale saliency-guided image tiling")]
#[command(long_about = "Tile an image (or every image in a directory) into fixed-size square patches.
Windows of several sizes are laid over the source in overlapping grids; each window is scored
for edge density and texture so downstream consumers can tell busy regions from flat ones.")]
struct Args {
    /// Input image file or directory
    #[arg(short, long, help = "Image file or directory of images to tile")]
    input: PathBuf,

    /// Output directory for patches
    #[arg(short, long, default_value = "outputs/patches")]
    output: PathBuf,

    /// Window sizes in source pixels, largest first
    #[arg(short, long, num_args = 1.., value_delimiter = ',',
          help = "Window sizes in pixels, e.g. 2560 1280 640 (or 2560,1280,640)")]
    window_sizes: Option<Vec<u32>>,

    /// Side of every output patch
    #[arg(short = 's', long)]
    output_size: Option<u32>,

    /// Scores below this get the sparse stride factor
    #[arg(long)]
    threshold_low: Option<f64>,

    /// Scores above this get the dense stride factor
    #[arg(long)]
    threshold_high: Option<f64>,

    /// Fraction of the window advanced per grid step
    #[arg(long)]
    overlap_ratio: Option<f64>,

    /// Let each window's saliency shrink or grow the next grid step
    #[arg(long)]
    adaptive_stride: bool,

    /// Divisor applied to LBP entropy before weighting
    #[arg(long)]
    texture_norm: Option<f64>,

    /// Resize filter
    #[arg(long, help = "Resize filter: box, bilinear, catmull-rom, lanczos3")]
    resample: Option<String>,

    /// Patch file extension
    #[arg(short, long, help = "Patch file format by extension: jpg, png, bmp, tiff, webp")]
    format: Option<String>,

    /// Write a JSON manifest next to each image's patches
    #[arg(long)]
    manifest: bool,

    /// Worker threads for directory mode
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Decode budget in pixels for each source image
    #[arg(long)]
    max_pixels: Option<u64>,

    /// JSON config file; explicit flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let config = build_config(&args)?;
    let driver = PipelineDriver::new(config)?;

    if args.input.is_file() {
        let report = driver.run_path(&args.input, Some(&args.output))?;
        info!(
            "✓ Saved {} patches to {}",
            report.saved.len(),
            args.output.display()
        );
        Ok(())
    } else if args.input.is_dir() {
        let report = driver.run_directory(&args.input, Some(&args.output))?;
        let failed = report.failed().count();
        info!(
            "{} of {} images tiled into {}",
            report.files.len() - failed,
            report.files.len(),
            args.output.display()
        );
        Ok(())
    } else {
        Err(anyhow!(
            "Input path {} is neither a file nor a directory",
            args.input.display()
        ))
    }
}

/// Start from the config file (or defaults) and apply explicit flags on top
fn build_config(args: &Args) -> Result<TilingConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => TilingConfig::default(),
    };

    if let Some(sizes) = &args.window_sizes {
        config.window_sizes = sizes.clone();
    }
    if let Some(size) = args.output_size {
        config.output_size = size;
    }
    if let Some(low) = args.threshold_low {
        config.saliency_threshold_low = low;
    }
    if let Some(high) = args.threshold_high {
        config.saliency_threshold_high = high;
    }
    if let Some(ratio) = args.overlap_ratio {
        config.overlap_ratio = ratio;
    }
    if args.adaptive_stride {
        config.stride_mode = StrideMode::Adaptive;
    }
    if let Some(norm) = args.texture_norm {
        config.saliency_weights.texture_norm = norm;
    }
    if let Some(filter) = &args.resample {
        config.resample = parse_resample(filter)?;
    }
    if let Some(format) = &args.format {
        config.output_format = format.trim_start_matches('.').to_ascii_lowercase();
    }
    if args.manifest {
        config.write_manifest = true;
    }
    if args.jobs.is_some() {
        config.jobs = args.jobs;
    }
    if let Some(pixels) = args.max_pixels {
        config.max_decode_pixels = pixels;
    }
    Ok(config)
}

fn load_config(path: &Path) -> Result<TilingConfig> {
    Ok(TilingConfig::from_json_file(path)?)
}

fn parse_resample(filter: &str) -> Result<Resample> {
    filter.parse::<Resample>().map_err(anyhow::Error::msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "tiles",
            "--input",
            "scan.png",
            "--window-sizes",
            "1280,640",
            "--threshold-low",
            "0.1",
            "--adaptive-stride",
            "--resample",
            "bilinear",
            "--format",
            ".PNG",
            "--max-pixels",
            "2000000000",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.window_sizes, vec![1280, 640]);
        assert_eq!(config.saliency_threshold_low, 0.1);
        assert_eq!(config.saliency_threshold_high, 0.6);
        assert_eq!(config.stride_mode, StrideMode::Adaptive);
        assert_eq!(config.resample, Resample::Bilinear);
        assert_eq!(config.output_format, "png");
        assert_eq!(config.max_decode_pixels, 2_000_000_000);
        assert_eq!(args.output, PathBuf::from("outputs/patches"));
    }

    #[test]
    fn test_space_separated_window_sizes() {
        let args = Args::parse_from(["tiles", "-i", "a.jpg", "-w", "2560", "1280", "640"]);
        assert_eq!(args.window_sizes, Some(vec![2560, 1280, 640]));
    }

    #[test]
    fn test_invalid_resample_is_rejected() {
        assert!(parse_resample("nearest").is_err());
        assert_eq!(parse_resample("lanczos").unwrap(), Resample::Lanczos3);
    }

    #[test]
    fn test_config_file_is_the_base() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiles.json");
        std::fs::write(&path, r#"{ "output_size": 320, "window_sizes": [960] }"#).unwrap();

        let args = Args::parse_from([
            "tiles",
            "-i",
            "a.jpg",
            "--config",
            path.to_str().unwrap(),
            "--output-size",
            "256",
        ]);
        let config = build_config(&args).unwrap();
        assert_eq!(config.window_sizes, vec![960]);
        assert_eq!(config.output_size, 256);
    }
}
