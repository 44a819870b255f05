//! Image decoding, patch encoding and directory listing.
//!
//! These are the only places the pipeline touches storage.

use std::fs;
use std::path::{Path, PathBuf};

use image::{ColorType, DynamicImage, ImageFormat, ImageReader, Limits};
use tile_scale::{Channels, Image};

use crate::error::{TileError, TileResult};

/// Extensions picked up in directory mode (compared case-insensitively).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tif", "tiff", "webp"];

/// Extensions accepted for persisted patches. Every one encodes both `L8` and `Rgb8`
/// at any patch side.
pub const PATCH_FORMATS: &[&str] = IMAGE_EXTENSIONS;

/// Whether `ext` names one of the [`PATCH_FORMATS`] and its encoder is compiled in.
pub fn is_patch_format(ext: &str) -> bool {
    PATCH_FORMATS.iter().any(|f| ext.eq_ignore_ascii_case(f))
        && ImageFormat::from_extension(ext).is_some_and(|f| f.writing_enabled())
}

/// Convert a decoded image into a tiling buffer.
///
/// Grayscale sources stay single-channel, everything else becomes RGB8. Alpha is dropped
/// and 16-bit or float samples are reduced to 8 bits.
pub fn from_dynamic(img: DynamicImage) -> TileResult<Image> {
    let (w, h) = (img.width(), img.height());
    let image = if img.color().has_color() {
        Image::new(w, h, Channels::Rgb, img.into_rgb8().into_raw())?
    } else {
        Image::new(w, h, Channels::Gray, img.into_luma8().into_raw())?
    };
    Ok(image)
}

/// Largest source accepted by default, in pixels (2^30).
pub const DEFAULT_MAX_DECODE_PIXELS: u64 = 1 << 30;

/// Worst-case decoder bytes per pixel (16-bit RGBA).
const DECODE_BYTES_PER_PIXEL: u64 = 8;

/// Decoder limits for sources of up to `max_pixels` pixels.
///
/// The `image` crate caps decoder allocations at 512 MiB by default, which rejects large
/// scans; the cap here scales with the pixel budget instead.
pub fn decode_limits(max_pixels: u64) -> Limits {
    let mut limits = Limits::no_limits();
    limits.max_alloc = Some(max_pixels.saturating_mul(DECODE_BYTES_PER_PIXEL));
    limits
}

/// Decode an image file with the default pixel budget.
pub fn load_image(path: &Path) -> TileResult<Image> {
    load_image_with_limit(path, DEFAULT_MAX_DECODE_PIXELS)
}

/// Decode an image file within a budget of `max_pixels` pixels (see [`decode_limits`]).
/// Missing, undecodable or oversized files yield `ImageRead`.
pub fn load_image_with_limit(path: &Path, max_pixels: u64) -> TileResult<Image> {
    let mut reader = ImageReader::open(path)
        .map_err(|e| TileError::image_read(path, e.to_string()))?
        .with_guessed_format()
        .map_err(|e| TileError::image_read(path, e.to_string()))?;
    reader.limits(decode_limits(max_pixels));
    let img = reader
        .decode()
        .map_err(|e| TileError::image_read(path, e.to_string()))?;
    from_dynamic(img)
}

/// Encode one square patch. The format follows the path's extension.
pub fn save_patch(path: &Path, pixels: &[u8], side: u32, channels: Channels) -> TileResult<()> {
    let color = match channels {
        Channels::Gray => ColorType::L8,
        Channels::Rgb => ColorType::Rgb8,
    };
    let format = ImageFormat::from_path(path).map_err(|e| TileError::encode(path, e))?;
    image::save_buffer_with_format(path, pixels, side, side, color, format)
        .map_err(|e| TileError::encode(path, e))
}

/// Whether `path` has one of the [`IMAGE_EXTENSIONS`].
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.iter().any(|ext| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}

/// Image files directly inside `dir`, sorted lexically by file name.
pub fn list_images(dir: &Path) -> TileResult<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| TileError::image_read(dir, e.to_string()))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| TileError::image_read(dir, e.to_string()))?
            .path();
        if path.is_file() && is_image_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// File stem used as the patch name prefix.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string())
}

/// `{base}_patch_{index:04}.{ext}`
pub fn patch_file_name(base: &str, index: usize, ext: &str) -> String {
    format!("{}_patch_{:04}.{}", base, index, ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, RgbImage, RgbaImage};

    #[test]
    fn patch_names_are_zero_padded() {
        assert_eq!(patch_file_name("scan", 7, "jpg"), "scan_patch_0007.jpg");
        assert_eq!(patch_file_name("scan", 12345, "png"), "scan_patch_12345.png");
    }

    #[test]
    fn recognizes_supported_extensions() {
        assert!(is_image_file(Path::new("a/B.JPG")));
        assert!(is_image_file(Path::new("c.webp")));
        assert!(is_image_file(Path::new("d.tif")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("noext")));
    }

    #[test]
    fn patch_formats_encode_gray_and_rgb() {
        assert!(is_patch_format("jpg"));
        assert!(is_patch_format("TIFF"));
        assert!(is_patch_format("webp"));
        for ext in ["hdr", "exr", "ico", "qoi", "ppm", "tga", ""] {
            assert!(!is_patch_format(ext), "{ext} should be rejected");
        }
    }

    #[test]
    fn gray_sources_stay_single_channel() {
        let img = from_dynamic(DynamicImage::ImageLuma8(GrayImage::new(4, 3))).unwrap();
        assert_eq!(img.channels(), Channels::Gray);
        assert_eq!(img.as_raw().len(), 12);
    }

    #[test]
    fn alpha_is_dropped() {
        let rgba = RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 40]));
        let img = from_dynamic(DynamicImage::ImageRgba8(rgba)).unwrap();
        assert_eq!(img.channels(), Channels::Rgb);
        assert_eq!(&img.as_raw()[..3], &[10, 20, 30]);
    }

    #[test]
    fn default_limits_admit_large_scans() {
        let limits = decode_limits(DEFAULT_MAX_DECODE_PIXELS);
        assert_eq!(limits.max_image_width, None);
        assert_eq!(limits.max_image_height, None);
        // A 13500 x 13500 RGB scan needs ~547 MB, above the image crate's 512 MiB default
        let scan = 13_500u64 * 13_500 * 3;
        assert!(scan > 512 << 20);
        assert!(limits.max_alloc.is_some_and(|cap| cap >= scan));
    }

    #[test]
    fn pixel_budget_rejects_oversized_sources() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.png");
        RgbImage::from_pixel(64, 64, image::Rgb([1, 2, 3])).save(&path).unwrap();

        assert!(load_image_with_limit(&path, 1 << 20).is_ok());
        let err = load_image_with_limit(&path, 16).unwrap_err();
        assert_eq!(err.category(), "image_read");
    }

    #[test]
    fn missing_file_is_image_read_error() {
        let err = load_image(Path::new("/definitely/not/here.png")).unwrap_err();
        assert_eq!(err.category(), "image_read");
    }
}
