//! Image standardization: validation guards, canonical RGB conversion,
//! bounded resize, and lossless re-encoding.
//!
//! Raw downloads are untrusted bytes from listing CDNs, so the guards run
//! in a fixed order before any decoding work: size ceiling, magic-byte
//! sniff, declared-dimension pixel ceiling. Only then is the payload
//! decoded, converted to RGB, downscaled if oversized, and re-encoded as
//! compressed PNG.

use std::io::Cursor;

use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder, ImageFormat, ImageReader};

use crate::config::LimitsConfig;
use crate::error::ProcessingError;

/// Canonical output format for standardized images.
pub const CANONICAL_FORMAT: &str = "png";

/// A decoded, normalized, re-encoded image ready to persist.
///
/// Ephemeral: lives only between standardization and the file write.
#[derive(Debug, Clone)]
pub struct StandardizedImage {
    /// Re-encoded PNG bytes
    pub bytes: Vec<u8>,
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Always [`CANONICAL_FORMAT`]
    pub format: &'static str,
}

/// Standardizes raw image bytes with configurable limits.
#[derive(Debug, Clone)]
pub struct ImageStandardizer {
    limits: LimitsConfig,
}

impl ImageStandardizer {
    /// Create a new standardizer with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Validate, decode, normalize, and re-encode a raw payload.
    pub fn standardize(&self, raw: &[u8]) -> Result<StandardizedImage, ProcessingError> {
        let max_bytes = self.limits.max_raw_file_size_mb * 1024 * 1024;
        if raw.len() as u64 > max_bytes {
            return Err(ProcessingError::PayloadTooLarge {
                size_mb: raw.len() as u64 / (1024 * 1024),
                max_mb: self.limits.max_raw_file_size_mb,
            });
        }

        // Magic bytes before any decode work blocks disguised payloads
        if !is_valid_image_header(raw) {
            return Err(ProcessingError::InvalidMagicBytes);
        }

        // Read declared dimensions without decoding pixel data
        let (width, height) = ImageReader::new(Cursor::new(raw))
            .with_guessed_format()
            .map_err(|e| ProcessingError::Decode(format!("cannot sniff format: {e}")))?
            .into_dimensions()
            .map_err(|e| ProcessingError::Decode(e.to_string()))?;

        let pixels = width as u64 * height as u64;
        if pixels > self.limits.max_pixel_count {
            return Err(ProcessingError::PixelCeilingExceeded {
                width,
                height,
                max_pixels: self.limits.max_pixel_count,
            });
        }

        let decoded = ImageReader::new(Cursor::new(raw))
            .with_guessed_format()
            .map_err(|e| ProcessingError::Decode(format!("cannot sniff format: {e}")))?
            .decode()
            .map_err(|e| ProcessingError::Decode(e.to_string()))?;

        // Any color mode (RGBA, grayscale, palette, ...) collapses to RGB8
        let rgb = decoded.to_rgb8();
        let (width, height) = rgb.dimensions();

        let (out_w, out_h) = target_dimensions(width, height, self.limits.max_image_dimension);
        let rgb = if (out_w, out_h) != (width, height) {
            image::imageops::resize(&rgb, out_w, out_h, FilterType::Lanczos3)
        } else {
            rgb
        };

        let mut bytes = Vec::new();
        PngEncoder::new_with_quality(
            Cursor::new(&mut bytes),
            CompressionType::Default,
            PngFilterType::Adaptive,
        )
        .write_image(rgb.as_raw(), out_w, out_h, ExtendedColorType::Rgb8)
        .map_err(|e| ProcessingError::Encode(e.to_string()))?;

        Ok(StandardizedImage {
            bytes,
            width: out_w,
            height: out_h,
            format: CANONICAL_FORMAT,
        })
    }

    /// Read declared dimensions without decoding. `None` on invalid input.
    pub fn dimensions(raw: &[u8]) -> Option<(u32, u32)> {
        ImageReader::new(Cursor::new(raw))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }

    /// Sniff the input format from content. `None` on invalid input.
    pub fn sniff_format(raw: &[u8]) -> Option<ImageFormat> {
        image::guess_format(raw).ok()
    }

    /// Cheap pre-flight check: does the payload start like a known image?
    pub fn is_valid_image(raw: &[u8]) -> bool {
        is_valid_image_header(raw)
    }
}

/// Compute output dimensions: downscale to fit `max_dim`, preserving aspect
/// ratio with arithmetic rounding. Never upscales.
fn target_dimensions(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    if width <= max_dim && height <= max_dim {
        return (width, height);
    }

    let (w, h, max) = (width as u64, height as u64, max_dim as u64);
    if width >= height {
        let scaled = ((h * max + w / 2) / w).max(1) as u32;
        (max_dim, scaled)
    } else {
        let scaled = ((w * max + h / 2) / h).max(1) as u32;
        (scaled, max_dim)
    }
}

/// Check the header bytes against known image format signatures.
fn is_valid_image_header(raw: &[u8]) -> bool {
    if raw.len() < 4 {
        return false;
    }

    // JPEG: FF D8 FF
    if raw[0] == 0xFF && raw[1] == 0xD8 && raw[2] == 0xFF {
        return true;
    }

    // PNG: 89 50 4E 47
    if raw[0] == 0x89 && raw[1] == b'P' && raw[2] == b'N' && raw[3] == b'G' {
        return true;
    }

    // GIF: GIF8
    if raw[0] == b'G' && raw[1] == b'I' && raw[2] == b'F' && raw[3] == b'8' {
        return true;
    }

    // WebP: RIFF....WEBP
    if raw[0] == b'R' && raw[1] == b'I' && raw[2] == b'F' && raw[3] == b'F' {
        if raw.len() >= 12 {
            return raw[8] == b'W' && raw[9] == b'E' && raw[10] == b'B' && raw[11] == b'P';
        }
        return false;
    }

    // BMP: BM
    if raw[0] == b'B' && raw[1] == b'M' {
        return true;
    }

    // TIFF: II*\0 (little-endian) or MM\0* (big-endian)
    let is_tiff_le = raw[0] == b'I' && raw[1] == b'I' && raw[2] == 0x2A && raw[3] == 0x00;
    let is_tiff_be = raw[0] == b'M' && raw[1] == b'M' && raw[2] == 0x00 && raw[3] == 0x2A;
    if is_tiff_le || is_tiff_be {
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn standardizer() -> ImageStandardizer {
        ImageStandardizer::new(LimitsConfig::default())
    }

    #[test]
    fn test_downscales_wide_rgba_to_bounds() {
        // 2000x500 RGBA at max_dimension 1024 must come out 1024x256 RGB
        let img = DynamicImage::ImageRgba8(RgbaImage::new(2000, 500));
        let result = standardizer().standardize(&png_bytes(&img)).unwrap();

        assert_eq!((result.width, result.height), (1024, 256));
        assert_eq!(result.format, "png");
        // Aspect ratio 4.0 preserved
        assert_eq!(result.width / result.height, 4);
    }

    #[test]
    fn test_never_upscales() {
        let img = DynamicImage::new_rgb8(50, 50);
        let result = standardizer().standardize(&png_bytes(&img)).unwrap();
        assert_eq!((result.width, result.height), (50, 50));
    }

    #[test]
    fn test_tall_image_scales_on_height() {
        let img = DynamicImage::new_rgb8(500, 2000);
        let result = standardizer().standardize(&png_bytes(&img)).unwrap();
        assert_eq!((result.width, result.height), (256, 1024));
    }

    #[test]
    fn test_output_is_png() {
        let img = DynamicImage::new_rgb8(10, 10);
        let result = standardizer().standardize(&png_bytes(&img)).unwrap();
        assert_eq!(&result.bytes[1..4], b"PNG");
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let limits = LimitsConfig {
            max_raw_file_size_mb: 1,
            ..LimitsConfig::default()
        };
        let huge = vec![0u8; 2 * 1024 * 1024];
        let err = ImageStandardizer::new(limits).standardize(&huge);
        assert!(matches!(
            err,
            Err(ProcessingError::PayloadTooLarge { max_mb: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_magic_bytes() {
        let err = standardizer().standardize(b"<html>not an image</html>");
        assert!(matches!(err, Err(ProcessingError::InvalidMagicBytes)));
    }

    #[test]
    fn test_rejects_pixel_bomb_before_decode() {
        let limits = LimitsConfig {
            max_pixel_count: 1000,
            ..LimitsConfig::default()
        };
        let img = DynamicImage::new_rgb8(100, 100); // 10_000 pixels
        let err = ImageStandardizer::new(limits).standardize(&png_bytes(&img));
        assert!(matches!(
            err,
            Err(ProcessingError::PixelCeilingExceeded {
                width: 100,
                height: 100,
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_truncated_png() {
        let img = DynamicImage::new_rgb8(64, 64);
        let mut bytes = png_bytes(&img);
        bytes.truncate(bytes.len() / 2);
        let err = standardizer().standardize(&bytes);
        assert!(matches!(err, Err(ProcessingError::Decode(_))));
    }

    #[test]
    fn test_query_helpers_do_not_raise() {
        assert_eq!(ImageStandardizer::dimensions(b"garbage"), None);
        assert_eq!(ImageStandardizer::sniff_format(b"garbage"), None);
        assert!(!ImageStandardizer::is_valid_image(b"garbage"));
        assert!(!ImageStandardizer::is_valid_image(b""));

        let img = DynamicImage::new_rgb8(30, 20);
        let bytes = png_bytes(&img);
        assert_eq!(ImageStandardizer::dimensions(&bytes), Some((30, 20)));
        assert_eq!(
            ImageStandardizer::sniff_format(&bytes),
            Some(ImageFormat::Png)
        );
        assert!(ImageStandardizer::is_valid_image(&bytes));
    }

    #[test]
    fn test_target_dimensions_rounding() {
        assert_eq!(target_dimensions(2000, 500, 1024), (1024, 256));
        assert_eq!(target_dimensions(500, 2000, 1024), (256, 1024));
        assert_eq!(target_dimensions(1024, 1024, 1024), (1024, 1024));
        assert_eq!(target_dimensions(1025, 1, 1024), (1024, 1));
        // 3000x2000 -> 1024x683 (682.67 rounds up)
        assert_eq!(target_dimensions(3000, 2000, 1024), (1024, 683));
    }
}
