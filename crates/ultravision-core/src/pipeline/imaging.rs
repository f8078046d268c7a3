//! Optional image decoding: EXIF orientation, max-side resizing, dimensions.
//!
//! Decoding support is the `imaging` cargo feature. Without it, dimensions
//! are unknown and normalization hands back the original bytes.

use crate::config::ImageConfig;

/// Whether this build can decode images.
pub const AVAILABLE: bool = cfg!(feature = "imaging");

/// Whether normalization would do anything for these settings.
pub fn normalization_requested(config: &ImageConfig) -> bool {
    AVAILABLE && (config.autorotate || config.max_side.is_some())
}

/// Pixel dimensions of an encoded image, if it can be decoded.
pub fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    backend::dimensions(bytes)
}

/// Apply the stored orientation and the max-side bound, re-encoding in the
/// format family implied by `mime`.
///
/// Returns `None` on any failure; callers keep the original bytes.
pub fn normalize(bytes: &[u8], mime: &str, config: &ImageConfig) -> Option<Vec<u8>> {
    backend::normalize(bytes, mime, config.max_side)
}

#[cfg(feature = "imaging")]
mod backend {
    use exif::{In, Reader, Tag, Value};
    use image::imageops::FilterType;
    use image::{DynamicImage, GenericImageView, ImageFormat};
    use std::io::Cursor;

    pub fn dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
        image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .ok()?
            .into_dimensions()
            .ok()
    }

    pub fn normalize(bytes: &[u8], mime: &str, max_side: Option<u32>) -> Option<Vec<u8>> {
        let mut img = match image::load_from_memory(bytes) {
            Ok(img) => img,
            Err(e) => {
                tracing::debug!("Normalization skipped, decode failed: {e}");
                return None;
            }
        };

        if let Some(orientation) = read_orientation(bytes) {
            img = apply_orientation(img, orientation);
        }

        if let Some(max_side) = max_side {
            img = bound_longest_side(img, max_side);
        }

        encode(img, mime)
    }

    /// EXIF orientation (1-8), if the container carries one.
    fn read_orientation(bytes: &[u8]) -> Option<u32> {
        let exif = Reader::new()
            .read_from_container(&mut Cursor::new(bytes))
            .ok()?;
        exif.get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|f| match &f.value {
                Value::Short(v) => v.first().map(|&x| x as u32),
                Value::Long(v) => v.first().copied(),
                _ => None,
            })
    }

    pub(super) fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
        match orientation {
            2 => img.fliph(),
            3 => img.rotate180(),
            4 => img.flipv(),
            // transpose
            5 => img.rotate90().fliph(),
            6 => img.rotate90(),
            // transverse
            7 => img.rotate270().fliph(),
            8 => img.rotate270(),
            _ => img,
        }
    }

    /// Scale both sides by the same ratio so the longer side equals `max_side`.
    pub(super) fn bound_longest_side(img: DynamicImage, max_side: u32) -> DynamicImage {
        let (width, height) = img.dimensions();
        let longest = width.max(height);
        if longest <= max_side {
            return img;
        }

        let ratio = max_side as f64 / longest as f64;
        let (new_width, new_height) = if width >= height {
            (max_side, ((height as f64 * ratio) as u32).max(1))
        } else {
            (((width as f64 * ratio) as u32).max(1), max_side)
        };
        img.resize_exact(new_width, new_height, FilterType::Lanczos3)
    }

    fn encode(img: DynamicImage, mime: &str) -> Option<Vec<u8>> {
        let (img, format) = match mime {
            "image/jpeg" | "image/jpg" => (DynamicImage::ImageRgb8(img.to_rgb8()), ImageFormat::Jpeg),
            "image/webp" => (DynamicImage::ImageRgba8(img.to_rgba8()), ImageFormat::WebP),
            _ => (img, ImageFormat::Png),
        };

        let mut buffer = Cursor::new(Vec::new());
        match img.write_to(&mut buffer, format) {
            Ok(()) => Some(buffer.into_inner()),
            Err(e) => {
                tracing::debug!("Normalization skipped, encode failed: {e}");
                None
            }
        }
    }
}

#[cfg(not(feature = "imaging"))]
mod backend {
    pub fn dimensions(_bytes: &[u8]) -> Option<(u32, u32)> {
        None
    }

    pub fn normalize(_bytes: &[u8], _mime: &str, _max_side: Option<u32>) -> Option<Vec<u8>> {
        None
    }
}
