//! Input validation, decoding, EXIF orientation and JPEG encoding.
//!
//! Everything here is a pure bytes-to-pixels (or pixels-to-bytes) transform.
//! No file is ever written; callers that want artifacts on disk go through
//! `pipeline::diagnostic`.

use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use tracing::debug;

use super::ImagingError;

/// Maximum input image size (in bytes) before rejecting.
/// Prevents OOM on corrupt/adversarial files.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
pub const MIN_IMAGE_BYTES: usize = 67;

/// JPEG quality used for every outgoing payload.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Input formats. The original bytes go to the vision endpoint as a data
/// URL, and OpenAI-compatible endpoints take only these.
pub const SUPPORTED_FORMATS: &[ImageFormat] = &[ImageFormat::Jpeg, ImageFormat::Png, ImageFormat::WebP];

/// A decoded input image plus what we learned while decoding it.
#[derive(Debug)]
pub struct DecodedImage {
    /// Pixels with EXIF orientation already applied.
    pub image: DynamicImage,
    /// MIME type sniffed from the raw bytes.
    pub media_type: &'static str,
    /// EXIF orientation tag value (1 = upright).
    pub orientation: u32,
}

/// Read an image file fully into memory.
pub fn read_image_file(path: &Path) -> Result<Vec<u8>, ImagingError> {
    std::fs::read(path).map_err(|source| ImagingError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

/// Validate image bytes before decoding.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), ImagingError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(ImagingError::Decode(
            "Image data too small to be valid".into(),
        ));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImagingError::Decode(format!(
            "Image data exceeds {}MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Validate, decode and orient raw image bytes.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, ImagingError> {
    validate_image_bytes(bytes)?;

    if let Ok(format) = image::guess_format(bytes) {
        if !SUPPORTED_FORMATS.contains(&format) {
            return Err(ImagingError::Decode(format!(
                "Unsupported image format {format:?}; use JPEG, PNG or WebP"
            )));
        }
    }

    let image = image::load_from_memory(bytes)
        .map_err(|e| ImagingError::Decode(format!("Failed to decode image: {e}")))?;

    let orientation = read_exif_orientation(bytes);
    let image = apply_orientation(image, orientation);
    let (w, h) = image.dimensions();

    debug!(
        size = format!("{w}x{h}"),
        color = ?image.color(),
        orientation,
        input_bytes = bytes.len(),
        "Input image decoded"
    );

    Ok(DecodedImage {
        image,
        media_type: detect_media_type(bytes),
        orientation,
    })
}

/// Sniff the MIME type of raw image bytes, defaulting to JPEG.
pub fn detect_media_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or("image/jpeg")
}

/// Read EXIF orientation tag from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply EXIF orientation transform to a `DynamicImage`.
///
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

/// Reduce any pixel layout to one the JPEG encoder accepts (L8 or RGB8).
pub fn jpeg_compatible(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => Cow::Borrowed(img),
        other if !other.color().has_color() => Cow::Owned(DynamicImage::ImageLuma8(other.to_luma8())),
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    }
}

/// Encode an image as baseline JPEG.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImagingError> {
    let img = jpeg_compatible(img);
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder)
        .map_err(|e| ImagingError::Encode(format!("JPEG encoding failed: {e}")))?;
    Ok(buf)
}
