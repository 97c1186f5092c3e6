use image::{DynamicImage, GenericImageView};
use serde::Serialize;

/// Media type of every payload produced by the preprocessors.
pub const JPEG_MEDIA_TYPE: &str = "image/jpeg";

/// An image paired with the JPEG encoding that was checked against the
/// size budget.
#[derive(Debug, Clone)]
pub struct SizedImage {
    /// Pixels the encoding was produced from.
    pub image: DynamicImage,
    /// Encoded bytes; always `<= max_bytes` of the stage that produced them.
    pub jpeg: Vec<u8>,
    /// Scale factor applied on each pass, first pass first. `[1.0]` when the
    /// pixels were never resampled.
    pub scales: Vec<f64>,
}

impl SizedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn byte_len(&self) -> usize {
        self.jpeg.len()
    }

    /// Extra shrink passes needed after the first encode.
    pub fn extra_passes(&self) -> usize {
        self.scales.len().saturating_sub(1)
    }

    pub fn is_single_channel(&self) -> bool {
        self.image.color().channel_count() == 1
    }

    /// Serializable summary for reports and diagnostic dumps.
    pub fn info(&self) -> SizedImageInfo {
        let (width, height) = self.image.dimensions();
        SizedImageInfo {
            width,
            height,
            channels: self.image.color().channel_count(),
            bytes: self.jpeg.len(),
            scales: self.scales.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SizedImageInfo {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub bytes: usize,
    pub scales: Vec<f64>,
}
