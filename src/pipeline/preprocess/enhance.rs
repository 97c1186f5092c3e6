//! Legibility pass for produce photos.
//!
//! Fixed sequence, each step feeding the next:
//! 1. BT.601 grayscale
//! 2. 5x5 Gaussian blur (noise suppression before thresholding)
//! 3. Global histogram equalization
//! 4. Canny edges, thresholds 50/150, on the equalized image as-is
//! 5. Bitwise OR of equalized image and edge map
//! 6. Adaptive Gaussian binary threshold, window 11, offset 2
//!
//! Output is always single-channel. Colour is gone after step 1, which is
//! why the classification gate only routes produce here.

use image::{DynamicImage, GrayImage};
use tracing::debug;

use super::codec::encode_jpeg;
use super::filters::{
    adaptive_threshold_gaussian, bitwise_or, canny, equalize_histogram, gaussian_blur, to_gray,
};
use super::resize::SizeBudgetResizer;
use super::types::SizedImage;
use super::ImagingError;

pub const BLUR_KERNEL: usize = 5;
pub const CANNY_LOW: f32 = 50.0;
pub const CANNY_HIGH: f32 = 150.0;
pub const THRESHOLD_BLOCK: usize = 11;
pub const THRESHOLD_OFFSET: i32 = 2;

/// Runs the legibility pass at full resolution, falling back to the
/// size-budget resizer only when the binary result is still too large.
#[derive(Debug, Clone, Default)]
pub struct LegibilityEnhancer {
    fallback: SizeBudgetResizer,
}

impl LegibilityEnhancer {
    /// `fallback` supplies both the byte budget and the resize used when
    /// the enhanced image exceeds it.
    pub fn new(fallback: SizeBudgetResizer) -> Self {
        Self { fallback }
    }

    pub fn enhance(&self, image: &DynamicImage) -> Result<SizedImage, ImagingError> {
        let binary = DynamicImage::ImageLuma8(legibility_pass(image));
        let jpeg = encode_jpeg(&binary, self.fallback.jpeg_quality())?;

        if jpeg.len() > self.fallback.max_bytes() {
            debug!(
                bytes = jpeg.len(),
                max_bytes = self.fallback.max_bytes(),
                "Enhanced image over budget, handing to resizer"
            );
            return self.fallback.resize(&binary);
        }

        Ok(SizedImage {
            image: binary,
            jpeg,
            scales: vec![1.0],
        })
    }
}

/// The six-step grayscale/contrast/edge/threshold transform.
pub fn legibility_pass(image: &DynamicImage) -> GrayImage {
    let start = std::time::Instant::now();

    let gray = to_gray(image);
    let blurred = gaussian_blur(&gray, BLUR_KERNEL);
    let equalized = equalize_histogram(&blurred);
    let edges = canny(&equalized, CANNY_LOW, CANNY_HIGH);
    let combined = bitwise_or(&equalized, &edges);
    let binary = adaptive_threshold_gaussian(&combined, THRESHOLD_BLOCK, THRESHOLD_OFFSET);

    debug!(
        size = format!("{}x{}", binary.width(), binary.height()),
        elapsed_ms = %start.elapsed().as_millis(),
        "Legibility pass complete"
    );
    binary
}
