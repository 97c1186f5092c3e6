//! Size-budget resizer: shrink until the JPEG encoding fits a byte ceiling.

use image::{DynamicImage, GenericImageView};
use tracing::debug;

use super::codec::{encode_jpeg, jpeg_compatible, DEFAULT_JPEG_QUALITY};
use super::filters::{resample, scale_dimensions};
use super::types::SizedImage;
use super::ImagingError;
use crate::config::{DEFAULT_MAX_BYTES, DEFAULT_MAX_DIMENSION};

/// Multiplier applied to the scale factor on every over-budget pass.
pub const SHRINK_FACTOR: f64 = 0.9;

/// Downscales an image (area averaging, aspect ratio preserved) until its
/// JPEG encoding is no larger than `max_bytes`.
///
/// Pass 1 targets `max_dimension` on the longest edge (never upscaling).
/// Each later pass multiplies the scale by [`SHRINK_FACTOR`] and applies
/// it to the already-shrunk buffer, so the scale strictly decreases.
/// A 1x1 buffer that still does not fit is reported as
/// [`ImagingError::SizeBudgetUnreachable`].
#[derive(Debug, Clone)]
pub struct SizeBudgetResizer {
    max_dimension: u32,
    max_bytes: usize,
    jpeg_quality: u8,
}

impl Default for SizeBudgetResizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DIMENSION, DEFAULT_MAX_BYTES)
    }
}

impl SizeBudgetResizer {
    pub fn new(max_dimension: u32, max_bytes: usize) -> Self {
        Self {
            max_dimension: max_dimension.max(1),
            max_bytes,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn max_dimension(&self) -> u32 {
        self.max_dimension
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    pub fn resize(&self, image: &DynamicImage) -> Result<SizedImage, ImagingError> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(ImagingError::SizeBudgetUnreachable {
                width: w,
                height: h,
                bytes: 0,
                max_bytes: self.max_bytes,
            });
        }

        let mut scale = initial_scale(w, h, self.max_dimension);
        let mut current = if scale < 1.0 {
            let (nw, nh) = scale_dimensions(w, h, scale);
            resample(image, nw, nh)
        } else {
            jpeg_compatible(image).into_owned()
        };
        let mut encoded = encode_jpeg(&current, self.jpeg_quality)?;
        let mut scales = vec![scale];

        debug!(
            from = format!("{w}x{h}"),
            to = format!("{}x{}", current.width(), current.height()),
            scale,
            bytes = encoded.len(),
            max_bytes = self.max_bytes,
            "Initial resize pass"
        );

        while encoded.len() > self.max_bytes {
            let (cw, ch) = current.dimensions();
            if cw <= 1 && ch <= 1 {
                return Err(ImagingError::SizeBudgetUnreachable {
                    width: cw,
                    height: ch,
                    bytes: encoded.len(),
                    max_bytes: self.max_bytes,
                });
            }

            scale *= SHRINK_FACTOR;
            scales.push(scale);

            let (nw, nh) = scale_dimensions(cw, ch, scale);
            if (nw, nh) == (cw, ch) {
                // Rounding kept the size; the next, smaller scale will move it.
                continue;
            }

            current = resample(&current, nw, nh);
            encoded = encode_jpeg(&current, self.jpeg_quality)?;

            debug!(
                pass = scales.len(),
                size = format!("{nw}x{nh}"),
                scale,
                bytes = encoded.len(),
                "Over budget, shrinking"
            );
        }

        Ok(SizedImage {
            image: current,
            jpeg: encoded,
            scales,
        })
    }
}

/// Scale that brings the longest edge to `max_dimension`, capped at 1.0.
pub fn initial_scale(width: u32, height: u32, max_dimension: u32) -> f64 {
    let longest = width.max(height).max(1) as f64;
    (max_dimension as f64 / longest).min(1.0)
}
