//! Pixel kernels shared by the resizer and the legibility pass.
//!
//! Pure Rust over raw sample buffers. Blurs default to reflect-101 borders
//! (`dcb|abcd|cba`); the adaptive-threshold mean and the Sobel gradients use
//! replicate borders (`aaa|abcd|ddd`). Either way a uniform image stays
//! uniform.

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Pixel, RgbImage};

/// Convert RGB image to grayscale using ITU-R BT.601 luminance.
pub fn rgb_to_gray(rgb: &RgbImage) -> GrayImage {
    let (w, h) = (rgb.width(), rgb.height());
    let mut gray = GrayImage::new(w, h);
    for (x, y, p) in rgb.enumerate_pixels() {
        let luma = (0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32)
            .round()
            .clamp(0.0, 255.0) as u8;
        gray.put_pixel(x, y, Luma([luma]));
    }
    gray
}

/// Grayscale any decoded image. Single-channel inputs pass through as-is.
pub fn to_gray(img: &DynamicImage) -> GrayImage {
    match img {
        DynamicImage::ImageLuma8(g) => g.clone(),
        other if !other.color().has_color() => other.to_luma8(),
        other => rgb_to_gray(&other.to_rgb8()),
    }
}

/// Sigma derived from an odd kernel size when none is given explicitly.
pub fn sigma_for_kernel(ksize: usize) -> f32 {
    0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian taps for an odd `ksize`.
///
/// Kernels up to 7 taps use the fixed binomial weights; larger ones are
/// sampled from `sigma_for_kernel(ksize)`.
pub fn gaussian_kernel(ksize: usize) -> Vec<f32> {
    debug_assert!(ksize % 2 == 1, "kernel size must be odd");
    match ksize {
        1 => vec![1.0],
        3 => vec![0.25, 0.5, 0.25],
        5 => vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => vec![0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125],
        _ => {
            let sigma = sigma_for_kernel(ksize);
            let half = (ksize / 2) as f32;
            let mut taps: Vec<f32> = (0..ksize)
                .map(|i| {
                    let x = i as f32 - half;
                    (-(x * x) / (2.0 * sigma * sigma)).exp()
                })
                .collect();
            let sum: f32 = taps.iter().sum();
            taps.iter_mut().for_each(|t| *t /= sum);
            taps
        }
    }
}

/// How kernels sample outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Border {
    /// `dcb|abcd|cba`
    Reflect101,
    /// `aaa|abcd|ddd`
    Replicate,
}

impl Border {
    fn index(self, i: i64, len: i64) -> usize {
        match self {
            Border::Reflect101 => reflect_101(i, len),
            Border::Replicate => i.clamp(0, len - 1) as usize,
        }
    }
}

fn reflect_101(i: i64, len: i64) -> usize {
    if len <= 1 {
        return 0;
    }
    let mut i = i;
    loop {
        if i < 0 {
            i = -i;
        } else if i >= len {
            i = 2 * len - 2 - i;
        } else {
            return i as usize;
        }
    }
}

/// Separable Gaussian blur with an explicit odd kernel size and
/// reflect-101 borders.
pub fn gaussian_blur(img: &GrayImage, ksize: usize) -> GrayImage {
    gaussian_blur_with_border(img, ksize, Border::Reflect101)
}

pub fn gaussian_blur_with_border(img: &GrayImage, ksize: usize, border: Border) -> GrayImage {
    let (w, h) = (img.width() as usize, img.height() as usize);
    if w == 0 || h == 0 {
        return img.clone();
    }
    let taps = gaussian_kernel(ksize);
    let half = (ksize / 2) as i64;
    let src = img.as_raw();

    let mut horizontal = vec![0f32; w * h];
    for y in 0..h {
        let row = &src[y * w..(y + 1) * w];
        for x in 0..w {
            let mut acc = 0f32;
            for (k, t) in taps.iter().enumerate() {
                let sx = border.index(x as i64 + k as i64 - half, w as i64);
                acc += row[sx] as f32 * t;
            }
            horizontal[y * w + x] = acc;
        }
    }

    let mut out = GrayImage::new(w as u32, h as u32);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0f32;
            for (k, t) in taps.iter().enumerate() {
                let sy = border.index(y as i64 + k as i64 - half, h as i64);
                acc += horizontal[sy * w + x] * t;
            }
            out.put_pixel(x as u32, y as u32, Luma([acc.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Global histogram equalization.
///
/// `lut[v] = round((cdf(v) - cdf_min) * 255 / (total - cdf_min))`, so the
/// darkest present level maps to 0. A single-valued image is returned
/// unchanged.
pub fn equalize_histogram(img: &GrayImage) -> GrayImage {
    let mut hist = [0u64; 256];
    for p in img.pixels() {
        hist[p.0[0] as usize] += 1;
    }
    let total: u64 = hist.iter().sum();
    let Some(darkest) = hist.iter().position(|&n| n > 0) else {
        return img.clone();
    };
    if hist[darkest] == total {
        return img.clone();
    }

    let scale = 255.0 / (total - hist[darkest]) as f64;
    let mut lut = [0u8; 256];
    let mut cumulative = 0u64;
    for v in darkest + 1..256 {
        cumulative += hist[v];
        lut[v] = (cumulative as f64 * scale).round().clamp(0.0, 255.0) as u8;
    }

    let mut out = img.clone();
    for p in out.pixels_mut() {
        p.0[0] = lut[p.0[0] as usize];
    }
    out
}

/// Canny edge map (255 on edges, 0 elsewhere) computed directly on `img`.
///
/// 3x3 Sobel gradients with replicate borders, L1 magnitude `|gx| + |gy|`,
/// non-maximum suppression along the quantized gradient direction, then
/// hysteresis: pixels above `high` seed edges that grow through 8-connected
/// neighbours above `low`. No smoothing is applied first.
pub fn canny(img: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut out = GrayImage::new(w as u32, h as u32);
    if w == 0 || h == 0 {
        return out;
    }
    let (low, high) = if low > high { (high, low) } else { (low, high) };
    let src = img.as_raw();
    let at = |x: i64, y: i64| -> i32 {
        let sx = Border::Replicate.index(x, w as i64);
        let sy = Border::Replicate.index(y, h as i64);
        src[sy * w + sx] as i32
    };

    let mut gx = vec![0i32; w * h];
    let mut gy = vec![0i32; w * h];
    let mut mag = vec![0i32; w * h];
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let dx = (at(x + 1, y - 1) + 2 * at(x + 1, y) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x - 1, y) + at(x - 1, y + 1));
            let dy = (at(x - 1, y + 1) + 2 * at(x, y + 1) + at(x + 1, y + 1))
                - (at(x - 1, y - 1) + 2 * at(x, y - 1) + at(x + 1, y - 1));
            let i = y as usize * w + x as usize;
            gx[i] = dx;
            gy[i] = dy;
            mag[i] = dx.abs() + dy.abs();
        }
    }

    // Outside the image the magnitude is zero.
    let mag_at = |x: i64, y: i64| -> i32 {
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            0
        } else {
            mag[y as usize * w + x as usize]
        }
    };

    const TAN_22_5: f64 = 0.414_213_562_373_095;
    const TAN_67_5: f64 = 2.414_213_562_373_095;

    // 0 = suppressed, 1 = weak candidate, 2 = strong.
    let mut class = vec![0u8; w * h];
    let mut stack = Vec::new();
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            let i = y as usize * w + x as usize;
            let m = mag[i];
            if m as f32 <= low {
                continue;
            }
            let (ax, ay) = (gx[i].abs() as f64, gy[i].abs() as f64);
            let is_max = if ay <= ax * TAN_22_5 {
                m > mag_at(x - 1, y) && m >= mag_at(x + 1, y)
            } else if ay >= ax * TAN_67_5 {
                m > mag_at(x, y - 1) && m >= mag_at(x, y + 1)
            } else {
                let s = if (gx[i] < 0) != (gy[i] < 0) { -1 } else { 1 };
                m > mag_at(x - s, y - 1) && m > mag_at(x + s, y + 1)
            };
            if !is_max {
                continue;
            }
            if m as f32 > high {
                class[i] = 2;
                stack.push(i);
            } else {
                class[i] = 1;
            }
        }
    }

    while let Some(i) = stack.pop() {
        let (x, y) = ((i % w) as i64, (i / w) as i64);
        out.put_pixel(x as u32, y as u32, Luma([255]));
        for ny in y - 1..=y + 1 {
            for nx in x - 1..=x + 1 {
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                if class[j] == 1 {
                    class[j] = 2;
                    stack.push(j);
                }
            }
        }
    }
    out
}

/// Per-pixel bitwise OR of two equally sized grayscale images.
pub fn bitwise_or(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.dimensions(), b.dimensions());
    let mut out = a.clone();
    for (dst, src) in out.pixels_mut().zip(b.pixels()) {
        dst.0[0] |= src.0[0];
    }
    out
}

/// Binary threshold against a Gaussian-weighted local mean.
///
/// A pixel becomes 255 when `src - mean > -offset`, else 0. `block` is the
/// (odd) window size of the local mean, which uses replicate borders.
pub fn adaptive_threshold_gaussian(img: &GrayImage, block: usize, offset: i32) -> GrayImage {
    let mean = gaussian_blur_with_border(img, block, Border::Replicate);
    let mut out = GrayImage::new(img.width(), img.height());
    for ((dst, src), m) in out.pixels_mut().zip(img.pixels()).zip(mean.pixels()) {
        let diff = src.0[0] as i32 - m.0[0] as i32;
        dst.0[0] = if diff > -offset { 255 } else { 0 };
    }
    out
}

/// Output dimensions for a uniform scale, never collapsing below 1 pixel.
pub fn scale_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let w = ((width as f64 * scale).round() as u32).max(1);
    let h = ((height as f64 * scale).round() as u32).max(1);
    (w, h)
}

/// Source taps and coverage weights for one axis of an area resample.
fn area_weights(src_len: u32, dst_len: u32) -> Vec<Vec<(usize, f32)>> {
    let ratio = src_len as f64 / dst_len as f64;
    (0..dst_len)
        .map(|d| {
            let start = d as f64 * ratio;
            let end = (start + ratio).min(src_len as f64);
            let span = end - start;
            let first = start.floor() as usize;
            let last = (end.ceil() as usize).min(src_len as usize);
            (first..last)
                .filter_map(|s| {
                    let overlap = end.min(s as f64 + 1.0) - start.max(s as f64);
                    (overlap > 0.0).then(|| (s, (overlap / span) as f32))
                })
                .collect()
        })
        .collect()
}

/// Area-averaging resample: each output sample is the coverage-weighted
/// mean of the source samples under it. Intended for shrinking.
pub fn area_resize<P>(img: &ImageBuffer<P, Vec<u8>>, new_w: u32, new_h: u32) -> ImageBuffer<P, Vec<u8>>
where
    P: Pixel<Subpixel = u8>,
{
    let (w, h) = img.dimensions();
    let mut out = ImageBuffer::<P, Vec<u8>>::new(new_w, new_h);
    if w == 0 || h == 0 || new_w == 0 || new_h == 0 {
        return out;
    }

    let ch = P::CHANNEL_COUNT as usize;
    let (w, h, nw) = (w as usize, h as usize, new_w as usize);
    let src = img.as_raw();
    let x_taps = area_weights(w as u32, new_w);
    let y_taps = area_weights(h as u32, new_h);

    let mut horizontal = vec![0f32; nw * h * ch];
    for y in 0..h {
        let row = &src[y * w * ch..(y + 1) * w * ch];
        for (dx, taps) in x_taps.iter().enumerate() {
            let acc = &mut horizontal[(y * nw + dx) * ch..(y * nw + dx + 1) * ch];
            for &(sx, weight) in taps {
                for c in 0..ch {
                    acc[c] += row[sx * ch + c] as f32 * weight;
                }
            }
        }
    }

    let dst: &mut [u8] = &mut out;
    for (dy, taps) in y_taps.iter().enumerate() {
        for dx in 0..nw {
            for c in 0..ch {
                let acc: f32 = taps
                    .iter()
                    .map(|&(sy, weight)| horizontal[(sy * nw + dx) * ch + c] * weight)
                    .sum();
                dst[(dy * nw + dx) * ch + c] = acc.round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}

/// Area-resample a decoded image, keeping luma single-channel and reducing
/// everything else to RGB8.
pub fn resample(img: &DynamicImage, new_w: u32, new_h: u32) -> DynamicImage {
    match img {
        DynamicImage::ImageLuma8(g) => DynamicImage::ImageLuma8(area_resize(g, new_w, new_h)),
        other if !other.color().has_color() => {
            DynamicImage::ImageLuma8(area_resize(&other.to_luma8(), new_w, new_h))
        }
        DynamicImage::ImageRgb8(rgb) => DynamicImage::ImageRgb8(area_resize(rgb, new_w, new_h)),
        other => DynamicImage::ImageRgb8(area_resize(&other.to_rgb8(), new_w, new_h)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn gray_uses_bt601_weights() {
        let img = RgbImage::from_pixel(2, 2, Rgb([255, 0, 0]));
        assert_eq!(rgb_to_gray(&img).get_pixel(0, 0).0[0], 76);
        let img = RgbImage::from_pixel(2, 2, Rgb([0, 255, 0]));
        assert_eq!(rgb_to_gray(&img).get_pixel(0, 0).0[0], 150);
    }

    #[test]
    fn sigma_for_eleven_tap_window() {
        assert!((sigma_for_kernel(11) - 2.0).abs() < 1e-6);
        assert!((sigma_for_kernel(5) - 1.1).abs() < 1e-6);
    }

    #[test]
    fn kernels_are_normalized_and_symmetric() {
        for k in [1, 3, 5, 7, 11, 15] {
            let taps = gaussian_kernel(k);
            assert_eq!(taps.len(), k);
            let sum: f32 = taps.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5, "k={k} sum={sum}");
            for i in 0..k / 2 {
                assert!((taps[i] - taps[k - 1 - i]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn reflect_101_indices() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(-2, 5), 2);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(6, 5), 2);
        assert_eq!(reflect_101(0, 1), 0);
        assert_eq!(reflect_101(3, 1), 0);
    }

    #[test]
    fn blur_preserves_uniform_image() {
        let img = GrayImage::from_pixel(9, 7, Luma([123]));
        let blurred = gaussian_blur(&img, 5);
        assert!(blurred.pixels().all(|p| p.0[0] == 123));
    }

    #[test]
    fn blur_spreads_a_spike() {
        let mut img = GrayImage::from_pixel(9, 9, Luma([0]));
        img.put_pixel(4, 4, Luma([255]));
        let blurred = gaussian_blur(&img, 5);
        let center = blurred.get_pixel(4, 4).0[0];
        assert!(center < 255 && center > 0);
        assert!(blurred.get_pixel(3, 4).0[0] > 0);
        assert_eq!(blurred.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn replicate_border_repeats_edge_sample() {
        let mut img = GrayImage::from_pixel(3, 1, Luma([80]));
        img.put_pixel(0, 0, Luma([0]));
        let replicate = gaussian_blur_with_border(&img, 3, Border::Replicate);
        let reflect = gaussian_blur_with_border(&img, 3, Border::Reflect101);
        assert_eq!(replicate.get_pixel(0, 0).0[0], 20);
        assert_eq!(reflect.get_pixel(0, 0).0[0], 40);
    }

    #[test]
    fn equalize_maps_darkest_level_to_zero() {
        let mut img = GrayImage::from_pixel(4, 4, Luma([100]));
        img.put_pixel(0, 0, Luma([50]));
        img.put_pixel(1, 0, Luma([50]));
        img.put_pixel(3, 3, Luma([200]));
        let out = equalize_histogram(&img);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(3, 3).0[0], 255);
        // 13 * 255 / 14
        assert_eq!(out.get_pixel(2, 2).0[0], 237);
    }

    #[test]
    fn equalize_leaves_uniform_image_unchanged() {
        let img = GrayImage::from_pixel(4, 4, Luma([100]));
        assert!(equalize_histogram(&img).pixels().all(|p| p.0[0] == 100));
    }

    #[test]
    fn canny_keeps_thin_low_contrast_stroke() {
        // Sobel L1 magnitude next to the stroke is 4 * 60 = 240 > 150.
        let mut img = GrayImage::from_pixel(40, 40, Luma([120]));
        for y in 0..40 {
            img.put_pixel(20, y, Luma([60]));
        }
        let edges = canny(&img, 50.0, 150.0);
        assert!(edges.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        assert_eq!(edges.get_pixel(19, 20).0[0], 255);
        assert_eq!(edges.get_pixel(21, 20).0[0], 255);
        assert_eq!(edges.get_pixel(20, 20).0[0], 0);
        assert_eq!(edges.get_pixel(5, 20).0[0], 0);
    }

    #[test]
    fn canny_ignores_uniform_and_faint_input() {
        let flat = GrayImage::from_pixel(16, 16, Luma([90]));
        assert!(canny(&flat, 50.0, 150.0).pixels().all(|p| p.0[0] == 0));

        // Step of 10: magnitude 40 stays under the low threshold.
        let faint = GrayImage::from_fn(16, 16, |x, _| Luma([if x < 8 { 100 } else { 110 }]));
        assert!(canny(&faint, 50.0, 150.0).pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn canny_hysteresis_extends_strong_edges_through_weak_ones() {
        // Left half of the step is strong (magnitude 160), right half weak (80).
        let img = GrayImage::from_fn(20, 20, |x, y| {
            let step = if y < 10 { 40 } else { 20 };
            Luma([if x < 10 { 100 } else { 100 + step }])
        });
        let edges = canny(&img, 50.0, 150.0);
        assert!(edges.get_pixel(9, 2).0[0] == 255 || edges.get_pixel(10, 2).0[0] == 255);
        assert!(edges.get_pixel(9, 17).0[0] == 255 || edges.get_pixel(10, 17).0[0] == 255);

        // A weak edge with no strong neighbour is dropped.
        let weak = GrayImage::from_fn(20, 20, |x, _| Luma([if x < 10 { 100 } else { 120 }]));
        assert!(canny(&weak, 50.0, 150.0).pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn threshold_mean_replicates_border() {
        // Bright first column; at x = 1 the replicated border pulls the mean
        // to ~140 (diff -40), where reflect-101 would give ~118 (diff -18).
        let img = GrayImage::from_fn(20, 20, |x, _| Luma([if x == 0 { 200 } else { 100 }]));
        let out = adaptive_threshold_gaussian(&img, 11, 30);
        assert_eq!(out.get_pixel(1, 10).0[0], 0);
        assert_eq!(out.get_pixel(12, 10).0[0], 255);
    }

    #[test]
    fn or_merges_bits() {
        let a = GrayImage::from_pixel(3, 3, Luma([0b1010_0000]));
        let b = GrayImage::from_pixel(3, 3, Luma([0b0000_0101]));
        assert!(bitwise_or(&a, &b).pixels().all(|p| p.0[0] == 0b1010_0101));
    }

    #[test]
    fn threshold_uniform_is_white() {
        // src - mean == 0 > -2 everywhere
        let img = GrayImage::from_pixel(20, 20, Luma([40]));
        let out = adaptive_threshold_gaussian(&img, 11, 2);
        assert!(out.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn threshold_marks_dark_stroke_black() {
        let mut img = GrayImage::from_pixel(31, 31, Luma([220]));
        for y in 0..31 {
            img.put_pixel(15, y, Luma([20]));
        }
        let out = adaptive_threshold_gaussian(&img, 11, 2);
        assert_eq!(out.get_pixel(15, 15).0[0], 0);
        assert_eq!(out.get_pixel(2, 15).0[0], 255);
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn scale_never_collapses_to_zero() {
        assert_eq!(scale_dimensions(3000, 2000, 800.0 / 3000.0), (800, 533));
        assert_eq!(scale_dimensions(1, 1, 0.01), (1, 1));
    }

    #[test]
    fn area_weights_cover_source_exactly() {
        let taps = area_weights(10, 4);
        assert_eq!(taps.len(), 4);
        for t in &taps {
            let sum: f32 = t.iter().map(|(_, w)| w).sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
        // 2.5 source pixels per output: first output covers 0, 1 and half of 2
        assert_eq!(taps[0].iter().map(|(s, _)| *s).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn area_resize_averages_blocks() {
        let mut img = GrayImage::new(4, 2);
        for (x, _, p) in img.enumerate_pixels_mut() {
            p.0[0] = if x < 2 { 0 } else { 200 };
        }
        let out = area_resize(&img, 2, 1);
        assert_eq!(out.dimensions(), (2, 1));
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 200);

        let out = area_resize(&img, 1, 1);
        assert_eq!(out.get_pixel(0, 0).0[0], 100);
    }

    #[test]
    fn area_resize_rgb_keeps_color() {
        let img = RgbImage::from_pixel(64, 48, Rgb([10, 120, 240]));
        let out = area_resize(&img, 16, 12);
        assert_eq!(out.dimensions(), (16, 12));
        assert!(out.pixels().all(|p| p.0 == [10, 120, 240]));
    }

    #[test]
    fn resample_keeps_luma_single_channel() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(20, 20, Luma([9])));
        let out = resample(&img, 10, 10);
        assert!(matches!(out, DynamicImage::ImageLuma8(_)));
        let rgba = DynamicImage::ImageRgba8(image::RgbaImage::new(20, 20));
        assert!(matches!(resample(&rgba, 5, 5), DynamicImage::ImageRgb8(_)));
    }
}
