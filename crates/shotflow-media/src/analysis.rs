//! Pixel-level similarity and quality measures.

use image::RgbImage;

/// Histogram bins per color channel.
pub const HISTOGRAM_BINS: usize = 32;

/// Cosine similarity of two embedding vectors, normalized to [0, 1].
///
/// Returns `None` when the vectors differ in length or either has zero
/// magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    let cos = dot / (norm_a.sqrt() * norm_b.sqrt());
    Some((((cos + 1.0) / 2.0) as f32).clamp(0.0, 1.0))
}

/// Per-channel 32-bin color histogram, normalized to sum 1 per channel.
pub fn rgb_histogram(img: &RgbImage) -> Vec<f32> {
    let mut hist = vec![0.0f32; HISTOGRAM_BINS * 3];
    let pixel_count = (img.width() * img.height()) as f32;
    if pixel_count == 0.0 {
        return hist;
    }
    let bin_width = 256 / HISTOGRAM_BINS;
    for p in img.pixels() {
        for c in 0..3 {
            let bin = (p.0[c] as usize) / bin_width;
            hist[c * HISTOGRAM_BINS + bin] += 1.0;
        }
    }
    for v in hist.iter_mut() {
        *v /= pixel_count;
    }
    hist
}

/// Correlation of two images' RGB histograms, normalized to [0, 1].
///
/// This is the quality-gate fallback when no embedding model is available;
/// it degrades precision but never fails.
pub fn histogram_correlation(a: &RgbImage, b: &RgbImage) -> f32 {
    let ha = rgb_histogram(a);
    let hb = rgb_histogram(b);
    pearson(&ha, &hb).map(|r| ((r + 1.0) / 2.0).clamp(0.0, 1.0)).unwrap_or(0.5)
}

fn pearson(a: &[f32], b: &[f32]) -> Option<f32> {
    let n = a.len() as f64;
    let mean_a = a.iter().map(|v| *v as f64).sum::<f64>() / n;
    let mean_b = b.iter().map(|v| *v as f64).sum::<f64>() / n;
    let mut cov = 0.0f64;
    let mut var_a = 0.0f64;
    let mut var_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = *x as f64 - mean_a;
        let dy = *y as f64 - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }
    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some((cov / (var_a.sqrt() * var_b.sqrt())) as f32)
}

/// Sharpness score: variance of a 4-neighbor Laplacian over luminance.
///
/// Used to pick the best of N candidate frames; higher is sharper.
pub fn sharpness(img: &RgbImage) -> f32 {
    let (w, h) = img.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }
    let luma = |x: u32, y: u32| -> f64 {
        let p = img.get_pixel(x, y).0;
        0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64
    };

    let mut values = Vec::with_capacity(((w - 2) * (h - 2)) as usize);
    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let lap = 4.0 * luma(x, y)
                - luma(x - 1, y)
                - luma(x + 1, y)
                - luma(x, y - 1)
                - luma(x, y + 1);
            values.push(lap);
        }
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n) as f32
}
