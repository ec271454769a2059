//! Post-hoc palette matching.

use image::RgbImage;

/// Channel statistics for a single color plane.
#[derive(Debug, Clone, Copy)]
struct ChannelStats {
    mean: f64,
    std: f64,
}

fn channel_stats(img: &RgbImage, channel: usize) -> ChannelStats {
    let n = (img.width() * img.height()) as f64;
    if n == 0.0 {
        return ChannelStats { mean: 0.0, std: 0.0 };
    }
    let mean = img.pixels().map(|p| p.0[channel] as f64).sum::<f64>() / n;
    let var = img
        .pixels()
        .map(|p| (p.0[channel] as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    ChannelStats {
        mean,
        std: var.sqrt(),
    }
}

/// Match an image's color distribution to a reference via per-channel
/// mean/std transfer.
///
/// Output dimensions always equal the input's. A reference channel with no
/// variance collapses that channel toward the reference mean.
pub fn match_palette(source: &RgbImage, reference: &RgbImage) -> RgbImage {
    let src_stats: Vec<ChannelStats> = (0..3).map(|c| channel_stats(source, c)).collect();
    let ref_stats: Vec<ChannelStats> = (0..3).map(|c| channel_stats(reference, c)).collect();

    let mut out = RgbImage::new(source.width(), source.height());
    for (x, y, p) in source.enumerate_pixels() {
        let mut graded = [0u8; 3];
        for c in 0..3 {
            let v = p.0[c] as f64;
            let adjusted = if src_stats[c].std > 0.0 {
                (v - src_stats[c].mean) / src_stats[c].std * ref_stats[c].std + ref_stats[c].mean
            } else {
                ref_stats[c].mean
            };
            graded[c] = adjusted.round().clamp(0.0, 255.0) as u8;
        }
        out.put_pixel(x, y, image::Rgb(graded));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_matching_shifts_mean_toward_reference() {
        // Dark source with some variance, bright reference.
        let mut source = RgbImage::new(8, 8);
        for (x, _, p) in source.enumerate_pixels_mut() {
            let v = 30 + (x as u8 * 4);
            *p = Rgb([v, v, v]);
        }
        let mut reference = RgbImage::new(8, 8);
        for (x, _, p) in reference.enumerate_pixels_mut() {
            let v = 180 + (x as u8 * 4);
            *p = Rgb([v, v, v]);
        }

        let graded = match_palette(&source, &reference);
        let mean = graded.pixels().map(|p| p.0[0] as f64).sum::<f64>()
            / (graded.width() * graded.height()) as f64;
        assert!(mean > 150.0, "graded mean was {mean}");
        assert_eq!(graded.dimensions(), source.dimensions());
    }

    #[test]
    fn test_matching_to_self_is_near_identity() {
        let mut img = RgbImage::new(8, 8);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x * 20) as u8, (y * 25) as u8, 100]);
        }
        let graded = match_palette(&img, &img);
        for (a, b) in img.pixels().zip(graded.pixels()) {
            for c in 0..3 {
                assert!((a.0[c] as i16 - b.0[c] as i16).abs() <= 1);
            }
        }
    }

    #[test]
    fn test_flat_source_takes_reference_mean() {
        let source = RgbImage::from_pixel(4, 4, Rgb([10, 10, 10]));
        let reference = RgbImage::from_pixel(4, 4, Rgb([200, 100, 50]));
        let graded = match_palette(&source, &reference);
        let p = graded.get_pixel(0, 0).0;
        assert_eq!(p, [200, 100, 50]);
    }
}
