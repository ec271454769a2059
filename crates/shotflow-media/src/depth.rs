//! Depth maps and the local luminance fallback.

use image::{GrayImage, RgbImage};

use crate::error::{MediaError, MediaResult};

/// Minimum normalized-depth variance for a usable parallax proxy.
///
/// Below this the frame carries too little depth structure to re-render
/// from an adjusted pose.
pub const DEFAULT_MIN_DEPTH_VARIANCE: f32 = 0.005;

/// A normalized depth map. Values lie in [0, 1]; 1.0 is nearest to the
/// camera (disparity convention, matching depth-estimation model output).
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DepthMap {
    /// Build from raw values, renormalizing to span [0, 1].
    pub fn from_raw(width: u32, height: u32, data: Vec<f32>) -> MediaResult<Self> {
        if data.len() != (width * height) as usize {
            return Err(MediaError::dimension_mismatch(format!(
                "depth buffer has {} values for {}x{}",
                data.len(),
                width,
                height
            )));
        }
        let mut map = Self {
            width,
            height,
            data,
        };
        map.normalize();
        Ok(map)
    }

    /// Luminance-based fallback: treat brighter pixels as nearer. Crude,
    /// but deterministic and dependency-free when no depth estimator is
    /// configured.
    pub fn from_luminance(img: &RgbImage) -> Self {
        let data = img
            .pixels()
            .map(|p| {
                (0.299 * p.0[0] as f32 + 0.587 * p.0[1] as f32 + 0.114 * p.0[2] as f32) / 255.0
            })
            .collect();
        let mut map = Self {
            width: img.width(),
            height: img.height(),
            data,
        };
        map.normalize();
        map
    }

    /// Decode from an 8-bit grayscale depth image (255 = near).
    pub fn from_gray_image(img: &GrayImage) -> Self {
        let data = img.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
        let mut map = Self {
            width: img.width(),
            height: img.height(),
            data,
        };
        map.normalize();
        map
    }

    /// Encode as an 8-bit grayscale image for storage.
    pub fn to_gray_image(&self) -> GrayImage {
        let mut img = GrayImage::new(self.width, self.height);
        for (i, p) in img.pixels_mut().enumerate() {
            p.0[0] = (self.data[i] * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        img
    }

    fn normalize(&mut self) {
        let (mut min, mut max) = (f32::INFINITY, f32::NEG_INFINITY);
        for v in &self.data {
            min = min.min(*v);
            max = max.max(*v);
        }
        let range = max - min;
        if range <= f32::EPSILON {
            for v in self.data.iter_mut() {
                *v = 0.5;
            }
            return;
        }
        for v in self.data.iter_mut() {
            *v = (*v - min) / range;
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Normalized depth at a pixel.
    pub fn at(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    /// Variance of the normalized depth values.
    pub fn variance(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let n = self.data.len() as f64;
        let mean = self.data.iter().map(|v| *v as f64).sum::<f64>() / n;
        (self
            .data
            .iter()
            .map(|v| (*v as f64 - mean).powi(2))
            .sum::<f64>()
            / n) as f32
    }

    /// True when the map carries enough structure for parallax rendering.
    pub fn has_sufficient_variance(&self, minimum: f32) -> bool {
        self.variance() >= minimum
    }
}
