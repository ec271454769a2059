//! Depth-parallax re-rendering of a single reference frame.

use image::RgbImage;

use shotflow_models::CameraPose;

use crate::depth::DepthMap;
use crate::error::{MediaError, MediaResult};

/// Pixel shift per unit of yaw/pitch, as a fraction of frame size.
pub const PARALLAX_SCALE: f32 = 0.05;

/// Number of depth buckets processed near-to-far.
pub const DEPTH_BUCKETS: usize = 256;

/// Number of neighbor-fill passes over unwritten destination pixels.
const HOLE_FILL_PASSES: usize = 2;

/// A scene proxy's pixel data: the reference frame plus its depth map.
#[derive(Debug, Clone)]
pub struct ProxyFrames {
    pub reference: RgbImage,
    pub depth: DepthMap,
}

impl ProxyFrames {
    pub fn new(reference: RgbImage, depth: DepthMap) -> MediaResult<Self> {
        if reference.width() != depth.width() || reference.height() != depth.height() {
            return Err(MediaError::dimension_mismatch(format!(
                "reference is {}x{} but depth map is {}x{}",
                reference.width(),
                reference.height(),
                depth.width(),
                depth.height()
            )));
        }
        Ok(Self { reference, depth })
    }
}

/// Re-render the reference frame from an adjusted virtual camera pose.
///
/// Pixels are splatted in 256 depth buckets from near to far; each pixel
/// shifts horizontally by `(0.5 - depth_norm) * yaw * width * scale` and
/// vertically by `(0.5 - depth_norm) * pitch * height * scale`, where
/// `depth_norm` is 0 at the nearest plane. Destination writes go through a
/// z-buffer so nearer content occludes farther content, then unwritten
/// pixels are filled from written neighbors in two passes.
///
/// Roll and dolly are carried on [`CameraPose`] for forward compatibility
/// and are not applied by this renderer.
///
/// The identity pose (`yaw: 0, pitch: 0`) reproduces the reference frame
/// exactly.
pub fn render_parallax(frames: &ProxyFrames, pose: &CameraPose) -> MediaResult<RgbImage> {
    let w = frames.reference.width();
    let h = frames.reference.height();
    let mut out = RgbImage::new(w, h);
    let mut z_buffer = vec![f32::NEG_INFINITY; (w * h) as usize];
    let mut written = vec![false; (w * h) as usize];

    // Bucket pixel indices by quantized depth, nearest bucket first.
    let mut buckets: Vec<Vec<u32>> = vec![Vec::new(); DEPTH_BUCKETS];
    for y in 0..h {
        for x in 0..w {
            let near = frames.depth.at(x, y);
            let depth_norm = 1.0 - near;
            let bucket = ((depth_norm * (DEPTH_BUCKETS - 1) as f32) as usize)
                .min(DEPTH_BUCKETS - 1);
            buckets[bucket].push(y * w + x);
        }
    }

    for bucket in &buckets {
        for &idx in bucket {
            let x = idx % w;
            let y = idx / w;
            let near = frames.depth.at(x, y);
            let depth_norm = 1.0 - near;

            let dx = (0.5 - depth_norm) * pose.yaw * w as f32 * PARALLAX_SCALE;
            let dy = (0.5 - depth_norm) * pose.pitch * h as f32 * PARALLAX_SCALE;

            let tx = x as i64 + dx.round() as i64;
            let ty = y as i64 + dy.round() as i64;
            if tx < 0 || ty < 0 || tx >= w as i64 || ty >= h as i64 {
                continue;
            }

            let target = (ty as u32 * w + tx as u32) as usize;
            if near > z_buffer[target] {
                z_buffer[target] = near;
                written[target] = true;
                out.put_pixel(tx as u32, ty as u32, *frames.reference.get_pixel(x, y));
            }
        }
    }

    fill_holes(&mut out, &mut written, w, h);
    Ok(out)
}

/// Average written neighbors into unwritten pixels, repeated
/// `HOLE_FILL_PASSES` times. Pixels with no written neighbor stay black
/// until a later pass reaches them.
fn fill_holes(out: &mut RgbImage, written: &mut [bool], w: u32, h: u32) {
    for _ in 0..HOLE_FILL_PASSES {
        let snapshot = written.to_vec();
        let source = out.clone();

        for y in 0..h {
            for x in 0..w {
                let idx = (y * w + x) as usize;
                if snapshot[idx] {
                    continue;
                }

                let mut sum = [0u32; 3];
                let mut count = 0u32;
                for ny in y.saturating_sub(1)..=(y + 1).min(h - 1) {
                    for nx in x.saturating_sub(1)..=(x + 1).min(w - 1) {
                        let nidx = (ny * w + nx) as usize;
                        if nidx == idx || !snapshot[nidx] {
                            continue;
                        }
                        let p = source.get_pixel(nx, ny).0;
                        for c in 0..3 {
                            sum[c] += p[c] as u32;
                        }
                        count += 1;
                    }
                }

                if count > 0 {
                    out.put_pixel(
                        x,
                        y,
                        image::Rgb([
                            (sum[0] / count) as u8,
                            (sum[1] / count) as u8,
                            (sum[2] / count) as u8,
                        ]),
                    );
                    written[idx] = true;
                }
            }
        }
    }
}
