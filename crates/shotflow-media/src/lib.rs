//! Frame extraction, pixel analysis and depth-proxy rendering.
//!
//! This crate owns everything that touches raw pixels or the ffmpeg
//! binaries: the [`FrameGrabber`] seam (with its ffmpeg implementation),
//! histogram and sharpness analysis, palette grading, the luminance depth
//! fallback and the depth-parallax proxy renderer.

pub mod analysis;
pub mod command;
pub mod depth;
pub mod error;
pub mod frame;
pub mod grading;
pub mod proxy;

pub use analysis::{cosine_similarity, histogram_correlation, sharpness};
pub use depth::{DepthMap, DEFAULT_MIN_DEPTH_VARIANCE};
pub use error::{MediaError, MediaResult};
pub use frame::{decode_rgb, encode_png, FfmpegFrameGrabber, FrameGrabber};
pub use grading::match_palette;
pub use proxy::{render_parallax, ProxyFrames};
