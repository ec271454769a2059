//! Engine configuration.

use shotflow_media::DEFAULT_MIN_DEPTH_VARIANCE;

/// Tunables for the orchestration services.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Total attempts for a versioned persist (including the first).
    pub persist_attempts: u32,
    /// Candidate frames sampled when picking a representative frame.
    pub frame_candidates: u32,
    /// How far from the end of a video the bridge frame is taken (seconds).
    pub bridge_tail_offset_secs: f64,
    /// Minimum normalized-depth variance for a usable scene proxy.
    pub min_depth_variance: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            persist_attempts: 3,
            frame_candidates: 5,
            bridge_tail_offset_secs: 0.25,
            min_depth_variance: DEFAULT_MIN_DEPTH_VARIANCE,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            persist_attempts: env_parse("SHOTFLOW_PERSIST_ATTEMPTS", defaults.persist_attempts),
            frame_candidates: env_parse("SHOTFLOW_FRAME_CANDIDATES", defaults.frame_candidates),
            bridge_tail_offset_secs: env_parse(
                "SHOTFLOW_BRIDGE_TAIL_OFFSET_SECS",
                defaults.bridge_tail_offset_secs,
            ),
            min_depth_variance: env_parse(
                "SHOTFLOW_MIN_DEPTH_VARIANCE",
                defaults.min_depth_variance,
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
