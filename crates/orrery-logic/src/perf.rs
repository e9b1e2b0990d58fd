//! Frame-time monitoring and adaptive quality.
//!
//! The renderer reports each frame's duration; the monitor keeps a rolling
//! window and recommends a quality level. Lower quality shrinks every LOD
//! distance threshold so fewer bodies land in the expensive tiers.

use crate::lod::LodConfig;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Coarse render quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QualityLevel {
    High,
    Medium,
    Low,
}

impl QualityLevel {
    /// Multiplier applied to LOD distances at this quality.
    pub fn distance_scale(self) -> f32 {
        match self {
            QualityLevel::High => 1.0,
            QualityLevel::Medium => 0.75,
            QualityLevel::Low => 0.5,
        }
    }

    /// `base` with distances scaled for this quality.
    pub fn apply(self, base: &LodConfig) -> LodConfig {
        base.scaled(self.distance_scale())
    }
}

/// Thresholds for the quality recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerfConfig {
    /// Number of frames in the rolling window.
    pub window: usize,
    /// Average frame time above which quality drops to `Medium`.
    pub medium_above_ms: f64,
    /// Average frame time above which quality drops to `Low`.
    pub low_above_ms: f64,
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            window: 60,
            medium_above_ms: 1000.0 / 50.0, // below 50 fps
            low_above_ms: 1000.0 / 30.0,    // below 30 fps
        }
    }
}

/// Rolling frame-time window.
#[derive(Debug, Clone)]
pub struct FrameMonitor {
    config: PerfConfig,
    samples: VecDeque<Duration>,
    total: Duration,
}

impl Default for FrameMonitor {
    fn default() -> Self {
        Self::new(PerfConfig::default())
    }
}

impl FrameMonitor {
    pub fn new(config: PerfConfig) -> Self {
        let cap = config.window.max(1);
        Self {
            config,
            samples: VecDeque::with_capacity(cap),
            total: Duration::ZERO,
        }
    }

    /// Record one frame's duration, evicting the oldest past the window.
    pub fn record(&mut self, frame: Duration) {
        if self.samples.len() >= self.config.window.max(1) {
            if let Some(old) = self.samples.pop_front() {
                self.total -= old;
            }
        }
        self.samples.push_back(frame);
        self.total += frame;
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Mean frame time in milliseconds, 0 with no samples.
    pub fn average_frame_ms(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.total.as_secs_f64() * 1000.0 / self.samples.len() as f64
    }

    /// Frames per second implied by the mean, 0 with no samples.
    pub fn fps(&self) -> f64 {
        let avg = self.average_frame_ms();
        if avg <= 0.0 {
            0.0
        } else {
            1000.0 / avg
        }
    }

    /// Slowest frame in the window.
    pub fn worst_frame(&self) -> Duration {
        self.samples.iter().copied().max().unwrap_or(Duration::ZERO)
    }

    /// Quality the current average supports. `High` until the window has data.
    pub fn recommended_quality(&self) -> QualityLevel {
        let avg = self.average_frame_ms();
        if avg > self.config.low_above_ms {
            QualityLevel::Low
        } else if avg > self.config.medium_above_ms {
            QualityLevel::Medium
        } else {
            QualityLevel::High
        }
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.total = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn empty_monitor_recommends_high() {
        let m = FrameMonitor::default();
        assert_eq!(m.average_frame_ms(), 0.0);
        assert_eq!(m.fps(), 0.0);
        assert_eq!(m.recommended_quality(), QualityLevel::High);
    }

    #[test]
    fn average_and_fps() {
        let mut m = FrameMonitor::default();
        for _ in 0..10 {
            m.record(ms(16));
        }
        assert!((m.average_frame_ms() - 16.0).abs() < 1e-9);
        assert!((m.fps() - 62.5).abs() < 1e-9);
        assert_eq!(m.recommended_quality(), QualityLevel::High);
    }

    #[test]
    fn window_evicts_oldest() {
        let mut m = FrameMonitor::new(PerfConfig {
            window: 3,
            ..PerfConfig::default()
        });
        m.record(ms(100));
        m.record(ms(10));
        m.record(ms(10));
        m.record(ms(10));
        assert_eq!(m.sample_count(), 3);
        assert!((m.average_frame_ms() - 10.0).abs() < 1e-9);
        assert_eq!(m.worst_frame(), ms(10));
    }

    #[test]
    fn slow_frames_degrade_quality() {
        let mut m = FrameMonitor::default();
        for _ in 0..60 {
            m.record(ms(25));
        }
        assert_eq!(m.recommended_quality(), QualityLevel::Medium);
        for _ in 0..60 {
            m.record(ms(50));
        }
        assert_eq!(m.recommended_quality(), QualityLevel::Low);
        m.reset();
        assert_eq!(m.recommended_quality(), QualityLevel::High);
    }

    #[test]
    fn quality_scales_lod_distances() {
        let base = LodConfig::default();
        assert_eq!(QualityLevel::High.apply(&base), base);
        let low = QualityLevel::Low.apply(&base);
        assert_eq!(low.near_distance, 4.0);
        assert_eq!(low.far_distance, 20.0);
        assert_eq!(low.frustum_interval_ms, base.frustum_interval_ms);
    }
}
