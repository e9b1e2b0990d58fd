//! Level-of-detail (LOD) tiers for orrery bodies.
//!
//! Each render tick the manager measures every body's distance to the
//! viewer, buckets it into a tier and assigns a quantized detail scalar
//! the renderer can switch meshes on without flickering.
//!
//! # Tiers
//!
//! | Tier | Distance | Detail | Visible |
//! |------|----------|--------|---------|
//! | `Near` | < 8 | 1.0 | yes |
//! | `Medium` | < 20 | 0.6 | yes |
//! | `Far` | < 40 | 0.6 / 0.3 / 0.0 | yes |
//! | `Culled` | ≥ 40, outside the frustum, or size < 0.05 | 0.0 | no |
//!
//! Detail is `clamp((max - d) / max, 0, 1)` snapped to one of
//! `{1.0, 0.6, 0.3, 0.0}`. Tiers are re-evaluated from scratch every
//! update; there is no hysteresis.
//!
//! Frustum tests are throttled: visibility is recomputed only after the
//! viewer moves more than `frustum_move_epsilon` or `frustum_interval_ms`
//! elapses. In between, the cached frustum and per-body visibility are reused.
//!
//! # Usage
//!
//! ```
//! use orrery_logic::lod::{classify_distance, quantize_detail, LodConfig, LodTier};
//!
//! let config = LodConfig::default();
//! assert_eq!(classify_distance(5.0, &config), LodTier::Near);
//! assert_eq!(quantize_detail(0.875), 1.0);
//! ```

use crate::error::{EngineError, Result};
use crate::frustum::Frustum;
use crate::layout::SpatialBody;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Every detail value the manager can emit.
pub const DETAIL_LEVELS: [f32; 4] = [0.0, 0.3, 0.6, 1.0];

/// Distance tier for a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LodTier {
    /// Close to the viewer, or selected. Full fidelity.
    Near,
    Medium,
    Far,
    /// Not drawn.
    Culled,
}

/// Tier thresholds and throttling constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    pub near_distance: f32,
    pub medium_distance: f32,
    pub far_distance: f32,
    /// Distance at which raw detail reaches zero.
    pub max_distance: f32,
    /// Bodies smaller than this are always culled.
    pub min_visible_size: f32,
    /// Viewer movement that forces a frustum recompute.
    pub frustum_move_epsilon: f32,
    /// Elapsed time that forces a frustum recompute.
    pub frustum_interval_ms: u64,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            near_distance: 8.0,
            medium_distance: 20.0,
            far_distance: 40.0,
            max_distance: 40.0,
            min_visible_size: 0.05,
            frustum_move_epsilon: 0.1,
            frustum_interval_ms: 100,
        }
    }
}

impl LodConfig {
    /// Copy with every distance threshold multiplied by `factor`.
    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            near_distance: self.near_distance * factor,
            medium_distance: self.medium_distance * factor,
            far_distance: self.far_distance * factor,
            max_distance: self.max_distance * factor,
            ..self.clone()
        }
    }

    pub fn frustum_interval(&self) -> Duration {
        Duration::from_millis(self.frustum_interval_ms)
    }
}

/// Tier from distance alone.
pub fn classify_distance(distance: f32, config: &LodConfig) -> LodTier {
    if distance < config.near_distance {
        LodTier::Near
    } else if distance < config.medium_distance {
        LodTier::Medium
    } else if distance < config.far_distance {
        LodTier::Far
    } else {
        LodTier::Culled
    }
}

/// Snap a raw detail value onto [`DETAIL_LEVELS`].
pub fn quantize_detail(raw: f32) -> f32 {
    if raw > 0.8 {
        1.0
    } else if raw > 0.4 {
        0.6
    } else if raw > 0.1 {
        0.3
    } else {
        0.0
    }
}

/// Quantized detail for a distance.
pub fn detail_for_distance(distance: f32, config: &LodConfig) -> f32 {
    let max = config.max_distance.max(f32::EPSILON);
    quantize_detail(((max - distance) / max).clamp(0.0, 1.0))
}

/// Camera state for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewerState {
    pub position: Vec3,
    pub frustum: Option<Frustum>,
}

impl ViewerState {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            frustum: None,
        }
    }

    pub fn with_frustum(mut self, frustum: Frustum) -> Self {
        self.frustum = Some(frustum);
        self
    }
}

/// Per-body decision for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LodResult {
    pub id: String,
    pub tier: LodTier,
    /// One of [`DETAIL_LEVELS`].
    pub detail: f32,
    pub visible: bool,
    pub distance: f32,
}

/// Indices into the body slice, grouped by tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LodBuckets {
    pub near: Vec<usize>,
    pub medium: Vec<usize>,
    pub far: Vec<usize>,
    pub culled: Vec<usize>,
}

/// Summary of tier distribution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LodStats {
    pub near_count: usize,
    pub medium_count: usize,
    pub far_count: usize,
    pub culled_count: usize,
}

impl LodStats {
    pub fn total(&self) -> usize {
        self.near_count + self.medium_count + self.far_count + self.culled_count
    }

    pub fn visible(&self) -> usize {
        self.near_count + self.medium_count + self.far_count
    }

    /// Estimated relative render cost (near = 1.0 per body).
    ///
    /// Medium ≈ 0.5, far ≈ 0.1, culled = 0.
    pub fn estimated_cost(&self) -> f64 {
        self.near_count as f64 + self.medium_count as f64 * 0.5 + self.far_count as f64 * 0.1
    }
}

/// Partition results into per-tier index buckets.
pub fn partition_by_tier(results: &[LodResult]) -> (LodBuckets, LodStats) {
    let mut buckets = LodBuckets::default();
    for (i, r) in results.iter().enumerate() {
        match r.tier {
            LodTier::Near => buckets.near.push(i),
            LodTier::Medium => buckets.medium.push(i),
            LodTier::Far => buckets.far.push(i),
            LodTier::Culled => buckets.culled.push(i),
        }
    }
    let stats = LodStats {
        near_count: buckets.near.len(),
        medium_count: buckets.medium.len(),
        far_count: buckets.far.len(),
        culled_count: buckets.culled.len(),
    };
    (buckets, stats)
}

/// Everything one `update` produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LodFrame {
    /// One entry per body, in body order.
    pub results: Vec<LodResult>,
    pub buckets: LodBuckets,
    pub stats: LodStats,
    /// Set when this is a reused frame because the viewer state was invalid.
    pub stale: bool,
}

impl LodFrame {
    pub fn get(&self, id: &str) -> Option<&LodResult> {
        self.results.iter().find(|r| r.id == id)
    }
}

#[derive(Debug)]
struct FrustumCache {
    frustum: Frustum,
    position: Vec3,
    at: Duration,
    visibility: HashMap<String, bool>,
}

/// Stateful per-tick LOD evaluator.
#[derive(Debug, Default)]
pub struct LevelOfDetailManager {
    config: LodConfig,
    selected: Option<String>,
    frustum_cache: Option<FrustumCache>,
    last_frame: Option<LodFrame>,
    frustum_recomputes: u64,
}

impl LevelOfDetailManager {
    pub fn new(config: LodConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    /// Replace the thresholds. The frustum cache is kept.
    pub fn set_config(&mut self, config: LodConfig) {
        self.config = config;
    }

    /// Pin a body to full detail regardless of distance.
    pub fn select(&mut self, id: impl Into<String>) {
        self.selected = Some(id.into());
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// How many times frustum visibility has been recomputed.
    pub fn frustum_recompute_count(&self) -> u64 {
        self.frustum_recomputes
    }

    pub fn last_frame(&self) -> Option<&LodFrame> {
        self.last_frame.as_ref()
    }

    /// Evaluate every body for this tick.
    ///
    /// A non-finite viewer position returns the previous frame marked
    /// `stale`, or [`EngineError::InvalidViewerState`] on the first tick.
    pub fn update(
        &mut self,
        bodies: &[SpatialBody],
        viewer: &ViewerState,
        now: Duration,
    ) -> Result<LodFrame> {
        if !viewer.position.is_finite() {
            return match &self.last_frame {
                Some(prev) => {
                    log::debug!(
                        "non-finite viewer position {:?}; reusing previous frame",
                        viewer.position
                    );
                    let mut frame = prev.clone();
                    frame.stale = true;
                    Ok(frame)
                }
                None => Err(EngineError::InvalidViewerState(format!(
                    "non-finite position {:?}",
                    viewer.position
                ))),
            };
        }

        let frustum = match viewer.frustum {
            Some(f) if !f.is_finite() => {
                log::warn!("ignoring non-finite frustum planes");
                None
            }
            other => other,
        };
        self.refresh_frustum(frustum, viewer.position, now);

        let results: Vec<LodResult> = bodies
            .iter()
            .map(|body| self.evaluate(body, viewer.position))
            .collect();
        let (buckets, stats) = partition_by_tier(&results);
        let frame = LodFrame {
            results,
            buckets,
            stats,
            stale: false,
        };
        self.last_frame = Some(frame.clone());
        Ok(frame)
    }

    fn refresh_frustum(&mut self, frustum: Option<Frustum>, position: Vec3, now: Duration) {
        let Some(frustum) = frustum else {
            self.frustum_cache = None;
            return;
        };
        let recompute = match &self.frustum_cache {
            None => true,
            Some(cache) => {
                now < cache.at
                    || now - cache.at > self.config.frustum_interval()
                    || cache.position.distance(position) > self.config.frustum_move_epsilon
            }
        };
        if recompute {
            log::debug!("recomputing frustum visibility at {:?}", now);
            self.frustum_recomputes += 1;
            self.frustum_cache = Some(FrustumCache {
                frustum,
                position,
                at: now,
                visibility: HashMap::new(),
            });
        }
    }

    fn evaluate(&mut self, body: &SpatialBody, viewer: Vec3) -> LodResult {
        let distance = body.position.distance(viewer);

        if self.selected.as_deref() == Some(body.id.as_str()) {
            return LodResult {
                id: body.id.clone(),
                tier: LodTier::Near,
                detail: 1.0,
                visible: true,
                distance,
            };
        }

        let mut tier = if body.size < self.config.min_visible_size {
            LodTier::Culled
        } else {
            classify_distance(distance, &self.config)
        };

        if tier != LodTier::Culled {
            if let Some(cache) = &mut self.frustum_cache {
                let frustum = cache.frustum;
                let inside = *cache
                    .visibility
                    .entry(body.id.clone())
                    .or_insert_with(|| frustum.contains_sphere(body.position, body.size));
                if !inside {
                    tier = LodTier::Culled;
                }
            }
        }

        let detail = if tier == LodTier::Culled {
            0.0
        } else {
            detail_for_distance(distance, &self.config)
        };
        LodResult {
            id: body.id.clone(),
            tier,
            detail,
            visible: tier != LodTier::Culled,
            distance,
        }
    }
}
