//! Session-level façade tying the pipeline together.
//!
//! An [`OrreryScene`] owns everything that outlives a single call: the
//! attribute caches, the last good layout, the LOD manager and the frame
//! monitor. A rejected snapshot never replaces the current layout, so the
//! render loop always has something to draw.
//!
//! ```
//! use orrery_logic::config::EngineConfig;
//! use orrery_logic::lod::ViewerState;
//! use orrery_logic::node::GovernanceNode;
//! use orrery_logic::scene::OrreryScene;
//! use glam::Vec3;
//! use std::time::Duration;
//!
//! let root = GovernanceNode {
//!     id: "root".into(),
//!     root_path: vec![],
//!     children_ids: vec![],
//!     economic_weight: Default::default(),
//!     origin_key: "token".into(),
//! };
//! let mut scene = OrreryScene::new(EngineConfig::default());
//! scene.apply_snapshot(&[root]).unwrap();
//! scene.advance_to(1.5);
//! let frame = scene
//!     .update_lod(&ViewerState::at(Vec3::new(0.0, 0.0, 5.0)), Duration::ZERO)
//!     .unwrap();
//! assert_eq!(frame.results.len(), 1);
//! ```

use crate::attributes::AttributeGenerator;
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::hierarchy::{resolve, HierarchyAnomaly};
use crate::layout::{self, SceneLayout};
use crate::lod::{LevelOfDetailManager, LodFrame, ViewerState};
use crate::node::GovernanceNode;
use crate::perf::{FrameMonitor, QualityLevel};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Content hash of a snapshot, used to skip redundant relayouts.
pub fn snapshot_fingerprint(nodes: &[GovernanceNode]) -> u64 {
    let mut hasher = DefaultHasher::new();
    nodes.hash(&mut hasher);
    hasher.finish()
}

pub struct OrreryScene {
    config: EngineConfig,
    attributes: AttributeGenerator,
    layout: Option<SceneLayout>,
    fingerprint: Option<u64>,
    anomalies: Vec<HierarchyAnomaly>,
    lod: LevelOfDetailManager,
    monitor: FrameMonitor,
    quality: QualityLevel,
}

impl OrreryScene {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            attributes: AttributeGenerator::with_capacity(config.attribute_cache_capacity),
            lod: LevelOfDetailManager::new(config.lod.clone()),
            monitor: FrameMonitor::new(config.perf.clone()),
            layout: None,
            fingerprint: None,
            anomalies: Vec::new(),
            quality: QualityLevel::High,
            config,
        }
    }

    /// Lay out a new snapshot.
    ///
    /// Identical snapshots are not recomputed. On error the previous layout
    /// stays in place and the error is returned for the caller to surface.
    pub fn apply_snapshot(&mut self, nodes: &[GovernanceNode]) -> Result<&SceneLayout> {
        let fingerprint = snapshot_fingerprint(nodes);
        if self.fingerprint == Some(fingerprint) && self.layout.is_some() {
            log::debug!("snapshot unchanged; keeping current layout");
        } else {
            match self.build(nodes) {
                Ok((mut next, anomalies)) => {
                    // Keep orbital time continuous across snapshots.
                    if let Some(prev) = &self.layout {
                        next.advance_to(prev.time());
                    }
                    self.layout = Some(next);
                    self.fingerprint = Some(fingerprint);
                    self.anomalies = anomalies;
                }
                Err(e) => {
                    log::warn!(
                        "rejected snapshot of {} nodes ({}); keeping previous layout",
                        nodes.len(),
                        e
                    );
                    return Err(e);
                }
            }
        }
        self.layout.as_ref().ok_or(EngineError::NoRootNode)
    }

    fn build(&mut self, nodes: &[GovernanceNode]) -> Result<(SceneLayout, Vec<HierarchyAnomaly>)> {
        let index = resolve(nodes, self.config.orphan_policy)?;
        let scene_layout = layout::layout(&index, &mut self.attributes, &self.config.layout)?;
        Ok((scene_layout, index.anomalies().to_vec()))
    }

    /// Last successfully computed layout.
    pub fn layout(&self) -> Option<&SceneLayout> {
        self.layout.as_ref()
    }

    /// Anomalies recorded while resolving the current layout.
    pub fn anomalies(&self) -> &[HierarchyAnomaly] {
        &self.anomalies
    }

    /// Move every body to its analytic position at orbital time `t`.
    pub fn advance_to(&mut self, t: f32) {
        if let Some(layout) = &mut self.layout {
            layout.advance_to(t);
        }
    }

    /// Run one LOD tick against the current layout. With no layout the
    /// frame is empty.
    pub fn update_lod(&mut self, viewer: &ViewerState, now: Duration) -> Result<LodFrame> {
        let bodies = self.layout.as_ref().map_or(&[][..], |l| l.bodies());
        self.lod.update(bodies, viewer, now)
    }

    pub fn select(&mut self, id: impl Into<String>) {
        self.lod.select(id);
    }

    pub fn clear_selection(&mut self) {
        self.lod.clear_selection();
    }

    /// Feed one frame time; returns the quality now in effect. A change in
    /// quality rescales the LOD distances.
    pub fn record_frame(&mut self, frame: Duration) -> QualityLevel {
        self.monitor.record(frame);
        let recommended = self.monitor.recommended_quality();
        if recommended != self.quality {
            log::info!(
                "render quality {:?} -> {:?} (avg {:.1} ms)",
                self.quality,
                recommended,
                self.monitor.average_frame_ms()
            );
            self.quality = recommended;
            self.lod.set_config(recommended.apply(&self.config.lod));
        }
        self.quality
    }

    pub fn quality(&self) -> QualityLevel {
        self.quality
    }

    pub fn monitor(&self) -> &FrameMonitor {
        &self.monitor
    }

    pub fn lod(&self) -> &LevelOfDetailManager {
        &self.lod
    }

    pub fn attributes(&self) -> &AttributeGenerator {
        &self.attributes
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

impl Default for OrreryScene {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::OrphanPolicy;
    use crate::lod::LodTier;
    use crate::node::EconomicWeight;
    use glam::Vec3;

    fn node(id: &str, path: &[&str], members: u32) -> GovernanceNode {
        GovernanceNode {
            id: id.to_string(),
            root_path: path.iter().map(|s| s.to_string()).collect(),
            children_ids: vec![],
            economic_weight: EconomicWeight {
                supply: 1_000,
                member_count: members,
                inflation_rate: 0,
            },
            origin_key: "token".to_string(),
        }
    }

    fn snapshot() -> Vec<GovernanceNode> {
        vec![
            node("root", &[], 10),
            node("a", &["root"], 4),
            node("a1", &["root", "a"], 2),
        ]
    }

    #[test]
    fn empty_snapshot_keeps_previous_layout() {
        let mut scene = OrreryScene::default();
        let before = scene.apply_snapshot(&snapshot()).unwrap().bodies().to_vec();

        let err = scene.apply_snapshot(&[]).unwrap_err();
        assert_eq!(err, EngineError::NoRootNode);
        assert_eq!(scene.layout().unwrap().bodies(), before.as_slice());
    }

    #[test]
    fn malformed_snapshot_keeps_previous_layout() {
        let mut scene = OrreryScene::default();
        scene.apply_snapshot(&snapshot()).unwrap();
        let bad = vec![node("r1", &[], 1), node("r2", &[], 1)];
        assert!(matches!(
            scene.apply_snapshot(&bad),
            Err(EngineError::MalformedHierarchy(_))
        ));
        assert_eq!(scene.layout().unwrap().len(), 3);
    }

    #[test]
    fn first_snapshot_failure_leaves_no_layout() {
        let mut scene = OrreryScene::default();
        assert!(scene.apply_snapshot(&[]).is_err());
        assert!(scene.layout().is_none());
        let frame = scene
            .update_lod(&ViewerState::at(Vec3::ZERO), Duration::ZERO)
            .unwrap();
        assert!(frame.results.is_empty());
    }

    #[test]
    fn unchanged_snapshot_is_not_recomputed() {
        let mut scene = OrreryScene::default();
        scene.apply_snapshot(&snapshot()).unwrap();
        scene.advance_to(42.0);
        // A fresh layout would be back at t = 0; an untouched one stays at 42.
        let layout = scene.apply_snapshot(&snapshot()).unwrap();
        assert_eq!(layout.time(), 42.0);
    }

    #[test]
    fn new_snapshot_continues_orbital_time() {
        let mut scene = OrreryScene::default();
        scene.apply_snapshot(&snapshot()).unwrap();
        scene.advance_to(7.0);
        let mut next = snapshot();
        next.push(node("b", &["root"], 9));
        let layout = scene.apply_snapshot(&next).unwrap();
        assert_eq!(layout.len(), 4);
        assert_eq!(layout.time(), 7.0);
        let expected = layout.positions_at(7.0);
        let stored: Vec<Vec3> = layout.bodies().iter().map(|b| b.position).collect();
        assert_eq!(stored, expected);
    }

    #[test]
    fn reattach_policy_records_anomalies() {
        let mut config = EngineConfig::default();
        config.orphan_policy = OrphanPolicy::Reattach;
        let mut scene = OrreryScene::new(config);
        let mut nodes = snapshot();
        nodes.push(node("lost", &["root", "ghost"], 1));
        scene.apply_snapshot(&nodes).unwrap();
        assert_eq!(scene.anomalies().len(), 1);
        assert_eq!(scene.layout().unwrap().get("lost").unwrap().parent_id.as_deref(), Some("root"));
    }

    #[test]
    fn selection_flows_through_to_lod() {
        let mut scene = OrreryScene::default();
        scene.apply_snapshot(&snapshot()).unwrap();
        scene.select("a1");
        let far = ViewerState::at(Vec3::new(1_000.0, 0.0, 0.0));
        let frame = scene.update_lod(&far, Duration::ZERO).unwrap();
        assert_eq!(frame.get("a1").unwrap().tier, LodTier::Near);
        assert_eq!(frame.get("root").unwrap().tier, LodTier::Culled);
        scene.clear_selection();
        let frame = scene.update_lod(&far, Duration::from_millis(16)).unwrap();
        assert_eq!(frame.stats.culled_count, 3);
    }

    #[test]
    fn slow_frames_shrink_lod_distances() {
        let mut scene = OrreryScene::default();
        assert_eq!(scene.record_frame(Duration::from_millis(10)), QualityLevel::High);
        let mut quality = QualityLevel::High;
        for _ in 0..120 {
            quality = scene.record_frame(Duration::from_millis(60));
        }
        assert_eq!(quality, QualityLevel::Low);
        assert_eq!(scene.lod().config().near_distance, 4.0);
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = snapshot();
        let mut b = snapshot();
        assert_eq!(snapshot_fingerprint(&a), snapshot_fingerprint(&b));
        b[1].economic_weight.member_count += 1;
        assert_ne!(snapshot_fingerprint(&a), snapshot_fingerprint(&b));
    }
}
