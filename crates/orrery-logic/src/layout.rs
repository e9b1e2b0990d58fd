//! Orbital layout of a resolved hierarchy.
//!
//! The root sits at the origin. Branches (depth 1) orbit the root on rings
//! that widen with sibling index; leaves orbit their parent on tighter
//! rings that start just outside the parent's surface. Sizes grow with the
//! log of supply and member count.
//!
//! | Class | Radius | Speed | Size clamp |
//! |-------|--------|-------|------------|
//! | Root | 0 | 0 | 1.0–3.0 |
//! | Branch | `3 + i·max(1.5, 10/N)` | `max(0.001, 0.05/√r)` | 0.3–2.0 |
//! | Leaf | `parent.size·1.5 + j·0.8` | `max(0.001, 0.15/√r)` | 0.1–0.8 |
//!
//! Positions over time are analytic: a body's live position is its
//! parent's live position plus a point on its orbit at angle
//! `orbit_angle + t·orbit_speed`. Nothing accumulates between frames, so
//! any time can be replayed exactly.

use crate::attributes::{rolling_hash, AttributeGenerator, ProceduralCharacteristics};
use crate::error::{EngineError, Result};
use crate::hierarchy::{DepthClass, HierarchyIndex};
use crate::node::{EconomicWeight, GovernanceNode};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f32::consts::TAU;

/// Affine size rule on log-scaled economics, clamped to `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SizeRule {
    pub base: f32,
    pub supply_weight: f32,
    pub member_weight: f32,
    pub min: f32,
    pub max: f32,
}

impl SizeRule {
    pub fn size(&self, weight: &EconomicWeight) -> f32 {
        (self.base
            + self.supply_weight * weight.log_supply()
            + self.member_weight * weight.log_members())
        .clamp(self.min, self.max)
    }
}

/// Tunable layout constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Radius of the innermost branch orbit.
    pub branch_base_radius: f32,
    /// Lower bound on the gap between branch orbits.
    pub branch_min_spacing: f32,
    /// Total radial spread shared among branches (`spacing = spread / N`).
    pub branch_spread: f32,
    pub branch_speed_constant: f32,
    /// Leaf orbits start at `parent.size * leaf_radius_factor`.
    pub leaf_radius_factor: f32,
    pub leaf_spacing: f32,
    pub leaf_speed_constant: f32,
    pub min_orbit_speed: f32,
    /// Per-instance jitter passed to `vary`.
    pub jitter_amount: f32,
    /// Largest orbit inclination factor (vertical / horizontal amplitude).
    pub max_tilt: f32,
    pub root_size: SizeRule,
    pub branch_size: SizeRule,
    pub leaf_size: SizeRule,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            branch_base_radius: 3.0,
            branch_min_spacing: 1.5,
            branch_spread: 10.0,
            branch_speed_constant: 0.05,
            leaf_radius_factor: 1.5,
            leaf_spacing: 0.8,
            leaf_speed_constant: 0.15,
            min_orbit_speed: 0.001,
            jitter_amount: 0.2,
            max_tilt: 0.08,
            root_size: SizeRule {
                base: 1.0,
                supply_weight: 0.15,
                member_weight: 0.25,
                min: 1.0,
                max: 3.0,
            },
            branch_size: SizeRule {
                base: 0.3,
                supply_weight: 0.08,
                member_weight: 0.4,
                min: 0.3,
                max: 2.0,
            },
            leaf_size: SizeRule {
                base: 0.1,
                supply_weight: 0.04,
                member_weight: 0.2,
                min: 0.1,
                max: 0.8,
            },
        }
    }
}

impl LayoutConfig {
    /// Gap between successive branch orbits for `n` branches.
    pub fn branch_spacing(&self, n: usize) -> f32 {
        self.branch_min_spacing
            .max(self.branch_spread / n.max(1) as f32)
    }

    pub fn size_rule(&self, class: DepthClass) -> &SizeRule {
        match class {
            DepthClass::Root => &self.root_size,
            DepthClass::Branch => &self.branch_size,
            DepthClass::Leaf => &self.leaf_size,
        }
    }

    /// Angular speed for an orbit: slower further out.
    pub fn orbit_speed(&self, class: DepthClass, radius: f32) -> f32 {
        let k = match class {
            DepthClass::Root => return 0.0,
            DepthClass::Branch => self.branch_speed_constant,
            DepthClass::Leaf => self.leaf_speed_constant,
        };
        (k / radius.max(f32::EPSILON).sqrt()).max(self.min_orbit_speed)
    }
}

/// A positioned, attributed body ready for LOD and rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialBody {
    pub id: String,
    /// Lineage key the characteristics were seeded from.
    pub origin_key: String,
    pub depth_class: DepthClass,
    pub parent_id: Option<String>,
    /// Absolute position at the layout's current time.
    pub position: Vec3,
    pub orbit_radius: f32,
    /// Phase at t = 0, radians.
    pub orbit_angle: f32,
    /// Radians per unit of orbital time.
    pub orbit_speed: f32,
    /// Vertical amplitude as a fraction of the radius.
    pub orbit_tilt: f32,
    pub size: f32,
    pub characteristics: ProceduralCharacteristics,
}

impl SpatialBody {
    /// Offset from the parent at orbital time `t`.
    pub fn local_offset_at(&self, t: f32) -> Vec3 {
        if self.depth_class == DepthClass::Root {
            return Vec3::ZERO;
        }
        let theta = self.orbit_angle + t * self.orbit_speed;
        let (sin, cos) = theta.sin_cos();
        Vec3::new(
            cos * self.orbit_radius,
            sin * self.orbit_radius * self.orbit_tilt,
            sin * self.orbit_radius,
        )
    }
}

/// The full set of bodies for one snapshot, parents before children.
#[derive(Debug, Clone, Default)]
pub struct SceneLayout {
    bodies: Vec<SpatialBody>,
    parents: Vec<Option<usize>>,
    by_id: HashMap<String, usize>,
    time: f32,
}

impl SceneLayout {
    pub fn bodies(&self) -> &[SpatialBody] {
        &self.bodies
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&SpatialBody> {
        self.index_of(id).map(|i| &self.bodies[i])
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.by_id.get(id).copied()
    }

    pub fn root(&self) -> Option<&SpatialBody> {
        self.bodies.first()
    }

    /// Index of each body's parent within [`bodies`](Self::bodies).
    pub fn parent_indices(&self) -> &[Option<usize>] {
        &self.parents
    }

    pub fn count_of(&self, class: DepthClass) -> usize {
        self.bodies
            .iter()
            .filter(|b| b.depth_class == class)
            .count()
    }

    /// Orbital time the stored positions correspond to.
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Live absolute positions at time `t`, in body order.
    pub fn positions_at(&self, t: f32) -> Vec<Vec3> {
        let mut out: Vec<Vec3> = Vec::with_capacity(self.bodies.len());
        for (i, body) in self.bodies.iter().enumerate() {
            let base = self.parents[i].map_or(Vec3::ZERO, |p| out[p]);
            out.push(base + body.local_offset_at(t));
        }
        out
    }

    /// Live absolute position of one body at time `t`.
    pub fn position_at(&self, id: &str, t: f32) -> Option<Vec3> {
        let mut i = self.index_of(id)?;
        let mut pos = self.bodies[i].local_offset_at(t);
        while let Some(p) = self.parents[i] {
            pos += self.bodies[p].local_offset_at(t);
            i = p;
        }
        Some(pos)
    }

    /// Rewrite every stored position for time `t`.
    pub fn advance_to(&mut self, t: f32) {
        let positions = self.positions_at(t);
        for (body, pos) in self.bodies.iter_mut().zip(positions) {
            body.position = pos;
        }
        self.time = t;
    }
}

/// Signed inclination factor in `[-max_tilt, max_tilt]` from the id hash.
fn orbit_tilt(id: &str, max_tilt: f32) -> f32 {
    let b = (rolling_hash(id) >> 8) as u8;
    (f32::from(b) / 255.0 * 2.0 - 1.0) * max_tilt
}

/// Lay out every node of a resolved hierarchy.
///
/// Fails with [`EngineError::NoRootNode`] when the index has no root.
pub fn layout(
    index: &HierarchyIndex<'_>,
    attributes: &mut AttributeGenerator,
    config: &LayoutConfig,
) -> Result<SceneLayout> {
    let root = index.root().ok_or(EngineError::NoRootNode)?;

    let root_body = SpatialBody {
        id: root.id.clone(),
        origin_key: root.origin_key.clone(),
        depth_class: DepthClass::Root,
        parent_id: None,
        position: Vec3::ZERO,
        orbit_radius: 0.0,
        orbit_angle: 0.0,
        orbit_speed: 0.0,
        orbit_tilt: 0.0,
        size: config.root_size.size(&root.economic_weight),
        characteristics: attributes.characteristics_for(
            &root.origin_key,
            &root.id,
            config.jitter_amount,
        ),
    };
    let mut out = SceneLayout::default();
    out.push(root_body, None);

    // Breadth-first: each parent is placed before its children are visited.
    let mut cursor = 0;
    while cursor < out.bodies.len() {
        let parent_idx = cursor;
        cursor += 1;

        let children = index.children_of(&out.bodies[parent_idx].id);
        if children.is_empty() {
            continue;
        }
        let parent = out.bodies[parent_idx].clone();
        let siblings = children.len();
        let spacing = config.branch_spacing(siblings);

        for (j, child) in children.into_iter().enumerate() {
            let class = if parent.depth_class == DepthClass::Root {
                DepthClass::Branch
            } else {
                DepthClass::Leaf
            };
            let orbit_radius = match class {
                DepthClass::Branch => config.branch_base_radius + j as f32 * spacing,
                _ => parent.size * config.leaf_radius_factor + j as f32 * config.leaf_spacing,
            };
            let body = place_child(
                child,
                &parent,
                class,
                orbit_radius,
                j as f32 / siblings as f32 * TAU,
                attributes,
                config,
            );
            out.push(body, Some(parent_idx));
        }
    }

    log::info!(
        "laid out {} bodies ({} branches, {} leaves)",
        out.len(),
        out.count_of(DepthClass::Branch),
        out.count_of(DepthClass::Leaf)
    );
    Ok(out)
}

fn place_child(
    node: &GovernanceNode,
    parent: &SpatialBody,
    class: DepthClass,
    orbit_radius: f32,
    orbit_angle: f32,
    attributes: &mut AttributeGenerator,
    config: &LayoutConfig,
) -> SpatialBody {
    // Nodes without their own lineage key inherit the parent's.
    let origin_key = if node.origin_key.is_empty() {
        parent.origin_key.clone()
    } else {
        node.origin_key.clone()
    };
    let mut body = SpatialBody {
        id: node.id.clone(),
        characteristics: attributes.characteristics_for(
            &origin_key,
            &node.id,
            config.jitter_amount,
        ),
        origin_key,
        depth_class: class,
        parent_id: Some(parent.id.clone()),
        position: Vec3::ZERO,
        orbit_radius,
        orbit_angle,
        orbit_speed: config.orbit_speed(class, orbit_radius),
        orbit_tilt: orbit_tilt(&node.id, config.max_tilt),
        size: config.size_rule(class).size(&node.economic_weight),
    };
    body.position = parent.position + body.local_offset_at(0.0);
    body
}

impl SceneLayout {
    fn push(&mut self, body: SpatialBody, parent: Option<usize>) {
        self.by_id.insert(body.id.clone(), self.bodies.len());
        self.bodies.push(body);
        self.parents.push(parent);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::{resolve, OrphanPolicy};

    fn node(id: &str, path: &[&str], supply: u128, members: u32) -> GovernanceNode {
        GovernanceNode {
            id: id.to_string(),
            root_path: path.iter().map(|s| s.to_string()).collect(),
            children_ids: vec![],
            economic_weight: EconomicWeight {
                supply,
                member_count: members,
                inflation_rate: 0,
            },
            origin_key: "0xroot-token".to_string(),
        }
    }

    fn run(nodes: &[GovernanceNode]) -> SceneLayout {
        let index = resolve(nodes, OrphanPolicy::Strict).unwrap();
        let mut gen = AttributeGenerator::default();
        layout(&index, &mut gen, &LayoutConfig::default()).unwrap()
    }

    fn three_branch_scenario() -> Vec<GovernanceNode> {
        vec![
            node("root", &[], 5_000_000, 25),
            node("b0", &["root"], 1_000_000, 10),
            node("b1", &["root"], 1_000_000, 13),
            node("b2", &["root"], 1_000_000, 16),
        ]
    }

    #[test]
    fn three_branch_scenario_layout() {
        let scene = run(&three_branch_scenario());
        assert_eq!(scene.len(), 4);

        let root = scene.get("root").unwrap();
        assert_eq!(root.position, Vec3::ZERO);
        assert_eq!(root.depth_class, DepthClass::Root);
        assert!((1.0..=3.0).contains(&root.size));

        let spacing = 10.0 / 3.0;
        let r: Vec<f32> = ["b0", "b1", "b2"]
            .iter()
            .map(|id| scene.get(id).unwrap().orbit_radius)
            .collect();
        assert!((r[0] - 3.0).abs() < 1e-5);
        assert!((r[1] - (3.0 + spacing)).abs() < 1e-4);
        assert!((r[2] - (3.0 + 2.0 * spacing)).abs() < 1e-4);

        let sizes: Vec<f32> = ["b0", "b1", "b2"]
            .iter()
            .map(|id| scene.get(id).unwrap().size)
            .collect();
        assert!(sizes[0] < sizes[1] && sizes[1] < sizes[2], "{sizes:?}");
    }

    #[test]
    fn branch_angles_evenly_divided() {
        let scene = run(&three_branch_scenario());
        let a1 = scene.get("b1").unwrap().orbit_angle;
        let a2 = scene.get("b2").unwrap().orbit_angle;
        assert_eq!(scene.get("b0").unwrap().orbit_angle, 0.0);
        assert!((a1 - TAU / 3.0).abs() < 1e-5);
        assert!((a2 - 2.0 * TAU / 3.0).abs() < 1e-5);
    }

    #[test]
    fn branch_radii_non_decreasing() {
        let mut nodes = vec![node("root", &[], 10, 1)];
        for i in 0..20 {
            nodes.push(node(&format!("b{i}"), &["root"], 10, 1));
        }
        let scene = run(&nodes);
        let radii: Vec<f32> = scene
            .bodies()
            .iter()
            .filter(|b| b.depth_class == DepthClass::Branch)
            .map(|b| b.orbit_radius)
            .collect();
        assert_eq!(radii.len(), 20);
        assert!(radii.windows(2).all(|w| w[0] <= w[1]));
        // Many branches: spacing bottoms out at 1.5.
        assert!((radii[1] - radii[0] - 1.5).abs() < 1e-5);
    }

    #[test]
    fn outer_orbits_are_slower() {
        let scene = run(&three_branch_scenario());
        let s0 = scene.get("b0").unwrap().orbit_speed;
        let s2 = scene.get("b2").unwrap().orbit_speed;
        assert!(s0 > s2);
        assert!(s2 >= 0.001);
    }

    #[test]
    fn leaves_orbit_their_parent() {
        let nodes = vec![
            node("root", &[], 1_000, 5),
            node("b", &["root"], 1_000, 5),
            node("l0", &["root", "b"], 10, 2),
            node("l1", &["root", "b"], 10, 2),
        ];
        let scene = run(&nodes);
        let parent = scene.get("b").unwrap();
        let l0 = scene.get("l0").unwrap();
        let l1 = scene.get("l1").unwrap();
        assert_eq!(l0.depth_class, DepthClass::Leaf);
        assert_eq!(l0.parent_id.as_deref(), Some("b"));
        assert!((l0.orbit_radius - parent.size * 1.5).abs() < 1e-5);
        assert!((l1.orbit_radius - (parent.size * 1.5 + 0.8)).abs() < 1e-5);
        assert!((l1.orbit_angle - std::f32::consts::PI).abs() < 1e-5);
        // Leaves orbit faster than a branch at the same radius would.
        let cfg = LayoutConfig::default();
        assert!(l0.orbit_speed > cfg.orbit_speed(DepthClass::Branch, l0.orbit_radius));
        // Position is parent-relative then translated.
        let dist = (l0.position - parent.position).length();
        let expected = l0.local_offset_at(0.0).length();
        assert!((dist - expected).abs() < 1e-4);
    }

    #[test]
    fn deeper_nodes_are_leaves_around_leaves() {
        let nodes = vec![
            node("root", &[], 1_000, 5),
            node("b", &["root"], 1_000, 5),
            node("l", &["root", "b"], 10, 2),
            node("ll", &["root", "b", "l"], 10, 1),
        ];
        let scene = run(&nodes);
        let ll = scene.get("ll").unwrap();
        assert_eq!(ll.depth_class, DepthClass::Leaf);
        assert_eq!(ll.parent_id.as_deref(), Some("l"));
        let l = scene.get("l").unwrap();
        assert!((ll.orbit_radius - l.size * 1.5).abs() < 1e-5);
    }

    #[test]
    fn empty_index_is_no_root() {
        let index = resolve(&[], OrphanPolicy::Strict).unwrap();
        let mut gen = AttributeGenerator::default();
        let err = layout(&index, &mut gen, &LayoutConfig::default()).unwrap_err();
        assert_eq!(err, EngineError::NoRootNode);
    }

    #[test]
    fn positions_are_a_pure_function_of_time() {
        let nodes = vec![
            node("root", &[], 1_000, 5),
            node("b", &["root"], 1_000, 5),
            node("l", &["root", "b"], 10, 2),
        ];
        let mut scene = run(&nodes);
        let at_ten = scene.positions_at(10.0);
        scene.advance_to(3.0);
        scene.advance_to(10.0);
        let stored: Vec<Vec3> = scene.bodies().iter().map(|b| b.position).collect();
        assert_eq!(stored, at_ten);
        assert_eq!(scene.position_at("l", 10.0), Some(at_ten[2]));
        // Root never moves.
        assert_eq!(at_ten[0], Vec3::ZERO);
        // Back to t = 0 reproduces the initial layout.
        scene.advance_to(0.0);
        assert_eq!(scene.positions_at(0.0), run(&nodes).positions_at(0.0));
    }

    #[test]
    fn orbit_keeps_horizontal_radius() {
        let scene = run(&three_branch_scenario());
        let b = scene.get("b1").unwrap();
        for t in [0.0, 5.0, 123.0] {
            let off = b.local_offset_at(t);
            let horizontal = (off.x * off.x + off.z * off.z).sqrt();
            // x² + z² = r²(cos² + sin²)
            assert!((horizontal - b.orbit_radius).abs() < 1e-3);
            assert!(off.y.abs() <= b.orbit_radius * 0.08 + 1e-5);
        }
    }

    #[test]
    fn siblings_share_shape_but_differ_in_color() {
        let scene = run(&three_branch_scenario());
        let a = &scene.get("b0").unwrap().characteristics;
        let b = &scene.get("b1").unwrap().characteristics;
        assert_eq!(a.shape_class, b.shape_class);
        assert_ne!(a, b);
    }

    #[test]
    fn layout_is_reproducible() {
        let nodes = three_branch_scenario();
        let a = run(&nodes);
        let b = run(&nodes);
        assert_eq!(a.bodies(), b.bodies());
    }

    #[test]
    fn empty_origin_key_inherits_from_parent() {
        let mut nodes = three_branch_scenario();
        nodes[2].origin_key.clear();
        let scene = run(&nodes);
        assert_eq!(scene.get("b1").unwrap().origin_key, "0xroot-token");
    }

    #[test]
    fn size_clamps() {
        let cfg = LayoutConfig::default();
        let huge = EconomicWeight {
            supply: u128::MAX,
            member_count: u32::MAX,
            inflation_rate: 0,
        };
        assert_eq!(cfg.root_size.size(&huge), 3.0);
        assert_eq!(cfg.branch_size.size(&huge), 2.0);
        assert_eq!(cfg.leaf_size.size(&EconomicWeight::default()), 0.1);
        assert_eq!(cfg.root_size.size(&EconomicWeight::default()), 1.0);
    }
}
