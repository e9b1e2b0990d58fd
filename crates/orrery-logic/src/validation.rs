//! Structural validation for computed layouts.
//!
//! Pure functions that take a [`SceneLayout`] and return validation errors.
//! Used by the headless harness and by tests; the engine itself never
//! produces a layout that fails the `Error` checks.

use crate::hierarchy::DepthClass;
use crate::layout::{LayoutConfig, SceneLayout};
use std::collections::HashSet;

/// A layout validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub category: &'static str,
    pub severity: Severity,
    pub message: String,
}

/// Error severity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Severity {
    Error,
    Warning,
}

// ── A. Per-body values ──────────────────────────────────────────────────

/// Every position and orbit parameter must be finite.
pub fn check_finite_values(layout: &SceneLayout) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for b in layout.bodies() {
        let finite = b.position.is_finite()
            && b.orbit_radius.is_finite()
            && b.orbit_angle.is_finite()
            && b.orbit_speed.is_finite()
            && b.orbit_tilt.is_finite()
            && b.size.is_finite();
        if !finite {
            errors.push(ValidationError {
                category: "body_values",
                severity: Severity::Error,
                message: format!("Body {} has non-finite position or orbit values", b.id),
            });
        }
    }
    errors
}

/// Sizes must fall inside the clamp for their depth class.
pub fn check_size_ranges(layout: &SceneLayout, config: &LayoutConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for b in layout.bodies() {
        let rule = config.size_rule(b.depth_class);
        if b.size < rule.min || b.size > rule.max {
            errors.push(ValidationError {
                category: "body_values",
                severity: Severity::Error,
                message: format!(
                    "Body {} ({:?}) size {:.3} outside [{}, {}]",
                    b.id, b.depth_class, b.size, rule.min, rule.max
                ),
            });
        }
    }
    errors
}

/// The root must sit at the origin with no orbit.
pub fn check_root_fixed(layout: &SceneLayout) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    match layout.root() {
        None => errors.push(ValidationError {
            category: "root",
            severity: Severity::Error,
            message: "Layout has no bodies".to_string(),
        }),
        Some(r) if r.depth_class != DepthClass::Root => errors.push(ValidationError {
            category: "root",
            severity: Severity::Error,
            message: format!("First body {} is {:?}, expected Root", r.id, r.depth_class),
        }),
        Some(r) if r.orbit_radius != 0.0 || r.orbit_speed != 0.0 => {
            errors.push(ValidationError {
                category: "root",
                severity: Severity::Error,
                message: format!("Root {} has a non-zero orbit", r.id),
            })
        }
        Some(_) => {}
    }
    errors
}

// ── B. Orbits ───────────────────────────────────────────────────────────

/// Branch radii must be non-decreasing in sibling order.
pub fn check_branch_ordering(layout: &SceneLayout) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let branches: Vec<_> = layout
        .bodies()
        .iter()
        .filter(|b| b.depth_class == DepthClass::Branch)
        .collect();
    for pair in branches.windows(2) {
        if pair[1].orbit_radius < pair[0].orbit_radius {
            errors.push(ValidationError {
                category: "orbits",
                severity: Severity::Error,
                message: format!(
                    "Branch {} radius {:.3} is inside preceding sibling {} ({:.3})",
                    pair[1].id, pair[1].orbit_radius, pair[0].id, pair[0].orbit_radius
                ),
            });
        }
    }
    errors
}

/// Leaf orbits that dip inside their parent's surface.
pub fn check_leaf_clearance(layout: &SceneLayout) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let parents = layout.parent_indices();
    for (i, b) in layout.bodies().iter().enumerate() {
        if b.depth_class != DepthClass::Leaf {
            continue;
        }
        if let Some(p) = parents[i] {
            let parent = &layout.bodies()[p];
            if b.orbit_radius < parent.size {
                errors.push(ValidationError {
                    category: "orbits",
                    severity: Severity::Warning,
                    message: format!(
                        "Leaf {} orbits at {:.3}, inside parent {} (size {:.3})",
                        b.id, b.orbit_radius, parent.id, parent.size
                    ),
                });
            }
        }
    }
    errors
}

// ── C. References ───────────────────────────────────────────────────────

/// Ids are unique and every parent precedes its children.
pub fn check_references(layout: &SceneLayout) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for b in layout.bodies() {
        if let Some(parent) = &b.parent_id {
            if !seen.contains(parent.as_str()) {
                errors.push(ValidationError {
                    category: "references",
                    severity: Severity::Error,
                    message: format!(
                        "Body {} references parent {} that does not precede it",
                        b.id, parent
                    ),
                });
            }
        }
        if !seen.insert(b.id.as_str()) {
            errors.push(ValidationError {
                category: "references",
                severity: Severity::Error,
                message: format!("Duplicate body id {}", b.id),
            });
        }
    }
    errors
}

/// Run every check.
pub fn validate_layout(layout: &SceneLayout, config: &LayoutConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    errors.extend(check_root_fixed(layout));
    errors.extend(check_finite_values(layout));
    errors.extend(check_size_ranges(layout, config));
    errors.extend(check_branch_ordering(layout));
    errors.extend(check_leaf_clearance(layout));
    errors.extend(check_references(layout));
    errors
}

/// Count of `Error`-severity entries.
pub fn error_count(errors: &[ValidationError]) -> usize {
    errors
        .iter()
        .filter(|e| e.severity == Severity::Error)
        .count()
}
