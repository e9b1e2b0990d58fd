//! Orrery Headless Harness
//!
//! Runs the layout and LOD engine over a governance snapshot and checks the
//! results without a renderer. Runs entirely in-process.
//!
//! Usage:
//!   cargo run -p orrery-simtest
//!   cargo run -p orrery-simtest -- --verbose
//!   cargo run -p orrery-simtest -- --snapshot nodes.json --config engine.json
//!   cargo run -p orrery-simtest -- --json
//!
//! Engine logging goes through `RUST_LOG`; `--verbose` defaults it to debug.

use glam::Vec3;
use orrery_logic::attributes::AttributeGenerator;
use orrery_logic::config::EngineConfig;
use orrery_logic::frustum::Frustum;
use orrery_logic::hierarchy::{resolve, DepthClass, OrphanPolicy};
use orrery_logic::layout::{layout, SceneLayout};
use orrery_logic::lod::{LevelOfDetailManager, LodStats, LodTier, ViewerState, DETAIL_LEVELS};
use orrery_logic::node::GovernanceNode;
use orrery_logic::perf::QualityLevel;
use orrery_logic::scene::OrreryScene;
use orrery_logic::species::{instance_name, species_name};
use orrery_logic::validation::{error_count, validate_layout, Severity};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;

// ── Sample snapshot (used when no --snapshot is given) ──────────────────
const SAMPLE_SNAPSHOT: &str = include_str!("../../../data/sample_snapshot.json");

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

#[derive(Serialize)]
struct Summary {
    bodies: usize,
    branches: usize,
    leaves: usize,
    lineages: usize,
    lod: LodStats,
    passed: usize,
    failed: usize,
}

struct Args {
    verbose: bool,
    json: bool,
    snapshot: Option<String>,
    config: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args {
        verbose: false,
        json: false,
        snapshot: None,
        config: None,
    };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--verbose" => args.verbose = true,
            "--json" => args.json = true,
            "--snapshot" => args.snapshot = it.next(),
            "--config" => args.config = it.next(),
            other => eprintln!("ignoring unknown argument {other}"),
        }
    }
    args
}

fn read_or_exit(path: &str) -> String {
    match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("cannot read {path}: {e}");
            std::process::exit(2);
        }
    }
}

fn main() {
    let args = parse_args();
    let default_level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    let verbose = args.verbose;
    println!("=== Orrery Headless Harness ===\n");

    let config = match &args.config {
        Some(path) => match EngineConfig::from_json_str(&read_or_exit(path)) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("invalid config {path}: {e}");
                std::process::exit(2);
            }
        },
        None => EngineConfig::default(),
    };
    let snapshot_json = match &args.snapshot {
        Some(path) => read_or_exit(path),
        None => SAMPLE_SNAPSHOT.to_string(),
    };

    let mut results = Vec::new();

    // 1. Snapshot parse
    let nodes = match parse_snapshot(&snapshot_json, &mut results) {
        Some(n) => n,
        None => finish(&results, verbose, None),
    };

    // 2. Hierarchy resolution
    results.extend(validate_hierarchy(&nodes, &config, verbose));

    // 3. Layout structure
    let scene = match build_layout(&nodes, &config, &mut results) {
        Some(s) => s,
        None => finish(&results, verbose, None),
    };
    results.extend(validate_structure(&scene, &config, verbose));

    // 4. Determinism
    results.extend(validate_determinism(&nodes, &config, &scene));

    // 5. Orbit sweep
    results.extend(validate_orbits(&scene, verbose));

    // 6. LOD sweep
    let (lod_results, lod_stats) = validate_lod(&scene, &config, verbose);
    results.extend(lod_results);

    // 7. Attributes & names
    results.extend(validate_attributes(&scene, verbose));

    // 8. Session & adaptive quality
    results.extend(validate_session(&nodes, &config));

    let summary = args.json.then(|| Summary {
        bodies: scene.len(),
        branches: scene.count_of(DepthClass::Branch),
        leaves: scene.count_of(DepthClass::Leaf),
        lineages: scene
            .bodies()
            .iter()
            .map(|b| b.origin_key.as_str())
            .collect::<HashSet<_>>()
            .len(),
        lod: lod_stats,
        passed: results.iter().filter(|r| r.passed).count(),
        failed: results.iter().filter(|r| !r.passed).count(),
    });
    finish(&results, verbose, summary)
}

fn finish(results: &[TestResult], verbose: bool, summary: Option<Summary>) -> ! {
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if let Some(summary) = summary {
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("cannot serialize summary: {e}"),
        }
    }

    std::process::exit(if failed > 0 { 1 } else { 0 });
}

// ── 1. Snapshot ─────────────────────────────────────────────────────────

fn parse_snapshot(json: &str, results: &mut Vec<TestResult>) -> Option<Vec<GovernanceNode>> {
    println!("--- Snapshot ---");
    match serde_json::from_str::<Vec<GovernanceNode>>(json) {
        Ok(nodes) => {
            results.push(TestResult {
                name: "snapshot_parse".into(),
                passed: !nodes.is_empty(),
                detail: format!("{} nodes loaded", nodes.len()),
            });
            Some(nodes)
        }
        Err(e) => {
            results.push(TestResult {
                name: "snapshot_parse".into(),
                passed: false,
                detail: format!("JSON parse error: {}", e),
            });
            None
        }
    }
}

// ── 2. Hierarchy ────────────────────────────────────────────────────────

fn validate_hierarchy(
    nodes: &[GovernanceNode],
    config: &EngineConfig,
    verbose: bool,
) -> Vec<TestResult> {
    println!("--- Hierarchy ---");
    let mut results = Vec::new();

    let index = match resolve(nodes, config.orphan_policy) {
        Ok(i) => i,
        Err(e) => {
            results.push(TestResult {
                name: "hierarchy_resolves".into(),
                passed: false,
                detail: e.to_string(),
            });
            return results;
        }
    };

    results.push(TestResult {
        name: "hierarchy_single_root".into(),
        passed: index.root().is_some(),
        detail: match index.root() {
            Some(r) => format!("root is {}", r.id),
            None => "no root".into(),
        },
    });

    let reached = index.iter_tree_order().count();
    results.push(TestResult {
        name: "hierarchy_all_reachable".into(),
        passed: reached == nodes.len(),
        detail: format!("{}/{} nodes reachable from root", reached, nodes.len()),
    });

    // Every non-root node sits one level below its resolved parent
    let bad_depth: Vec<&str> = index
        .iter_tree_order()
        .filter(|n| match index.parent_of(&n.id) {
            Some(p) => index.depth_of(&n.id) != index.depth_of(&p.id).map(|d| d + 1),
            None => index.depth_of(&n.id) != Some(0),
        })
        .map(|n| n.id.as_str())
        .collect();
    results.push(TestResult {
        name: "hierarchy_depth_consistent".into(),
        passed: bad_depth.is_empty(),
        detail: if bad_depth.is_empty() {
            format!("max depth {}", index.max_depth())
        } else {
            format!("inconsistent depth: {}", bad_depth.join(", "))
        },
    });

    if verbose {
        for d in 0..=index.max_depth() {
            let ids: Vec<&str> = index.all_at_depth(d).iter().map(|n| n.id.as_str()).collect();
            println!("  depth {}: {}", d, ids.join(", "));
        }
    }

    // An injected orphan must be rejected in strict mode and reattached otherwise
    let mut broken = nodes.to_vec();
    if let Some(root) = index.root() {
        broken.push(GovernanceNode {
            id: "__harness_orphan".into(),
            root_path: vec![root.id.clone(), "__missing".into()],
            children_ids: vec![],
            economic_weight: Default::default(),
            origin_key: String::new(),
        });
        let strict = resolve(&broken, OrphanPolicy::Strict);
        let lenient = resolve(&broken, OrphanPolicy::Reattach);
        let reattached = lenient
            .as_ref()
            .ok()
            .and_then(|i| i.parent_of("__harness_orphan"))
            .map(|p| p.id == root.id)
            .unwrap_or(false);
        results.push(TestResult {
            name: "hierarchy_orphan_policy".into(),
            passed: strict.is_err() && reattached,
            detail: format!(
                "strict rejects: {}, reattach to root: {}",
                strict.is_err(),
                reattached
            ),
        });
    }

    results
}

// ── 3. Layout structure ─────────────────────────────────────────────────

fn build_layout(
    nodes: &[GovernanceNode],
    config: &EngineConfig,
    results: &mut Vec<TestResult>,
) -> Option<SceneLayout> {
    println!("--- Layout ---");
    let built = resolve(nodes, config.orphan_policy).and_then(|index| {
        let mut attributes = AttributeGenerator::with_capacity(config.attribute_cache_capacity);
        layout(&index, &mut attributes, &config.layout)
    });
    match built {
        Ok(scene) => {
            results.push(TestResult {
                name: "layout_builds".into(),
                passed: scene.len() == nodes.len(),
                detail: format!("{} bodies placed", scene.len()),
            });
            Some(scene)
        }
        Err(e) => {
            results.push(TestResult {
                name: "layout_builds".into(),
                passed: false,
                detail: e.to_string(),
            });
            None
        }
    }
}

fn validate_structure(scene: &SceneLayout, config: &EngineConfig, verbose: bool) -> Vec<TestResult> {
    let mut results = Vec::new();
    let errors = validate_layout(scene, &config.layout);
    let warnings = errors
        .iter()
        .filter(|e| e.severity == Severity::Warning)
        .count();

    if verbose {
        for e in &errors {
            println!("  [{:?}] {}: {}", e.severity, e.category, e.message);
        }
    }

    results.push(TestResult {
        name: "layout_validation".into(),
        passed: error_count(&errors) == 0,
        detail: format!("{} errors, {} warnings", error_count(&errors), warnings),
    });

    // Branch radii match the ring formula exactly
    let branches: Vec<_> = scene
        .bodies()
        .iter()
        .filter(|b| b.depth_class == DepthClass::Branch)
        .collect();
    let spacing = config.layout.branch_spacing(branches.len());
    let off_ring: Vec<&str> = branches
        .iter()
        .enumerate()
        .filter(|(i, b)| {
            let expected = config.layout.branch_base_radius + *i as f32 * spacing;
            (b.orbit_radius - expected).abs() > 1e-4
        })
        .map(|(_, b)| b.id.as_str())
        .collect();
    results.push(TestResult {
        name: "layout_branch_rings".into(),
        passed: off_ring.is_empty(),
        detail: if off_ring.is_empty() {
            format!("{} branches, spacing {:.3}", branches.len(), spacing)
        } else {
            format!("off-ring branches: {}", off_ring.join(", "))
        },
    });

    results
}

// ── 4. Determinism ──────────────────────────────────────────────────────

fn validate_determinism(
    nodes: &[GovernanceNode],
    config: &EngineConfig,
    scene: &SceneLayout,
) -> Vec<TestResult> {
    println!("--- Determinism ---");
    let mut results = Vec::new();

    // A fresh generator must reproduce the same scene
    let again = resolve(nodes, config.orphan_policy)
        .and_then(|index| layout(&index, &mut AttributeGenerator::default(), &config.layout));
    results.push(TestResult {
        name: "determinism_relayout".into(),
        passed: again.as_ref().map(|s| s.bodies() == scene.bodies()).unwrap_or(false),
        detail: "identical bodies from a second run".into(),
    });

    // Reordered input must not change the result
    let mut reversed = nodes.to_vec();
    reversed.reverse();
    let shuffled = resolve(&reversed, config.orphan_policy)
        .and_then(|index| layout(&index, &mut AttributeGenerator::default(), &config.layout));
    let same_radii = shuffled
        .as_ref()
        .map(|s| {
            scene.bodies().iter().all(|b| {
                s.get(&b.id)
                    .map(|o| o.depth_class == b.depth_class)
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false);
    results.push(TestResult {
        name: "determinism_input_order".into(),
        passed: same_radii,
        detail: "depth classes stable under reversed input".into(),
    });

    // Replay: positions at t do not depend on the path taken to t
    let mut stepped = scene.clone();
    for i in 0..=100 {
        stepped.advance_to(i as f32 * 0.5);
    }
    let direct = scene.positions_at(50.0);
    let stepped_positions: Vec<Vec3> = stepped.bodies().iter().map(|b| b.position).collect();
    results.push(TestResult {
        name: "determinism_replay".into(),
        passed: direct == stepped_positions,
        detail: "stepped and direct positions agree at t=50".into(),
    });

    results
}

// ── 5. Orbits ───────────────────────────────────────────────────────────

fn validate_orbits(scene: &SceneLayout, verbose: bool) -> Vec<TestResult> {
    println!("--- Orbits ---");
    let mut results = Vec::new();
    let times = [0.0_f32, 1.0, 10.0, 100.0, 1_000.0, 100_000.0];

    let mut non_finite = 0;
    let mut root_moved = false;
    let mut max_extent = 0.0_f32;
    for &t in &times {
        let positions = scene.positions_at(t);
        non_finite += positions.iter().filter(|p| !p.is_finite()).count();
        if positions.first().copied() != Some(Vec3::ZERO) {
            root_moved = true;
        }
        for p in &positions {
            max_extent = max_extent.max(p.length());
        }
    }

    results.push(TestResult {
        name: "orbits_finite".into(),
        passed: non_finite == 0,
        detail: format!("{} non-finite positions over {} samples", non_finite, times.len()),
    });
    results.push(TestResult {
        name: "orbits_root_fixed".into(),
        passed: !root_moved,
        detail: "root stays at origin".into(),
    });

    // Bodies must stay within the outermost ring plus their local orbits
    let bound: f32 = scene
        .bodies()
        .iter()
        .map(|b| b.orbit_radius * (1.0 + b.orbit_tilt.abs()))
        .sum();
    results.push(TestResult {
        name: "orbits_bounded".into(),
        passed: max_extent <= bound + 1e-3,
        detail: format!("max extent {:.2} (bound {:.2})", max_extent, bound),
    });

    if verbose {
        for b in scene.bodies() {
            println!(
                "  {:<24} {:?} r={:.2} ω={:.4} size={:.2}",
                b.id, b.depth_class, b.orbit_radius, b.orbit_speed, b.size
            );
        }
    }

    results
}

// ── 6. LOD ──────────────────────────────────────────────────────────────

fn validate_lod(
    scene: &SceneLayout,
    config: &EngineConfig,
    verbose: bool,
) -> (Vec<TestResult>, LodStats) {
    println!("--- Level of Detail ---");
    let mut results = Vec::new();
    let mut lod = LevelOfDetailManager::new(config.lod.clone());

    // Fly the viewer in from far away
    let mut bad_detail = 0;
    let mut inconsistent = 0;
    let mut last_stats = LodStats::default();
    let mut visible_curve = Vec::new();
    for (step, d) in [80.0_f32, 40.0, 25.0, 12.0, 4.0].iter().enumerate() {
        let viewer = ViewerState::at(Vec3::new(0.0, d * 0.3, *d));
        let now = Duration::from_millis(step as u64 * 16);
        let frame = match lod.update(scene.bodies(), &viewer, now) {
            Ok(f) => f,
            Err(e) => {
                results.push(TestResult {
                    name: "lod_update".into(),
                    passed: false,
                    detail: e.to_string(),
                });
                return (results, last_stats);
            }
        };
        bad_detail += frame
            .results
            .iter()
            .filter(|r| !DETAIL_LEVELS.contains(&r.detail))
            .count();
        inconsistent += frame
            .results
            .iter()
            .filter(|r| r.visible != (r.tier != LodTier::Culled))
            .count();
        visible_curve.push(frame.stats.visible());
        if verbose {
            println!(
                "  viewer z={:>5.1}: near {} / medium {} / far {} / culled {} (cost {:.1})",
                d,
                frame.stats.near_count,
                frame.stats.medium_count,
                frame.stats.far_count,
                frame.stats.culled_count,
                frame.stats.estimated_cost()
            );
        }
        last_stats = frame.stats;
    }

    results.push(TestResult {
        name: "lod_detail_quantized".into(),
        passed: bad_detail == 0,
        detail: format!("{} off-grid detail values", bad_detail),
    });
    results.push(TestResult {
        name: "lod_visibility_consistent".into(),
        passed: inconsistent == 0,
        detail: format!("{} results with visible/tier mismatch", inconsistent),
    });
    results.push(TestResult {
        name: "lod_approach_reveals".into(),
        passed: visible_curve.first() <= visible_curve.last(),
        detail: format!("visible bodies along approach: {:?}", visible_curve),
    });

    // Selection pins a body to Near even when culled by distance
    let far = ViewerState::at(Vec3::new(0.0, 0.0, 10_000.0));
    if let Some(target) = scene.bodies().last() {
        lod.select(target.id.clone());
        let pinned = lod
            .update(scene.bodies(), &far, Duration::from_millis(200))
            .ok()
            .and_then(|f| f.get(&target.id).map(|r| r.tier == LodTier::Near && r.detail == 1.0))
            .unwrap_or(false);
        lod.clear_selection();
        results.push(TestResult {
            name: "lod_selection_pinned".into(),
            passed: pinned,
            detail: format!("{} forced near from 10k units", target.id),
        });
    }

    // Frustum work is throttled by movement and elapsed time
    let mut throttled = LevelOfDetailManager::new(config.lod.clone());
    let frustum = Frustum::from_aabb(Vec3::splat(-100.0), Vec3::splat(100.0));
    let at = |x: f32| ViewerState::at(Vec3::new(x, 5.0, 20.0)).with_frustum(frustum);
    let interval = config.lod.frustum_interval();
    let half = interval / 2;
    let mut ok = true;
    ok &= throttled.update(scene.bodies(), &at(0.0), Duration::ZERO).is_ok();
    ok &= throttled.update(scene.bodies(), &at(0.0), half).is_ok();
    let after_idle = throttled.frustum_recompute_count();
    ok &= throttled
        .update(scene.bodies(), &at(0.0), interval + half)
        .is_ok();
    let after_interval = throttled.frustum_recompute_count();
    let moved = config.lod.frustum_move_epsilon * 10.0;
    ok &= throttled
        .update(scene.bodies(), &at(moved), interval + half)
        .is_ok();
    let after_move = throttled.frustum_recompute_count();
    results.push(TestResult {
        name: "lod_frustum_throttle".into(),
        passed: ok && after_idle == 1 && after_interval == 2 && after_move == 3,
        detail: format!(
            "recomputes: idle {}, after interval {}, after move {}",
            after_idle, after_interval, after_move
        ),
    });

    // Invalid viewer reuses the last frame
    let stale = throttled
        .update(
            scene.bodies(),
            &ViewerState::at(Vec3::new(f32::NAN, 0.0, 0.0)),
            interval * 3,
        )
        .map(|f| f.stale)
        .unwrap_or(false);
    results.push(TestResult {
        name: "lod_invalid_viewer_stale".into(),
        passed: stale,
        detail: "NaN viewer returns previous frame marked stale".into(),
    });

    (results, last_stats)
}

// ── 7. Attributes ───────────────────────────────────────────────────────

fn validate_attributes(scene: &SceneLayout, verbose: bool) -> Vec<TestResult> {
    println!("--- Attributes ---");
    let mut results = Vec::new();

    let lineages: HashSet<&str> = scene.bodies().iter().map(|b| b.origin_key.as_str()).collect();
    let mut generator = AttributeGenerator::default();
    for b in scene.bodies() {
        generator.generate(&b.origin_key);
    }
    results.push(TestResult {
        name: "attributes_lineage_cache".into(),
        passed: generator.lineage_cache_len() == lineages.len(),
        detail: format!("{} lineages cached", generator.lineage_cache_len()),
    });

    // Same lineage keeps the same shape class
    let mixed_shapes = scene.bodies().iter().any(|a| {
        scene.bodies().iter().any(|b| {
            a.origin_key == b.origin_key
                && a.characteristics.shape_class != b.characteristics.shape_class
        })
    });
    results.push(TestResult {
        name: "attributes_shape_per_lineage".into(),
        passed: !mixed_shapes,
        detail: "shape class shared within each lineage".into(),
    });

    let out_of_range = scene
        .bodies()
        .iter()
        .filter(|b| {
            let c = &b.characteristics;
            let in_unit = |v: f32| (0.0..=1.0).contains(&v);
            !(in_unit(c.base_color.r)
                && in_unit(c.base_color.g)
                && in_unit(c.base_color.b)
                && (0.8..=1.5).contains(&c.size_bias))
        })
        .count();
    results.push(TestResult {
        name: "attributes_in_range".into(),
        passed: out_of_range == 0,
        detail: format!("{} bodies with out-of-range characteristics", out_of_range),
    });

    if verbose {
        let mut keys: Vec<&str> = lineages.into_iter().collect();
        keys.sort_unstable();
        for key in keys {
            println!("  {:<20} → {}", key, species_name(key));
        }
        for b in scene.bodies().iter().take(5) {
            println!("  {:<20} → {}", b.id, instance_name(&b.origin_key, &b.id));
        }
    }

    results
}

// ── 8. Session ──────────────────────────────────────────────────────────

fn validate_session(nodes: &[GovernanceNode], config: &EngineConfig) -> Vec<TestResult> {
    println!("--- Session ---");
    let mut results = Vec::new();
    let mut session = OrreryScene::new(config.clone());

    let applied = session.apply_snapshot(nodes).is_ok();
    let rejected = session.apply_snapshot(&[]).is_err();
    let retained = session.layout().map(|l| l.len()) == Some(nodes.len());
    results.push(TestResult {
        name: "session_keeps_last_good_layout".into(),
        passed: applied && rejected && retained,
        detail: "empty snapshot rejected, previous layout retained".into(),
    });

    for _ in 0..config.perf.window.max(1) * 2 {
        session.record_frame(Duration::from_millis(80));
    }
    let degraded = session.quality() == QualityLevel::Low;
    let shrunk = session.lod().config().max_distance < config.lod.max_distance;
    results.push(TestResult {
        name: "session_adaptive_quality".into(),
        passed: degraded && shrunk,
        detail: format!(
            "quality {:?} at {:.1} ms, max distance {:.1}",
            session.quality(),
            session.monitor().average_frame_ms(),
            session.lod().config().max_distance
        ),
    });

    results
}
