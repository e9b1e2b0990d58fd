//! Pure layout and level-of-detail logic for the governance orrery.
//!
//! This crate turns a flat snapshot of governance nodes into a deterministic
//! scene of orbiting bodies and decides, per frame, how much detail each body
//! deserves. Nothing here renders or touches the network: functions take plain
//! data and return results, so every stage is unit-testable and the same
//! snapshot always produces the same scene.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`attributes`] | Hash-derived visual characteristics with LRU caching |
//! | [`config`] | Engine-wide tunables, JSON loadable |
//! | [`error`] | Error type shared by every stage |
//! | [`frustum`] | View-frustum planes and sphere containment |
//! | [`hierarchy`] | Root-path resolution, depth classes, orphan handling |
//! | [`layout`] | Orbital placement and analytic orbit positions |
//! | [`lod`] | Distance tiers, frustum throttling, per-frame stats |
//! | [`node`] | Input snapshot records |
//! | [`perf`] | Frame-time window and adaptive quality |
//! | [`scene`] | Session façade: snapshot → layout → LOD |
//! | [`species`] | Deterministic display names for lineages |
//! | [`validation`] | Structural checks over computed layouts |

pub mod attributes;
pub mod config;
pub mod error;
pub mod frustum;
pub mod hierarchy;
pub mod layout;
pub mod lod;
pub mod node;
pub mod perf;
pub mod scene;
pub mod species;
pub mod validation;

pub use error::{EngineError, Result};
