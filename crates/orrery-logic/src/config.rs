//! Engine configuration.
//!
//! Every tunable lives in one serde-friendly struct with sensible
//! defaults. Missing fields in a JSON document fall back to those defaults,
//! so `{}` is a valid configuration.
//!
//! ```
//! use orrery_logic::config::EngineConfig;
//! use orrery_logic::hierarchy::OrphanPolicy;
//!
//! let config = EngineConfig::from_json_str(r#"{ "orphan_policy": "Reattach" }"#).unwrap();
//! assert_eq!(config.orphan_policy, OrphanPolicy::Reattach);
//! assert_eq!(config.lod.near_distance, 8.0);
//! ```

use crate::attributes::DEFAULT_CACHE_CAPACITY;
use crate::error::Result;
use crate::hierarchy::OrphanPolicy;
use crate::layout::LayoutConfig;
use crate::lod::LodConfig;
use crate::perf::PerfConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub orphan_policy: OrphanPolicy,
    /// Entries per attribute cache.
    pub attribute_cache_capacity: usize,
    pub layout: LayoutConfig,
    pub lod: LodConfig,
    pub perf: PerfConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            orphan_policy: OrphanPolicy::Strict,
            attribute_cache_capacity: DEFAULT_CACHE_CAPACITY,
            layout: LayoutConfig::default(),
            lod: LodConfig::default(),
            perf: PerfConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; absent fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
