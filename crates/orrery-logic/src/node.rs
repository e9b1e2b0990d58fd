//! Governance node snapshot types.
//!
//! Nodes arrive already decoded from the chain. The engine only borrows
//! them; a new snapshot replaces the old one wholesale.

use serde::{Deserialize, Serialize};

/// Token-weighted economic magnitude of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicWeight {
    /// Total token supply (base units).
    pub supply: u128,
    pub member_count: u32,
    /// Inflation rate in basis points.
    pub inflation_rate: u32,
}

impl EconomicWeight {
    /// `log10(supply + 1)`.
    pub fn log_supply(&self) -> f32 {
        (self.supply as f64 + 1.0).log10() as f32
    }

    /// `log10(member_count + 1)`.
    pub fn log_members(&self) -> f32 {
        (f64::from(self.member_count) + 1.0).log10() as f32
    }
}

/// One governance unit in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceNode {
    pub id: String,
    /// Ancestor chain from the root down to this node's parent.
    /// Empty for the root.
    #[serde(default)]
    pub root_path: Vec<String>,
    #[serde(default)]
    pub children_ids: Vec<String>,
    #[serde(default)]
    pub economic_weight: EconomicWeight,
    /// Seed shared by a whole lineage (usually the root token id).
    #[serde(default)]
    pub origin_key: String,
}

impl GovernanceNode {
    /// Declared depth, i.e. `root_path.len()`.
    pub fn declared_depth(&self) -> u32 {
        self.root_path.len() as u32
    }

    /// Declared parent id (last entry of the root path).
    pub fn declared_parent(&self) -> Option<&str> {
        self.root_path.last().map(String::as_str)
    }
}
