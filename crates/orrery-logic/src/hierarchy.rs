//! Parent/child/depth resolution for a flat node snapshot.
//!
//! Depth is `root_path.len()`: the root is depth 0, its direct children
//! are branches (depth 1), everything deeper is a leaf. The parent of a
//! node is the last entry of its root path.
//!
//! A snapshot must contain exactly one root. What happens to a node whose
//! declared parent is missing is decided by [`OrphanPolicy`]:
//!
//! | Policy | Missing parent |
//! |--------|----------------|
//! | `Strict` | resolution fails with `MalformedHierarchy` |
//! | `Reattach` | attach to the nearest ancestor present, else promote to a branch of the root; logged and recorded as an anomaly |
//!
//! ```
//! use orrery_logic::hierarchy::{resolve, DepthClass, OrphanPolicy};
//! use orrery_logic::node::GovernanceNode;
//!
//! let node = |id: &str, path: &[&str]| GovernanceNode {
//!     id: id.into(),
//!     root_path: path.iter().map(|s| s.to_string()).collect(),
//!     children_ids: vec![],
//!     economic_weight: Default::default(),
//!     origin_key: "root".into(),
//! };
//! let nodes = vec![node("root", &[]), node("a", &["root"]), node("a1", &["root", "a"])];
//! let index = resolve(&nodes, OrphanPolicy::Strict).unwrap();
//! assert_eq!(index.root().unwrap().id, "root");
//! assert_eq!(index.depth_of("a1"), Some(2));
//! assert_eq!(index.depth_class_of("a1"), Some(DepthClass::Leaf));
//! ```

use crate::error::{EngineError, Result};
use crate::node::GovernanceNode;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// What to do with a node whose declared parent is not in the snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrphanPolicy {
    /// Fail the whole resolution.
    #[default]
    Strict,
    /// Attach to the nearest resolvable ancestor, or promote to a branch.
    Reattach,
}

/// Depth class: sun / planet / moon in the orrery view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DepthClass {
    Root,
    Branch,
    Leaf,
}

impl DepthClass {
    pub fn from_depth(depth: u32) -> Self {
        match depth {
            0 => DepthClass::Root,
            1 => DepthClass::Branch,
            _ => DepthClass::Leaf,
        }
    }
}

/// How an orphan was repaired under [`OrphanPolicy::Reattach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyKind {
    /// Attached to a higher ancestor from its own root path.
    ReattachedToAncestor,
    /// No ancestor resolved; now a direct child of the root.
    PromotedToBranch,
}

/// A recoverable irregularity found while resolving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyAnomaly {
    pub node_id: String,
    /// Parent the node declared (may be absent from the snapshot).
    pub declared_parent: String,
    /// Parent actually used.
    pub attached_to: String,
    pub kind: AnomalyKind,
}

/// Resolved view over a borrowed snapshot.
#[derive(Debug)]
pub struct HierarchyIndex<'a> {
    nodes: &'a [GovernanceNode],
    by_id: HashMap<&'a str, usize>,
    parent: Vec<Option<usize>>,
    depth: Vec<u32>,
    children: Vec<Vec<usize>>,
    /// Breadth-first order from the root, children in sibling order.
    order: Vec<usize>,
    root: Option<usize>,
    anomalies: Vec<HierarchyAnomaly>,
}

impl<'a> HierarchyIndex<'a> {
    fn empty(nodes: &'a [GovernanceNode]) -> Self {
        Self {
            nodes,
            by_id: HashMap::new(),
            parent: Vec::new(),
            depth: Vec::new(),
            children: Vec::new(),
            order: Vec::new(),
            root: None,
            anomalies: Vec::new(),
        }
    }

    pub fn root(&self) -> Option<&'a GovernanceNode> {
        self.root.map(|i| &self.nodes[i])
    }

    pub fn get(&self, id: &str) -> Option<&'a GovernanceNode> {
        self.by_id.get(id).map(|&i| &self.nodes[i])
    }

    /// Children of `id` in sibling order. Empty for unknown ids.
    pub fn children_of(&self, id: &str) -> Vec<&'a GovernanceNode> {
        match self.by_id.get(id) {
            Some(&i) => self.children[i].iter().map(|&c| &self.nodes[c]).collect(),
            None => Vec::new(),
        }
    }

    /// Effective depth. Equals `root_path.len()` unless the node was reattached.
    pub fn depth_of(&self, id: &str) -> Option<u32> {
        self.by_id.get(id).map(|&i| self.depth[i])
    }

    pub fn depth_class_of(&self, id: &str) -> Option<DepthClass> {
        self.depth_of(id).map(DepthClass::from_depth)
    }

    pub fn parent_of(&self, id: &str) -> Option<&'a GovernanceNode> {
        let &i = self.by_id.get(id)?;
        self.parent[i].map(|p| &self.nodes[p])
    }

    /// All nodes at depth `d`, in tree order.
    pub fn all_at_depth(&self, d: u32) -> Vec<&'a GovernanceNode> {
        self.order
            .iter()
            .filter(|&&i| self.depth[i] == d)
            .map(|&i| &self.nodes[i])
            .collect()
    }

    /// Every node, parents before children, siblings in order.
    pub fn iter_tree_order(&self) -> impl Iterator<Item = &'a GovernanceNode> + '_ {
        self.order.iter().map(|&i| &self.nodes[i])
    }

    pub fn max_depth(&self) -> u32 {
        self.depth.iter().copied().max().unwrap_or(0)
    }

    pub fn anomalies(&self) -> &[HierarchyAnomaly] {
        &self.anomalies
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Resolve a flat snapshot into a [`HierarchyIndex`].
///
/// An empty snapshot resolves to an empty index (no root); layout then
/// reports `NoRootNode`.
pub fn resolve(nodes: &[GovernanceNode], policy: OrphanPolicy) -> Result<HierarchyIndex<'_>> {
    if nodes.is_empty() {
        return Ok(HierarchyIndex::empty(nodes));
    }

    let mut by_id: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, n) in nodes.iter().enumerate() {
        if by_id.insert(n.id.as_str(), i).is_some() {
            return Err(EngineError::MalformedHierarchy(format!(
                "duplicate node id {}",
                n.id
            )));
        }
        if n.root_path.iter().any(|a| a == &n.id) {
            return Err(EngineError::MalformedHierarchy(format!(
                "node {} lists itself in its root path",
                n.id
            )));
        }
    }

    let roots: Vec<usize> = (0..nodes.len())
        .filter(|&i| nodes[i].root_path.is_empty())
        .collect();
    let root = match roots.as_slice() {
        [r] => *r,
        _ => {
            return Err(EngineError::MalformedHierarchy(format!(
                "expected exactly one root, found {}",
                roots.len()
            )))
        }
    };

    let mut parent: Vec<Option<usize>> = vec![None; nodes.len()];
    let mut depth: Vec<u32> = vec![0; nodes.len()];
    let mut anomalies = Vec::new();

    // Ancestors always have a smaller declared depth, so this order
    // guarantees a parent's effective depth is known first.
    let mut pending: Vec<usize> = (0..nodes.len()).filter(|&i| i != root).collect();
    pending.sort_by_key(|&i| nodes[i].root_path.len());

    for i in pending {
        let node = &nodes[i];
        let declared_depth = node.root_path.len();
        let declared_parent = &node.root_path[declared_depth - 1];

        // An ancestor at path position k resolves only if it exists and
        // itself sits at declared depth k.
        let resolves = |k: usize| -> Option<usize> {
            let &a = by_id.get(node.root_path[k].as_str())?;
            (nodes[a].root_path.len() == k).then_some(a)
        };

        if let Some(p) = resolves(declared_depth - 1) {
            parent[i] = Some(p);
            depth[i] = depth[p] + 1;
            continue;
        }

        match policy {
            OrphanPolicy::Strict => {
                return Err(EngineError::MalformedHierarchy(format!(
                    "node {} references unresolved parent {}",
                    node.id, declared_parent
                )));
            }
            OrphanPolicy::Reattach => {
                let ancestor = (0..declared_depth - 1).rev().find_map(resolves);
                let (p, kind) = match ancestor {
                    Some(a) => (a, AnomalyKind::ReattachedToAncestor),
                    None => (root, AnomalyKind::PromotedToBranch),
                };
                log::warn!(
                    "node {} has unresolved parent {}; attached to {} ({:?})",
                    node.id,
                    declared_parent,
                    nodes[p].id,
                    kind
                );
                parent[i] = Some(p);
                depth[i] = depth[p] + 1;
                anomalies.push(HierarchyAnomaly {
                    node_id: node.id.clone(),
                    declared_parent: declared_parent.clone(),
                    attached_to: nodes[p].id.clone(),
                    kind,
                });
            }
        }
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, p) in parent.iter().enumerate() {
        if let Some(p) = *p {
            children[p].push(i);
        }
    }
    for (p, kids) in children.iter_mut().enumerate() {
        let listed: HashMap<&str, usize> = nodes[p]
            .children_ids
            .iter()
            .enumerate()
            .map(|(pos, id)| (id.as_str(), pos))
            .collect();
        kids.sort_by_key(|&c| {
            (
                listed.get(nodes[c].id.as_str()).copied().unwrap_or(usize::MAX),
                c,
            )
        });
        let unlisted = kids
            .iter()
            .filter(|&&c| !listed.contains_key(nodes[c].id.as_str()))
            .count();
        if unlisted > 0 {
            log::debug!(
                "node {} has {} children not listed in children_ids",
                nodes[p].id,
                unlisted
            );
        }
    }

    let mut order = Vec::with_capacity(nodes.len());
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([root]);
    while let Some(i) = queue.pop_front() {
        if !seen.insert(i) {
            continue;
        }
        order.push(i);
        queue.extend(children[i].iter().copied());
    }

    Ok(HierarchyIndex {
        nodes,
        by_id,
        parent,
        depth,
        children,
        order,
        root: Some(root),
        anomalies,
    })
}
