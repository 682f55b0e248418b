//! Maps clade bitmasks to the tree node that induces them.
//!
//! A split (bipartition) of a tree's leaf set can be named by either side
//! of the edge that induces it. To make bitmask equality double as split
//! equality, every split is stored under a single canonical side: whichever
//! side does *not* contain the tree's lowest-numbered taxon. This mirrors
//! the complement-canonicalization `TreeSnapshot` uses for Robinson-Foulds
//! comparisons, generalized from "leaf 0 globally" to "the lowest taxon
//! actually present in this tree" since a constraint tree's own leaf set is
//! usually a strict subset of the full taxon universe.
//!
//! One consequence falls out for free: the whole-tree clade canonicalizes
//! to the all-zero bitmask, which this index maps to the root. Looking up
//! the entire leaf set of a tree, or the empty set, both resolve to the
//! root without any special-casing in `lookup`.

use std::collections::HashMap;

use crate::tree_store::{CladeBitmask, NodeId, TreeStore};

/// An index from canonical clade bitmask to the node of a specific
/// `TreeStore` whose clade it names. Must be rebuilt after any structural
/// edit to the tree it indexes — it holds no reference back to the tree.
pub struct SplitIndex {
    map: HashMap<CladeBitmask, NodeId>,
    leaf_mask: CladeBitmask,
    anchor: Option<usize>,
}

impl SplitIndex {
    /// Builds an index over every node of `store` in a single bottom-up
    /// pass (no per-node re-traversal).
    pub fn build(store: &TreeStore) -> Self {
        let words = store.words();
        let order = store.postorder(store.root());
        let mut clade_of: HashMap<NodeId, CladeBitmask> = HashMap::with_capacity(order.len());
        for &id in &order {
            let n = store.node(id);
            let mut mask = CladeBitmask::zeros(words);
            if let Some(t) = n.taxon {
                mask.set(t);
            }
            for &c in &n.children {
                mask.or_assign(&clade_of[&c]);
            }
            clade_of.insert(id, mask);
        }

        let leaf_mask = clade_of.get(&store.root()).cloned().unwrap_or_else(|| CladeBitmask::zeros(words));
        let anchor = leaf_mask.lowest_set_bit();

        let mut map = HashMap::with_capacity(order.len());
        for &id in &order {
            let clade = &clade_of[&id];
            let canonical = Self::canonicalize(clade, &leaf_mask, anchor);
            map.insert(canonical, id);
        }

        SplitIndex { map, leaf_mask, anchor }
    }

    fn canonicalize(clade: &CladeBitmask, leaf_mask: &CladeBitmask, anchor: Option<usize>) -> CladeBitmask {
        match anchor {
            Some(a) if clade.get(a) => clade.complement_within(leaf_mask),
            _ => clade.clone(),
        }
    }

    /// Returns the node of the indexed tree whose clade equals `clade`, if
    /// any. `clade` need not already be expressed in canonical form.
    pub fn lookup(&self, clade: &CladeBitmask) -> Option<NodeId> {
        let canonical = Self::canonicalize(clade, &self.leaf_mask, self.anchor);
        self.map.get(&canonical).copied()
    }

    pub fn leaf_mask(&self) -> &CladeBitmask {
        &self.leaf_mask
    }
}
