//! Arena-backed binary/multifurcating tree storage.
//!
//! Trees are stored as a flat `Vec<TreeNode>` addressed by `NodeId` rather
//! than through `Rc`/`RefCell` pointers. The constraint trees get
//! re-rooted and grafted onto repeatedly over the course of a merge; an
//! arena means those edits can never leave a stale pointer or aliasing
//! hazard behind, they just produce new (or orphaned, unreachable) indices
//! into the same `Vec`.
//!
//! Structural edits here are all iterative (no recursion), since constraint
//! trees built from real data can be deep enough that a recursive walk
//! risks overflowing the stack.

use crate::bitset::Bitset;
use crate::taxon::TaxonId;

pub type NodeId = usize;
pub type CladeBitmask = Bitset;

/// A single node in a `TreeStore` arena.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// `Some` for leaves, `None` for internal nodes.
    pub taxon: Option<TaxonId>,
}

impl TreeNode {
    fn leaf(taxon: TaxonId) -> Self {
        TreeNode { parent: None, children: Vec::new(), taxon: Some(taxon) }
    }

    fn internal() -> Self {
        TreeNode { parent: None, children: Vec::new(), taxon: None }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// An arena of `TreeNode`s plus a designated root.
#[derive(Debug, Clone)]
pub struct TreeStore {
    nodes: Vec<TreeNode>,
    root: NodeId,
    words: usize,
}

impl TreeStore {
    /// Creates an empty store. `words` is the number of u64 words needed to
    /// hold a clade bitmask over the full taxon universe this tree is part
    /// of (shared across both constraint trees and the output tree, so
    /// clade masks from different `TreeStore`s compare directly).
    pub fn new(words: usize) -> Self {
        TreeStore { nodes: Vec::new(), root: 0, words }
    }

    pub fn words(&self) -> usize {
        self.words
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn set_root(&mut self, node: NodeId) {
        self.root = node;
    }

    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_leaf(&mut self, taxon: TaxonId) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(TreeNode::leaf(taxon));
        id
    }

    pub fn add_internal(&mut self) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(TreeNode::internal());
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent].children.push(child);
        self.nodes[child].parent = Some(parent);
    }

    /// Attaches an already-built child under `parent`, for callers
    /// reconstructing a tree of known shape (e.g. from a parsed Newick
    /// tree) one node at a time rather than via `attach_under_new_root`.
    pub fn link_child(&mut self, parent: NodeId, child: NodeId) {
        self.link(parent, child);
    }

    /// Creates a fresh node with children `[a, b]` and makes it the new
    /// root of this store. Used both to grow the NJ output tree one join
    /// at a time and by the constraint editor to replace a tree's root
    /// after a graft.
    pub fn attach_under_new_root(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let r = self.add_internal();
        self.link(r, a);
        self.link(r, b);
        self.root = r;
        r
    }

    /// Iterative post-order traversal starting at `start`.
    pub fn postorder(&self, start: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![(start, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                out.push(id);
                continue;
            }
            stack.push((id, true));
            for &c in &self.nodes[id].children {
                stack.push((c, false));
            }
        }
        out
    }

    /// Returns the clade bitmask (set of taxa at or below `node`) computed
    /// fresh via a single bottom-up pass over `node`'s subtree.
    pub fn leaves(&self, node: NodeId) -> CladeBitmask {
        let order = self.postorder(node);
        let mut cache: std::collections::HashMap<NodeId, CladeBitmask> =
            std::collections::HashMap::with_capacity(order.len());
        for &id in &order {
            let n = &self.nodes[id];
            let mut mask = CladeBitmask::zeros(self.words);
            if let Some(t) = n.taxon {
                mask.set(t);
            }
            for &c in &n.children {
                mask.or_assign(&cache[&c]);
            }
            cache.insert(id, mask);
        }
        cache.remove(&node).unwrap()
    }

    /// Path from the current root down to `node`, inclusive of both ends.
    fn path_from_root(&self, node: NodeId) -> Vec<NodeId> {
        let mut v = vec![node];
        let mut cur = node;
        while let Some(p) = self.nodes[cur].parent {
            v.push(p);
            cur = p;
        }
        v.reverse();
        v
    }

    /// Reverses every parent/child link on the path from the current root
    /// down to `target`, so that `target` becomes parentless (the root of
    /// what used to be "above" it). Does not touch `self.root`; callers
    /// update it once the new root node exists.
    fn reverse_path_to(&mut self, target: NodeId) {
        if target == self.root {
            return;
        }
        let path = self.path_from_root(target);
        for i in (1..path.len()).rev() {
            let child = path[i];
            let parent = path[i - 1];
            self.nodes[parent].children.retain(|&c| c != child);
            self.nodes[child].children.push(parent);
            self.nodes[parent].parent = Some(child);
        }
        self.nodes[target].parent = None;
    }

    /// Re-roots the tree on the edge immediately above `node`, producing a
    /// fresh root whose two children are `node` (its subtree unchanged)
    /// and a node representing the rest of the tree. A no-op if `node` is
    /// already the root (there is no incoming edge to reroot on).
    ///
    /// Binary constraint trees always have exactly two children per
    /// internal node, so the node `node` is detached from has exactly one
    /// child left afterwards; when that node is the old root, it is
    /// spliced out rather than kept as a degree-one wrapper.
    pub fn reroot_on_edge(&mut self, node: NodeId) {
        if node == self.root {
            return;
        }
        let parent = self.nodes[node]
            .parent
            .expect("non-root node must have a parent");

        self.nodes[parent].children.retain(|&c| c != node);
        self.nodes[node].parent = None;

        if parent == self.root {
            debug_assert_eq!(self.nodes[parent].children.len(), 1);
            let sibling = self.nodes[parent].children[0];
            self.nodes[sibling].parent = None;
            self.nodes[parent].children.clear();
            let r = self.add_internal();
            self.link(r, node);
            self.link(r, sibling);
            self.root = r;
        } else {
            self.reverse_path_to(parent);
            let r = self.add_internal();
            self.link(r, node);
            self.link(r, parent);
            self.root = r;
        }
    }

    /// Collapses the root's two children into a single unrooted
    /// representation with three children at the (now notional) root,
    /// suppressing the arbitrary rooted bifurcation an NJ join or a graft
    /// leaves behind. A leaf child can't be spliced, so whichever child is
    /// internal is the one collapsed regardless of subtree size; only a
    /// true two-leaf tree (both children are leaves) stays a cherry.
    pub fn unroot(&mut self) {
        let children = self.nodes[self.root].children.clone();
        if children.len() != 2 {
            return;
        }
        let (c0, c1) = (children[0], children[1]);
        let c0_leaf = self.nodes[c0].is_leaf();
        let c1_leaf = self.nodes[c1].is_leaf();
        if c0_leaf && c1_leaf {
            // Nothing to splice; a two-leaf tree stays rooted at a cherry.
            return;
        }
        let (keep, collapse) = if c1_leaf {
            (c1, c0)
        } else if c0_leaf {
            (c0, c1)
        } else if self.nodes[c0].children.len() >= self.nodes[c1].children.len() {
            (c0, c1)
        } else {
            (c1, c0)
        };
        let grandchildren = self.nodes[collapse].children.clone();
        self.nodes[self.root].children.clear();
        self.link(self.root, keep);
        for gc in grandchildren {
            self.link(self.root, gc);
        }
    }

    /// Deep-copies the subtree rooted at `node` in `other` into `self`,
    /// returning the new (parentless) root of the copy.
    pub fn clone_subtree_from(&mut self, other: &TreeStore, node: NodeId) -> NodeId {
        let order = other.postorder(node);
        let mut mapped: std::collections::HashMap<NodeId, NodeId> =
            std::collections::HashMap::with_capacity(order.len());
        for &id in &order {
            let n = other.node(id);
            let new_id = match n.taxon {
                Some(t) => self.add_leaf(t),
                None => self.add_internal(),
            };
            for &c in &n.children {
                self.link(new_id, mapped[&c]);
            }
            mapped.insert(id, new_id);
        }
        mapped[&node]
    }

    /// Builds the induced subtree restricted to `keep`, collapsing any
    /// internal node left with fewer than two surviving children. Leaves
    /// whose taxon is not in `keep` are dropped entirely.
    pub fn restrict_to(&self, keep: &std::collections::HashSet<TaxonId>) -> TreeStore {
        let mut out = TreeStore::new(self.words);
        let order = self.postorder(self.root);
        let mut mapped: std::collections::HashMap<NodeId, NodeId> =
            std::collections::HashMap::with_capacity(order.len());
        for &id in &order {
            let n = &self.nodes[id];
            if n.is_leaf() {
                if let Some(t) = n.taxon {
                    if keep.contains(&t) {
                        mapped.insert(id, out.add_leaf(t));
                    }
                }
                continue;
            }
            let mapped_children: Vec<NodeId> =
                n.children.iter().filter_map(|c| mapped.get(c).copied()).collect();
            match mapped_children.len() {
                0 => {}
                1 => {
                    mapped.insert(id, mapped_children[0]);
                }
                _ => {
                    let new_id = out.add_internal();
                    for c in mapped_children {
                        out.link(new_id, c);
                    }
                    mapped.insert(id, new_id);
                }
            }
        }
        if let Some(&r) = mapped.get(&self.root) {
            out.root = r;
        }
        out
    }

    /// Resolves multifurcations (nodes with more than two children) into a
    /// sequence of bifurcations, left to right. Constraint trees are
    /// binarized before the merge so every clade has a well-defined two-way
    /// split; the resulting cherries carry no information not already
    /// implied by the original polytomy.
    pub fn resolve_polytomies(&mut self) {
        let mut i = 0;
        while i < self.nodes.len() {
            while self.nodes[i].children.len() > 2 {
                let last = self.nodes[i].children.pop().unwrap();
                let second_last = self.nodes[i].children.pop().unwrap();
                let new_id = self.nodes.len();
                self.nodes.push(TreeNode::internal());
                self.nodes[new_id].children.push(second_last);
                self.nodes[new_id].children.push(last);
                self.nodes[second_last].parent = Some(new_id);
                self.nodes[last].parent = Some(new_id);
                self.nodes[new_id].parent = Some(i);
                self.nodes[i].children.push(new_id);
            }
            i += 1;
        }
    }

    pub fn leaf_taxa(&self) -> std::collections::HashSet<TaxonId> {
        self.nodes.iter().filter_map(|n| n.taxon).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf_tree(words: usize, taxa: &[TaxonId]) -> TreeStore {
        let mut t = TreeStore::new(words);
        let leaves: Vec<NodeId> = taxa.iter().map(|&x| t.add_leaf(x)).collect();
        let mut cur = leaves[0];
        for &l in &leaves[1..] {
            cur = t.attach_under_new_root(cur, l);
        }
        t
    }

    #[test]
    fn leaves_computes_clade_bitmask() {
        let t = leaf_tree(1, &[0, 1, 2]);
        let mask = t.leaves(t.root());
        assert_eq!(mask.count_ones(), 3);
    }

    #[test]
    fn reroot_on_edge_preserves_subtree_and_produces_bifurcation() {
        // ((0,1),2) rooted arbitrarily; reroot on the edge above leaf 2.
        let mut t = TreeStore::new(1);
        let l0 = t.add_leaf(0);
        let l1 = t.add_leaf(1);
        let l2 = t.add_leaf(2);
        let cherry = t.attach_under_new_root(l0, l1);
        t.attach_under_new_root(cherry, l2);

        let before = t.leaves(t.root());

        t.reroot_on_edge(l2);
        let root_children = t.node(t.root()).children.clone();
        assert_eq!(root_children.len(), 2);
        assert!(root_children.contains(&l2));

        let after = t.leaves(t.root());
        assert_eq!(before, after);

        let l2_mask = t.leaves(l2);
        assert_eq!(l2_mask.count_ones(), 1);
        assert!(l2_mask.get(2));
    }

    #[test]
    fn reroot_on_edge_is_noop_at_root() {
        let mut t = leaf_tree(1, &[0, 1, 2]);
        let root_before = t.root();
        t.reroot_on_edge(root_before);
        assert_eq!(t.root(), root_before);
    }

    #[test]
    fn unroot_produces_three_children_at_root() {
        let mut t = leaf_tree(1, &[0, 1, 2, 3]);
        t.unroot();
        assert_eq!(t.node(t.root()).children.len(), 3);
        assert_eq!(t.leaves(t.root()).count_ones(), 4);
    }

    #[test]
    fn clone_subtree_from_is_structurally_independent() {
        let src = leaf_tree(1, &[0, 1, 2]);
        let mut dst = TreeStore::new(1);
        let copied = dst.clone_subtree_from(&src, src.root());
        assert_eq!(dst.leaves(copied), src.leaves(src.root()));
        assert_eq!(dst.len(), src.len());
    }

    #[test]
    fn restrict_to_drops_absent_taxa_and_collapses_degree_two() {
        let t = leaf_tree(1, &[0, 1, 2, 3]);
        let keep: std::collections::HashSet<TaxonId> = [0, 2].into_iter().collect();
        let restricted = t.restrict_to(&keep);
        let mask = restricted.leaves(restricted.root());
        assert_eq!(mask.count_ones(), 2);
        assert!(mask.get(0) && mask.get(2));
        for id in 0..restricted.len() {
            let n = restricted.node(id);
            assert!(n.is_leaf() || n.children.len() >= 2);
        }
    }

    #[test]
    fn resolve_polytomies_makes_every_internal_node_binary() {
        let mut t = TreeStore::new(1);
        let l0 = t.add_leaf(0);
        let l1 = t.add_leaf(1);
        let l2 = t.add_leaf(2);
        let l3 = t.add_leaf(3);
        let root = t.add_internal();
        for l in [l0, l1, l2, l3] {
            t.link(root, l);
        }
        t.set_root(root);
        t.resolve_polytomies();
        for id in 0..t.len() {
            let n = t.node(id);
            assert!(n.is_leaf() || n.children.len() == 2);
        }
        assert_eq!(t.leaves(t.root()).count_ones(), 4);
    }
}
