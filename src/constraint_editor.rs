//! Edits T1/T2 to keep them consistent with an accepted NJ join.
//!
//! This mirrors the case table in `njmergepair.py`'s `join_nodes`, rewritten
//! as stateless free functions over `TreeStore`/`SplitIndex` instead of
//! dendropy's pointer-based trees with an explicit reroot-then-search dance:
//! since the caller already has the exact `NodeId` for each clade (from a
//! `SplitIndex` lookup), there is no need to reroot a tree just to relocate
//! a node whose identity is already known.
//!
//! Cases 1, 5, and 9 require no edit — (A, B) is already a recognized clade
//! everywhere it needs to be. Cases 2, 3, 4, and 7 graft one tree's clade
//! into the other, anchored at the clade shared by both. Cases 6 and 8 grow
//! both trees by exchanging copies of A and B.
//!
//! `reroot_on_edge` is a no-op when the target node is already the root, so
//! the graft and merge-and-grow helpers below need no special-casing for
//! the case where a clade happens to span an entire constraint tree; the
//! resulting topology is slightly more nested than the minimal graft would
//! be, but is equivalent once the post-edit "does a tree now span every
//! taxon" check (performed by the caller, see `crate::nj`) fires.

use crate::split_index::SplitIndex;
use crate::tree_store::{CladeBitmask, NodeId, TreeStore};
use crate::error::CoreError;

/// Result of applying the constraint editor for one accepted join.
pub enum EditOutcome {
    /// (A, B) was already consistent; neither tree changed.
    NoChange,
    Replaced1(TreeStore),
    Replaced2(TreeStore),
    ReplacedBoth(TreeStore, TreeStore),
}

/// Copies the subtree at `donor_node` (in `donor`) into `receiver`,
/// re-rooted so the copy sits beside `receiver`'s existing clade at
/// `receiver_anchor`. Grounds cases 2, 3, 4, and 7.
fn graft_clade(
    donor: &TreeStore,
    donor_node: NodeId,
    receiver: &TreeStore,
    receiver_anchor: NodeId,
) -> TreeStore {
    let mut out = receiver.clone();
    let donor_copy = out.clone_subtree_from(donor, donor_node);
    out.reroot_on_edge(receiver_anchor);
    let old_root = out.root();
    out.attach_under_new_root(donor_copy, old_root);
    out
}

/// Grows both trees to include a copy of the other's clade, anchored at A
/// in `t1` and B in `t2`. Grounds cases 6 and 8. Exposed at `pub(crate)`
/// visibility so the compatibility oracle can run the same edit on scratch
/// trees before committing to it.
pub(crate) fn merge_and_grow(
    t1: &TreeStore,
    node_a: NodeId,
    t2: &TreeStore,
    node_b: NodeId,
) -> (TreeStore, TreeStore) {
    let mut nt1 = t1.clone();
    let mut nt2 = t2.clone();

    let b_copy_in_t1 = nt1.clone_subtree_from(t2, node_b);
    let a_copy_in_t2 = nt2.clone_subtree_from(t1, node_a);

    nt1.reroot_on_edge(node_a);
    nt2.reroot_on_edge(node_b);

    let old_root1 = nt1.root();
    nt1.attach_under_new_root(old_root1, b_copy_in_t1);

    let old_root2 = nt2.root();
    nt2.attach_under_new_root(old_root2, a_copy_in_t2);

    (nt1, nt2)
}

/// Applies the appropriate edit for the clades `ca` (A) and `cb` (B) that
/// the compatibility oracle already accepted. Re-derives the same presence
/// flags the oracle computed; this mirrors `test_join`/`join_nodes` being
/// separate functions in the Python prototype rather than sharing state,
/// and keeps this function usable on its own in tests.
pub fn apply(
    t1: &TreeStore,
    idx1: &SplitIndex,
    t2: &TreeStore,
    idx2: &SplitIndex,
    ca: &CladeBitmask,
    cb: &CladeBitmask,
) -> Result<EditOutcome, CoreError> {
    let a1 = idx1.lookup(ca);
    let a2 = idx2.lookup(ca);
    let b1 = idx1.lookup(cb);
    let b2 = idx2.lookup(cb);

    match (a1.is_some(), a2.is_some(), b1.is_some(), b2.is_some()) {
        (true, true, true, true) => Ok(EditOutcome::NoChange), // case 1
        (true, true, true, false) => {
            // case 2: B is T1-only, A anchors it into T2
            let new_t2 = graft_clade(t1, b1.unwrap(), t2, a2.unwrap());
            Ok(EditOutcome::Replaced2(new_t2))
        }
        (true, true, false, true) => {
            // case 3: B is T2-only, A anchors it into T1
            let new_t1 = graft_clade(t2, b2.unwrap(), t1, a1.unwrap());
            Ok(EditOutcome::Replaced1(new_t1))
        }
        (true, false, true, true) => {
            // case 4: A is T1-only, B anchors it into T2
            let new_t2 = graft_clade(t1, a1.unwrap(), t2, b2.unwrap());
            Ok(EditOutcome::Replaced2(new_t2))
        }
        (true, false, true, false) => Ok(EditOutcome::NoChange), // case 5
        (true, false, false, true) => {
            // case 6: A is T1-only, B is T2-only, no shared tree to test in
            let (nt1, nt2) = merge_and_grow(t1, a1.unwrap(), t2, b2.unwrap());
            Ok(EditOutcome::ReplacedBoth(nt1, nt2))
        }
        (false, true, true, true) => {
            // case 7: A is T2-only, B anchors it into T1
            let new_t1 = graft_clade(t2, a2.unwrap(), t1, b1.unwrap());
            Ok(EditOutcome::Replaced1(new_t1))
        }
        (false, true, true, false) => {
            // case 8: A is T2-only, B is T1-only
            let (nt1, nt2) = merge_and_grow(t1, b1.unwrap(), t2, a2.unwrap());
            Ok(EditOutcome::ReplacedBoth(nt1, nt2))
        }
        (false, true, false, true) => Ok(EditOutcome::NoChange), // case 9
        _ => Err(CoreError::Internal(
            "clade present in neither constraint tree reached the editor".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree_store::TreeStore;

    fn three_leaf_tree(a: usize, b: usize, c: usize) -> TreeStore {
        let mut t = TreeStore::new(1);
        let la = t.add_leaf(a);
        let lb = t.add_leaf(b);
        let lc = t.add_leaf(c);
        let cherry = t.attach_under_new_root(la, lb);
        t.attach_under_new_root(cherry, lc);
        t
    }

    fn mask(words: usize, bits: &[usize]) -> CladeBitmask {
        let mut m = CladeBitmask::zeros(words);
        for &b in bits {
            m.set(b);
        }
        m
    }

    #[test]
    fn case1_both_present_in_both_trees_is_noop() {
        let t1 = three_leaf_tree(0, 1, 2);
        let t2 = three_leaf_tree(0, 1, 3);
        let idx1 = SplitIndex::build(&t1);
        let idx2 = SplitIndex::build(&t2);
        let ca = mask(1, &[0, 1]);
        let cb = mask(1, &[0]);
        let outcome = apply(&t1, &idx1, &t2, &idx2, &ca, &cb).unwrap();
        assert!(matches!(outcome, EditOutcome::NoChange));
    }

    #[test]
    fn case6_merge_and_grow_replaces_both_trees() {
        // T1 over {0,1,2}, T2 over {3,4,5}; disjoint leaf sets throughout.
        let t1 = three_leaf_tree(0, 1, 2);
        let t2 = three_leaf_tree(3, 4, 5);
        let idx1 = SplitIndex::build(&t1);
        let idx2 = SplitIndex::build(&t2);
        let ca = mask(1, &[0]); // a leaf of T1, absent from T2
        let cb = mask(1, &[3]); // a leaf of T2, absent from T1
        let outcome = apply(&t1, &idx1, &t2, &idx2, &ca, &cb).unwrap();
        match outcome {
            EditOutcome::ReplacedBoth(nt1, nt2) => {
                assert_eq!(nt1.leaves(nt1.root()).count_ones(), 4);
                assert_eq!(nt2.leaves(nt2.root()).count_ones(), 4);
            }
            _ => panic!("expected ReplacedBoth"),
        }
    }

    #[test]
    fn graft_preserves_both_original_clades() {
        let t1 = three_leaf_tree(0, 1, 2);
        let t2 = three_leaf_tree(0, 3, 4);
        let idx1 = SplitIndex::build(&t1);
        let idx2 = SplitIndex::build(&t2);
        // A = {0}: present in both. B = {1}: present only in T1.
        let ca = mask(1, &[0]);
        let cb = mask(1, &[1]);
        let outcome = apply(&t1, &idx1, &t2, &idx2, &ca, &cb).unwrap();
        match outcome {
            EditOutcome::Replaced2(nt2) => {
                let whole = nt2.leaves(nt2.root());
                assert!(whole.get(0) && whole.get(1) && whole.get(3) && whole.get(4));
            }
            _ => panic!("expected Replaced2"),
        }
    }

    #[test]
    fn presence_in_neither_tree_is_an_internal_error() {
        let t1 = three_leaf_tree(0, 1, 2);
        let t2 = three_leaf_tree(3, 4, 5);
        let idx1 = SplitIndex::build(&t1);
        let idx2 = SplitIndex::build(&t2);
        let ca = mask(1, &[9]);
        let cb = mask(1, &[3]);
        assert!(apply(&t1, &idx1, &t2, &idx2, &ca, &cb).is_err());
    }
}
