//! Compatibility oracle: decides whether joining two clades is consistent
//! with both constraint trees before the NJ loop commits to it.
//!
//! Mirrors `njmergepair.py`'s `test_join`, covering the same nine cases by
//! presence of A and B across T1 and T2. For every tree where both A and B
//! happen to be present, (A, B) must already be a recognized clade there —
//! a single `SplitIndex::lookup` on `A ∪ B`. That one rule covers cases 1,
//! 5, and 9 (check whichever tree(s) contain both) and cases 2, 3, 4, and 7
//! (exactly one tree contains both) uniformly.
//!
//! When no tree contains both A and B (cases 6 and 8 — A only in one tree,
//! B only in the other), there is no tree to test a clade membership in
//! directly. Instead the prospective "merge-and-grow" edit is simulated on
//! scratch copies of T1 and T2, and the two results are required to agree
//! on every split over their shared leaf set.

use std::collections::HashSet;

use crate::constraint_editor;
use crate::error::CoreError;
use crate::split_index::SplitIndex;
use crate::tree_store::{CladeBitmask, TreeStore};

/// Returns whether joining the clades `ca` and `cb` is compatible with both
/// constraint trees.
pub fn is_compatible(
    t1: &TreeStore,
    idx1: &SplitIndex,
    t2: &TreeStore,
    idx2: &SplitIndex,
    ca: &CladeBitmask,
    cb: &CladeBitmask,
) -> Result<bool, CoreError> {
    let a1 = idx1.lookup(ca).is_some();
    let a2 = idx2.lookup(ca).is_some();
    let b1 = idx1.lookup(cb).is_some();
    let b2 = idx2.lookup(cb).is_some();

    if !a1 && !a2 {
        return Err(CoreError::Internal("clade A present in neither constraint tree".into()));
    }
    if !b1 && !b2 {
        return Err(CoreError::Internal("clade B present in neither constraint tree".into()));
    }

    let union = ca.union(cb);
    let mut checked_any = false;
    let mut all_ok = true;

    if a1 && b1 {
        checked_any = true;
        all_ok &= idx1.lookup(&union).is_some();
    }
    if a2 && b2 {
        checked_any = true;
        all_ok &= idx2.lookup(&union).is_some();
    }

    if checked_any {
        return Ok(all_ok);
    }

    // Cases 6/8: A and B never co-present in the same tree.
    simulate_merge_and_grow_compatible(t1, idx1, t2, idx2, ca, cb)
}

fn simulate_merge_and_grow_compatible(
    t1: &TreeStore,
    idx1: &SplitIndex,
    t2: &TreeStore,
    idx2: &SplitIndex,
    ca: &CladeBitmask,
    cb: &CladeBitmask,
) -> Result<bool, CoreError> {
    // One of A, B is in T1 only, the other in T2 only (case 6 or 8).
    // `merge_and_grow`'s first node argument must index into t1 and its
    // second into t2, regardless of whether that node is A's or B's.
    let (node_in_t1, node_in_t2) = match (idx1.lookup(ca), idx2.lookup(cb)) {
        (Some(a_in_t1), Some(b_in_t2)) => (a_in_t1, b_in_t2),
        _ => match (idx1.lookup(cb), idx2.lookup(ca)) {
            (Some(b_in_t1), Some(a_in_t2)) => (b_in_t1, a_in_t2),
            _ => {
                return Err(CoreError::Internal(
                    "neither (A in T1, B in T2) nor (B in T1, A in T2) holds".into(),
                ))
            }
        },
    };

    let (grown1, grown2) = constraint_editor::merge_and_grow(t1, node_in_t1, t2, node_in_t2);

    // Computed from the *grown* trees, not the pre-grow ones: the grafted
    // clades (CA into T2, CB into T1) are exactly the new overlap the grow
    // introduces, and are the whole reason this test exists. Restricting to
    // the stale pre-grow overlap would silently drop them and always agree.
    let shared: HashSet<_> = grown1.leaf_taxa().intersection(&grown2.leaf_taxa()).copied().collect();

    if shared.is_empty() {
        // Nothing to compare yet; any growth is vacuously compatible.
        return Ok(true);
    }

    let mut r1 = grown1.restrict_to(&shared);
    let mut r2 = grown2.restrict_to(&shared);
    r1.unroot();
    r2.unroot();

    Ok(unrooted_splits(&r1) == unrooted_splits(&r2))
}

/// Canonical (complement-normalized) non-trivial bipartitions of `tree`,
/// for Robinson-Foulds-style comparison against another tree over the same
/// leaf set. Trivial splits (a single leaf or the whole tree) carry no
/// information and are skipped, matching `TreeSnapshot::collect_partitions`.
fn unrooted_splits(tree: &TreeStore) -> HashSet<CladeBitmask> {
    let idx = SplitIndex::build(tree);
    let leaf_mask = idx.leaf_mask().clone();
    let total = leaf_mask.count_ones();
    let order = tree.postorder(tree.root());
    let mut out = HashSet::new();
    for id in order {
        let clade = tree.leaves(id);
        let size = clade.count_ones();
        if size <= 1 || size >= total {
            continue;
        }
        out.insert(if clade.get(leaf_mask.lowest_set_bit().unwrap()) {
            clade.complement_within(&leaf_mask)
        } else {
            clade
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree_store::TreeStore;

    fn cherry(a: usize, b: usize, c: usize) -> TreeStore {
        let mut t = TreeStore::new(1);
        let la = t.add_leaf(a);
        let lb = t.add_leaf(b);
        let lc = t.add_leaf(c);
        let inner = t.attach_under_new_root(la, lb);
        t.attach_under_new_root(inner, lc);
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
    fn matching_clade_in_shared_tree_is_compatible() {
        let t1 = cherry(0, 1, 2);
        let t2 = cherry(0, 1, 3);
        let idx1 = SplitIndex::build(&t1);
        let idx2 = SplitIndex::build(&t2);
        let ca = mask(1, &[0, 1]);
        let cb = mask(1, &[0]);
        assert!(is_compatible(&t1, &idx1, &t2, &idx2, &ca, &cb).unwrap());
    }

    #[test]
    fn mismatched_clade_in_shared_tree_is_rejected() {
        let t1 = cherry(0, 1, 2); // (0,1) is a cherry here
        let t2 = cherry(0, 2, 1); // (0,2) is a cherry here instead
        let idx1 = SplitIndex::build(&t1);
        let idx2 = SplitIndex::build(&t2);
        let ca = mask(1, &[0]);
        let cb = mask(1, &[1]);
        // both present in both trees (case 1): requesting to join (0,1)
        // requires {0,1} to be a clade in both; it is not in t2.
        assert!(!is_compatible(&t1, &idx1, &t2, &idx2, &ca, &cb).unwrap());
    }

    #[test]
    fn disjoint_clades_fall_through_to_simulation() {
        let t1 = cherry(0, 1, 2);
        let t2 = cherry(3, 4, 5);
        let idx1 = SplitIndex::build(&t1);
        let idx2 = SplitIndex::build(&t2);
        let ca = mask(1, &[0]);
        let cb = mask(1, &[3]);
        // disjoint leaf sets so far means the simulated grow is vacuously fine
        assert!(is_compatible(&t1, &idx1, &t2, &idx2, &ca, &cb).unwrap());
    }

    #[test]
    fn grown_overlap_catches_conflict_pre_grow_overlap_would_miss() {
        // T1 = (((p,a),q),(r,s)), T2 = ((p,(q,b)),(r,s)); p,q,r,s already
        // occur in both (taxa 2,3,4,5), so the pre-grow leaf-taxa
        // intersection is {p,q,r,s} and is already mutually consistent
        // there (both restrict to (p,q),(r,s)) — a stale pre-grow shared
        // set would find nothing new and call this compatible. But growing
        // puts a and b on opposite sides of p vs q (T1 nests a next to p,
        // T2 nests b next to q), which only shows up once the shared set
        // is recomputed from the grown trees to include a and b.
        let mut t1 = TreeStore::new(1);
        let lp1 = t1.add_leaf(2);
        let la = t1.add_leaf(0);
        let pa = t1.attach_under_new_root(lp1, la);
        let lq1 = t1.add_leaf(3);
        let paq = t1.attach_under_new_root(pa, lq1);
        let lr1 = t1.add_leaf(4);
        let ls1 = t1.add_leaf(5);
        let rs1 = t1.attach_under_new_root(lr1, ls1);
        t1.attach_under_new_root(paq, rs1);

        let mut t2 = TreeStore::new(1);
        let lp2 = t2.add_leaf(2);
        let lq2 = t2.add_leaf(3);
        let lb = t2.add_leaf(1);
        let qb = t2.attach_under_new_root(lq2, lb);
        let pqb = t2.attach_under_new_root(lp2, qb);
        let lr2 = t2.add_leaf(4);
        let ls2 = t2.add_leaf(5);
        let rs2 = t2.attach_under_new_root(lr2, ls2);
        t2.attach_under_new_root(pqb, rs2);

        let idx1 = SplitIndex::build(&t1);
        let idx2 = SplitIndex::build(&t2);
        let ca = mask(1, &[0]); // {a}, T1-only
        let cb = mask(1, &[1]); // {b}, T2-only
        assert!(!is_compatible(&t1, &idx1, &t2, &idx2, &ca, &cb).unwrap());
    }
}
