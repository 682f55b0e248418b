//! Constrained neighbor-joining: merges two constraint trees over disjoint
//! taxon sets into one binary tree, using a distance matrix to pick join
//! order and the compatibility oracle to keep every join consistent with
//! both input trees.
//!
//! Follows `merge_two_trees_via_nj` in `njmergepair.py`: binarize both
//! constraint trees, seed one NJ pool entry per taxon, then repeatedly pick
//! the lowest-Q pair whose join the oracle accepts, edit the constraint
//! trees to record it, and fold the pair into a new pool entry. The loop
//! also grows a third, independent tree — the actual output — one join at
//! a time, since the constraint trees only need to encode enough structure
//! to keep testing *future* joins; they are bookkeeping, not the answer.

use std::collections::HashMap;

use itertools::Itertools;

use crate::compat;
use crate::constraint_editor::{self, EditOutcome};
use crate::distances::DistanceMatrix;
use crate::error::CoreError;
use crate::split_index::SplitIndex;
use crate::taxon::TaxonId;
use crate::tree_store::{CladeBitmask, NodeId, TreeStore};

struct PoolEntry {
    leaves: CladeBitmask,
    /// Node in the output tree representing this cluster so far.
    output_node: NodeId,
}

/// Merges `t1` and `t2` under `matrix`, returning the single resulting
/// unrooted binary tree.
///
/// # Errors
/// - `DisjointnessViolated` if the two trees share a leaf.
/// - `LeafSetMismatch` if their combined leaves don't match `matrix`.
/// - `ConstraintInfeasible` if some step has no join compatible with both
///   constraint trees.
pub fn merge(mut t1: TreeStore, mut t2: TreeStore, matrix: &DistanceMatrix) -> Result<TreeStore, CoreError> {
    let leaves1 = t1.leaves(t1.root());
    let leaves2 = t2.leaves(t2.root());
    if leaves1.intersects(&leaves2) {
        return Err(CoreError::DisjointnessViolated);
    }

    let union = leaves1.union(&leaves2);
    let matrix_taxa = matrix.taxon_set();
    let union_taxa: std::collections::HashSet<TaxonId> = union.iter_ones().collect();
    if union_taxa != matrix_taxa {
        return Err(CoreError::LeafSetMismatch);
    }

    t1.resolve_polytomies();
    t2.resolve_polytomies();

    let mut idx1 = SplitIndex::build(&t1);
    let mut idx2 = SplitIndex::build(&t2);

    let words = t1.words();
    let total_n = matrix.taxa_in_order().len();

    let mut output = TreeStore::new(words);
    let mut pool: Vec<PoolEntry> = Vec::with_capacity(total_n);
    for &taxon in matrix.taxa_in_order() {
        let mut mask = CladeBitmask::zeros(words);
        mask.set(taxon);
        let out_node = output.add_leaf(taxon);
        pool.push(PoolEntry { leaves: mask, output_node: out_node });
    }

    let n0 = pool.len();
    let mut dist = vec![vec![0.0; n0]; n0];
    let mut xsub = vec![0.0; n0];
    let taxa_order = matrix.taxa_in_order();
    for i in 0..n0 {
        for j in 0..n0 {
            if i == j {
                continue;
            }
            let d = matrix.get(taxa_order[i], taxa_order[j]);
            dist[i][j] = d;
            xsub[i] += d;
        }
    }

    loop {
        if pool.len() == 1 {
            let last = &pool[0];
            output.set_root(last.output_node);
            output.unroot();
            return Ok(output);
        }

        let n = pool.len();
        let mut candidates: Vec<(f64, usize, usize)> = (0..n)
            .tuple_combinations()
            .map(|(i, j)| {
                let q = (n as f64 - 2.0) * dist[i][j] - xsub[i] - xsub[j];
                (q, i, j)
            })
            .collect();
        // Ties broken lexicographically by pool index so the result is
        // deterministic regardless of any hash-based iteration elsewhere.
        candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap().then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let mut accepted = None;
        for &(_, i, j) in &candidates {
            if compat::is_compatible(&t1, &idx1, &t2, &idx2, &pool[i].leaves, &pool[j].leaves)? {
                accepted = Some((i, j));
                break;
            }
        }
        let (i, j) = accepted.ok_or(CoreError::ConstraintInfeasible)?;

        let outcome = constraint_editor::apply(&t1, &idx1, &t2, &idx2, &pool[i].leaves, &pool[j].leaves)?;
        match outcome {
            EditOutcome::NoChange => {}
            EditOutcome::Replaced1(nt1) => {
                t1 = nt1;
                idx1 = SplitIndex::build(&t1);
            }
            EditOutcome::Replaced2(nt2) => {
                t2 = nt2;
                idx2 = SplitIndex::build(&t2);
            }
            EditOutcome::ReplacedBoth(nt1, nt2) => {
                t1 = nt1;
                t2 = nt2;
                idx1 = SplitIndex::build(&t1);
                idx2 = SplitIndex::build(&t2);
            }
        }

        if t1.leaves(t1.root()).count_ones() == total_n {
            t1.unroot();
            return Ok(t1);
        }
        if t2.leaves(t2.root()).count_ones() == total_n {
            t2.unroot();
            return Ok(t2);
        }

        let new_leaves = pool[i].leaves.union(&pool[j].leaves);
        let new_output_node = output.attach_under_new_root(pool[i].output_node, pool[j].output_node);
        let new_entry = PoolEntry { leaves: new_leaves, output_node: new_output_node };

        commit_join(&mut pool, &mut dist, &mut xsub, i, j, new_entry);
    }
}

/// Removes pool entries `i` and `j`, appends `new_entry`, and recomputes
/// the reduced distance/row-sum tables, per the standard NJ update rule:
/// `d(w,x) = (d(u,x) + d(v,x) - d(u,v)) / 2`.
fn commit_join(
    pool: &mut Vec<PoolEntry>,
    dist: &mut Vec<Vec<f64>>,
    xsub: &mut Vec<f64>,
    i: usize,
    j: usize,
    new_entry: PoolEntry,
) {
    let n = pool.len();
    let remaining: Vec<usize> = (0..n).filter(|&k| k != i && k != j).collect();
    let d_ij = dist[i][j];

    let mut new_row = Vec::with_capacity(remaining.len());
    for &k in &remaining {
        new_row.push(0.5 * (dist[i][k] + dist[j][k] - d_ij));
    }

    let mut new_pool = Vec::with_capacity(remaining.len() + 1);
    let mut new_xsub = Vec::with_capacity(remaining.len() + 1);
    let old_pool = std::mem::take(pool);
    let mut old_pool: HashMap<usize, PoolEntry> = old_pool.into_iter().enumerate().collect();
    for (pos, &k) in remaining.iter().enumerate() {
        let entry = old_pool.remove(&k).unwrap();
        let adjust = xsub[k] + new_row[pos] - dist[i][k] - dist[j][k];
        new_pool.push(entry);
        new_xsub.push(adjust);
    }
    let w_xsub: f64 = new_row.iter().sum();
    new_pool.push(new_entry);
    new_xsub.push(w_xsub);

    let m = remaining.len();
    let mut new_dist = vec![vec![0.0; m + 1]; m + 1];
    for a in 0..m {
        for b in 0..m {
            new_dist[a][b] = dist[remaining[a]][remaining[b]];
        }
    }
    for a in 0..m {
        new_dist[a][m] = new_row[a];
        new_dist[m][a] = new_row[a];
    }

    *pool = new_pool;
    *dist = new_dist;
    *xsub = new_xsub;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxon::TaxonTable;

    fn leaf_tree(words: usize, taxa: &[TaxonId]) -> TreeStore {
        let mut t = TreeStore::new(words);
        let ids: Vec<NodeId> = taxa.iter().map(|&x| t.add_leaf(x)).collect();
        let mut cur = ids[0];
        for &l in &ids[1..] {
            cur = t.attach_under_new_root(cur, l);
        }
        t
    }

    fn full_matrix(taxa: &mut TaxonTable, labels: &[&str], d: impl Fn(usize, usize) -> f64) -> DistanceMatrix {
        let ids: Vec<TaxonId> = labels.iter().map(|l| taxa.intern(l)).collect();
        let n = ids.len();
        let values = (0..n).map(|i| (0..n).map(|j| if i == j { 0.0 } else { d(i, j) }).collect()).collect();
        DistanceMatrix::new(ids, values).unwrap()
    }

    #[test]
    fn merges_two_disjoint_trees_into_one_binary_tree() {
        let mut taxa = TaxonTable::new();
        let labels = ["a", "b", "c", "d", "e", "f"];
        for l in labels {
            taxa.intern(l);
        }
        let words = taxa.words();

        let a = taxa.get("a").unwrap();
        let b = taxa.get("b").unwrap();
        let c = taxa.get("c").unwrap();
        let d = taxa.get("d").unwrap();
        let e = taxa.get("e").unwrap();
        let f = taxa.get("f").unwrap();

        let t1 = leaf_tree(words, &[a, b, c]);
        let t2 = leaf_tree(words, &[d, e, f]);

        let matrix = full_matrix(&mut taxa, &labels, |i, j| ((i as f64 - j as f64).abs() + 1.0) * 2.0);

        let merged = merge(t1, t2, &matrix).expect("merge should succeed");
        assert_eq!(merged.leaves(merged.root()).count_ones(), 6);
        // An unrooted binary tree on 6 leaves has 4 internal nodes.
        let internal_count = (0..merged.len()).filter(|&id| !merged.node(id).is_leaf()).count();
        assert_eq!(internal_count, 4);
    }

    #[test]
    fn rejects_overlapping_leaf_sets() {
        let mut taxa = TaxonTable::new();
        let a = taxa.intern("a");
        let b = taxa.intern("b");
        let words = taxa.words();
        let t1 = leaf_tree(words, &[a, b]);
        let t2 = leaf_tree(words, &[a, b]);
        let matrix = full_matrix(&mut taxa, &["a", "b"], |_, _| 1.0);
        assert!(matches!(merge(t1, t2, &matrix), Err(CoreError::DisjointnessViolated)));
    }

    #[test]
    fn rejects_leaf_set_not_matching_matrix() {
        let mut taxa = TaxonTable::new();
        let a = taxa.intern("a");
        let b = taxa.intern("b");
        let c = taxa.intern("c");
        let words = taxa.words();
        let t1 = leaf_tree(words, &[a]);
        let t2 = leaf_tree(words, &[b]);
        // matrix only covers a, b, not c
        let matrix = full_matrix(&mut taxa, &["a", "b", "c"], |_, _| 1.0);
        let _ = c;
        assert!(matches!(merge(t1, t2, &matrix), Err(CoreError::LeafSetMismatch)));
    }

    #[test]
    fn joins_singleton_to_its_closest_leaf_first() {
        let mut taxa = TaxonTable::new();
        let a = taxa.intern("a");
        let b = taxa.intern("b");
        let c = taxa.intern("c");
        let d = taxa.intern("d");
        let words = taxa.words();

        let t1 = leaf_tree(words, &[a, b, c]);

        // T2 is a true singleton: one leaf, no internal structure at all.
        let mut t2 = TreeStore::new(words);
        let d_node = t2.add_leaf(d);
        t2.set_root(d_node);

        // a and d are far closer to each other than any other pair, so the
        // very first accepted join should be (a, d).
        let matrix = full_matrix(&mut taxa, &["a", "b", "c", "d"], |i, j| {
            if (i == 0 && j == 3) || (i == 3 && j == 0) {
                0.1
            } else {
                1.0
            }
        });

        let merged = merge(t1, t2, &matrix).expect("merge should succeed");
        assert_eq!(merged.leaves(merged.root()).count_ones(), 4);

        let idx = SplitIndex::build(&merged);
        let mut ad = CladeBitmask::zeros(words);
        ad.set(a);
        ad.set(d);
        assert!(idx.lookup(&ad).is_some(), "a and d should end up as sister leaves");
    }

    #[test]
    fn resolves_polytomy_before_merging() {
        let mut taxa = TaxonTable::new();
        let a = taxa.intern("a");
        let b = taxa.intern("b");
        let c = taxa.intern("c");
        let d = taxa.intern("d");
        let e = taxa.intern("e");
        let words = taxa.words();

        // T1 is a literal star: one internal node with three leaf children.
        let mut t1 = TreeStore::new(words);
        let root1 = t1.add_internal();
        let la = t1.add_leaf(a);
        let lb = t1.add_leaf(b);
        let lc = t1.add_leaf(c);
        t1.link_child(root1, la);
        t1.link_child(root1, lb);
        t1.link_child(root1, lc);
        t1.set_root(root1);

        let t2 = leaf_tree(words, &[d, e]);

        let matrix = full_matrix(&mut taxa, &["a", "b", "c", "d", "e"], |_, _| 1.0);

        let merged = merge(t1, t2, &matrix).expect("merge should succeed");
        assert_eq!(merged.leaves(merged.root()).count_ones(), 5);
        // An unrooted binary tree on 5 leaves has 3 internal nodes.
        let internal_count = (0..merged.len()).filter(|&id| !merged.node(id).is_leaf()).count();
        assert_eq!(internal_count, 3);
    }
}
