//! Python binding layer for the constrained neighbor-joining merger.
//!
//! Provides a single Python function wrapping `crate::nj::merge`, reading
//! the same Newick/PHYLIP inputs as the CLI.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::io::{build_tree_store, intern_leaf_names, read_distance_matrix, read_newick, tree_store_to_newick};
use crate::taxon::TaxonTable;

/// Merges two Newick constraint trees over disjoint leaf sets into one
/// Newick string, via constrained neighbor-joining driven by a PHYLIP-style
/// distance matrix.
///
/// Args:
///     tree1_path: Path to the first constraint tree (Newick)
///     tree2_path: Path to the second constraint tree (Newick)
///     matrix_path: Path to the PHYLIP-style distance matrix over the union
///         of both trees' leaves
///
/// Returns:
///     The merged unrooted binary tree, as a Newick string.
///
/// Raises:
///     ValueError: If the inputs cannot be parsed, the constraint trees do
///         not have disjoint leaf sets, their union does not match the
///         distance matrix's taxa, or no join order compatible with both
///         constraint trees exists.
#[pyfunction]
fn merge_constraint_trees(tree1_path: String, tree2_path: String, matrix_path: String) -> PyResult<String> {
    let pt1 = read_newick(&tree1_path).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let pt2 = read_newick(&tree2_path).map_err(|e| PyValueError::new_err(e.to_string()))?;

    let mut taxa = TaxonTable::new();
    intern_leaf_names(&pt1, &mut taxa).map_err(|e| PyValueError::new_err(e.to_string()))?;
    intern_leaf_names(&pt2, &mut taxa).map_err(|e| PyValueError::new_err(e.to_string()))?;

    let matrix = read_distance_matrix(&matrix_path, &mut taxa).map_err(|e| PyValueError::new_err(e.to_string()))?;

    let words = taxa.words();
    let store1 = build_tree_store(&pt1, &taxa, words).map_err(|e| PyValueError::new_err(e.to_string()))?;
    let store2 = build_tree_store(&pt2, &taxa, words).map_err(|e| PyValueError::new_err(e.to_string()))?;

    let merged = crate::nj::merge(store1, store2, &matrix).map_err(|e| PyValueError::new_err(e.to_string()))?;

    Ok(tree_store_to_newick(&merged, &taxa))
}

/// Python module definition
#[pymodule]
fn nj_tree_merge(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(merge_constraint_trees, m)?)?;
    Ok(())
}
