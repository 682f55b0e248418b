//! The pairwise distance matrix that drives neighbor-joining.
//!
//! Distinct from the teacher crate's `distances.rs`, which computed
//! Robinson-Foulds-family distances *between trees*. Here a `DistanceMatrix`
//! is an *input* to the merge: one row/column per taxon in the union of the
//! two constraint trees' leaf sets, giving the pairwise distance NJ
//! agglomerates over.

use std::collections::{HashMap, HashSet};

use crate::error::CoreError;
use crate::taxon::{TaxonId, TaxonTable};

/// A dense, symmetric pairwise distance matrix over a fixed taxon set.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    taxa: Vec<TaxonId>,
    position: HashMap<TaxonId, usize>,
    // Dense because NJ visits every pair every iteration regardless; a
    // sparse representation would not save real work here.
    values: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    /// Builds a matrix from a taxon order and a dense, symmetric table of
    /// values in that same order. `values[i][j]` is the distance between
    /// `taxa[i]` and `taxa[j]`.
    pub fn new(taxa: Vec<TaxonId>, values: Vec<Vec<f64>>) -> Result<Self, CoreError> {
        let n = taxa.len();
        if values.len() != n || values.iter().any(|row| row.len() != n) {
            return Err(CoreError::Internal("distance matrix is not square".into()));
        }
        for (i, row) in values.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                if !v.is_finite() || v < 0.0 {
                    return Err(CoreError::BadDistance {
                        a: taxa[i].to_string(),
                        b: taxa[j].to_string(),
                    });
                }
            }
        }
        let position = taxa.iter().enumerate().map(|(i, &t)| (t, i)).collect();
        Ok(DistanceMatrix { taxa, position, values })
    }

    /// Returns the distance between two taxa. Panics if either id was not
    /// part of this matrix; callers are expected to have already validated
    /// leaf-set agreement via `taxon_set`/`LeafSetMismatch`.
    pub fn get(&self, a: TaxonId, b: TaxonId) -> f64 {
        let i = self.position[&a];
        let j = self.position[&b];
        self.values[i][j]
    }

    /// Taxa covered by this matrix, in row order.
    pub fn taxa_in_order(&self) -> &[TaxonId] {
        &self.taxa
    }

    pub fn taxon_set(&self) -> HashSet<TaxonId> {
        self.taxa.iter().copied().collect()
    }
}

/// Parses a PHYLIP-style lower/full distance matrix: a first line giving
/// the taxon count, then one row per taxon of `label d1 d2 d3 ...`.
pub fn parse_phylip(text: &str, taxa_table: &mut TaxonTable) -> Result<DistanceMatrix, CoreError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let n: usize = lines
        .next()
        .ok_or_else(|| CoreError::ParseError("empty distance matrix".into()))?
        .trim()
        .parse()
        .map_err(|_| CoreError::ParseError("first line must be the taxon count".into()))?;

    let mut taxa = Vec::with_capacity(n);
    let mut rows = Vec::with_capacity(n);
    for line in lines.by_ref().take(n) {
        let mut fields = line.split_whitespace();
        let label = fields
            .next()
            .ok_or_else(|| CoreError::ParseError("row missing a taxon label".into()))?;
        let id = taxa_table.intern(label);
        taxa.push(id);
        let row: Result<Vec<f64>, _> = fields.map(|f| f.parse::<f64>()).collect();
        let row = row.map_err(|_| CoreError::ParseError(format!("non-numeric distance in row '{label}'")))?;
        rows.push(row);
    }

    if taxa.len() != n {
        return Err(CoreError::ParseError(format!(
            "expected {n} taxon rows, found {}",
            taxa.len()
        )));
    }

    // Accept either a full n x n matrix or a strict lower triangle.
    let values = if rows.iter().all(|r| r.len() == n) {
        rows
    } else {
        let mut full = vec![vec![0.0; n]; n];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != i {
                return Err(CoreError::ParseError(
                    "distance rows are neither full nor a strict lower triangle".into(),
                ));
            }
            for (j, &d) in row.iter().enumerate() {
                full[i][j] = d;
                full[j][i] = d;
            }
        }
        full
    };

    DistanceMatrix::new(taxa, values)
}
