//! Taxon interning: maps taxon labels to dense, zero-based integer ids.
//!
//! Every clade bitmask and distance-matrix lookup in this crate is keyed by
//! `TaxonId`, never by label, so the core algorithm never allocates or
//! compares strings. A single `TaxonTable` is shared by both constraint
//! trees, the distance matrix, and the output tree for one merge run.

use std::collections::HashMap;

/// Dense, zero-based identifier for a taxon. Also the bit position used in
/// `crate::bitset::Bitset` clade masks.
pub type TaxonId = usize;

/// Interns taxon labels into `TaxonId`s and back.
#[derive(Debug, Default, Clone)]
pub struct TaxonTable {
    names: Vec<String>,
    index: HashMap<String, TaxonId>,
}

impl TaxonTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `name`, assigning a new one if it hasn't been seen.
    pub fn intern(&mut self, name: &str) -> TaxonId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        id
    }

    /// Returns the id already assigned to `name`, without interning it.
    pub fn get(&self, name: &str) -> Option<TaxonId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: TaxonId) -> &str {
        &self.names[id]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of u64 words a `Bitset` needs to cover every interned taxon.
    pub fn words(&self) -> usize {
        self.len().div_ceil(64).max(1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TaxonId, &str)> {
        self.names.iter().enumerate().map(|(id, n)| (id, n.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable_and_reuses_ids() {
        let mut t = TaxonTable::new();
        let a = t.intern("alpha");
        let b = t.intern("beta");
        let a_again = t.intern("alpha");
        assert_eq!(a, a_again);
        assert_ne!(a, b);
        assert_eq!(t.name(a), "alpha");
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn words_rounds_up_to_64_bit_boundaries() {
        let mut t = TaxonTable::new();
        for i in 0..65 {
            t.intern(&format!("t{i}"));
        }
        assert_eq!(t.words(), 2);
    }

    #[test]
    fn get_does_not_intern() {
        let mut t = TaxonTable::new();
        t.intern("alpha");
        assert_eq!(t.get("beta"), None);
        assert_eq!(t.len(), 1);
    }
}
