//! Crate root: lightweight module orchestration and public re-exports.
//!
//! Modules:
//! - `taxon`: interns taxon labels into dense `TaxonId`s shared by both
//!   constraint trees and the distance matrix.
//! - `bitset`: compact bitset representation for clades/splits.
//! - `tree_store`: arena-backed tree representation and structural edits.
//! - `split_index`: canonical clade → node lookup for one `TreeStore`.
//! - `constraint_editor`: keeps constraint trees consistent with accepted joins.
//! - `compat`: the compatibility oracle gating each candidate join.
//! - `distances`: the input pairwise distance matrix NJ agglomerates over.
//! - `nj`: the constrained neighbor-joining agglomeration loop.
//! - `io`: reading Newick trees and PHYLIP distance matrices, writing results.
//! - `error`: the public error enum returned by the merge core.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).
//!
//! Public API kept stable by re-exporting key items from each module.

pub mod bitset;
pub mod compat;
pub mod constraint_editor;
pub mod distances;
pub mod error;
pub mod io;
pub mod nj;
pub mod split_index;
pub mod taxon;
pub mod tree_store;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use bitset::Bitset;
pub use distances::DistanceMatrix;
pub use error::CoreError;
pub use nj::merge;
pub use taxon::{TaxonId, TaxonTable};
pub use tree_store::TreeStore;

