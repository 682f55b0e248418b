//! Reading and writing the trees and distance matrix this crate operates on.
//!
//! Newick parsing is delegated to `phylotree`, same as the teacher crate,
//! but only at this boundary: once a file is parsed, its structure is
//! copied into a `TreeStore` and `phylotree`'s own tree type is dropped.
//! Internal structural edits (rerooting, grafting, polytomy resolution)
//! never touch a `phylotree::tree::Tree` — see `crate::tree_store` for why.
//!
//! Output is serialized by a small hand-rolled Newick writer rather than
//! routing back through `phylotree`, since the output tree never existed
//! as a `phylotree::tree::Tree` to begin with.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use phylotree::tree::Tree as PhyloTree;

use crate::distances::{self, DistanceMatrix};
use crate::error::CoreError;
use crate::taxon::TaxonTable;
use crate::tree_store::{NodeId, TreeStore};

/// Parses a Newick file into a `phylotree::tree::Tree`. Kept separate from
/// `load_constraint_tree` so callers can intern every leaf name across both
/// constraint trees before fixing the bitmask width (`TaxonTable::words`).
pub fn read_newick<P: AsRef<Path>>(path: P) -> Result<PhyloTree, CoreError> {
    let content = fs::read_to_string(path.as_ref())?;
    PhyloTree::from_newick(content.trim())
        .map_err(|e| CoreError::ParseError(format!("{}: {e}", path.as_ref().display())))
}

/// Interns every leaf name of `tree` into `taxa`, without yet fixing a
/// bitmask width.
pub fn intern_leaf_names(tree: &PhyloTree, taxa: &mut TaxonTable) -> Result<(), CoreError> {
    for leaf_id in tree.get_leaves() {
        let node = tree
            .get(&leaf_id)
            .map_err(|e| CoreError::ParseError(e.to_string()))?;
        let name = node
            .name
            .clone()
            .ok_or_else(|| CoreError::ParseError("leaf with no taxon name".into()))?;
        taxa.intern(&name);
    }
    Ok(())
}

/// Copies `tree`'s structure into a fresh `TreeStore`, assuming every leaf
/// name was already interned into `taxa` (via `intern_leaf_names`).
pub fn build_tree_store(tree: &PhyloTree, taxa: &TaxonTable, words: usize) -> Result<TreeStore, CoreError> {
    let root_id = tree.get_root().map_err(|e| CoreError::ParseError(e.to_string()))?;
    let mut out = TreeStore::new(words);
    let mut mapped: HashMap<usize, NodeId> = HashMap::new();

    // Post-order over the phylotree node ids, built via an explicit stack
    // so arbitrarily deep input trees can't blow the call stack.
    let mut order = Vec::new();
    let mut stack = vec![(root_id, false)];
    while let Some((id, expanded)) = stack.pop() {
        if expanded {
            order.push(id);
            continue;
        }
        let node = tree.get(&id).map_err(|e| CoreError::ParseError(e.to_string()))?;
        stack.push((id, true));
        for &c in &node.children {
            stack.push((c, false));
        }
    }

    for id in order {
        let node = tree.get(&id).map_err(|e| CoreError::ParseError(e.to_string()))?;
        let new_id = if node.children.is_empty() {
            let name = node
                .name
                .as_ref()
                .ok_or_else(|| CoreError::ParseError("leaf with no taxon name".into()))?;
            let taxon = taxa
                .get(name)
                .ok_or_else(|| CoreError::Internal(format!("leaf '{name}' was never interned")))?;
            out.add_leaf(taxon)
        } else {
            let internal = out.add_internal();
            for &c in &node.children {
                let child_id = mapped[&c];
                out.link_child(internal, child_id);
            }
            internal
        };
        mapped.insert(id, new_id);
    }

    out.set_root(mapped[&root_id]);
    Ok(out)
}

/// Serializes a `TreeStore` to a Newick string, using `taxa` for leaf
/// labels. Internal nodes are unlabeled.
pub fn tree_store_to_newick(tree: &TreeStore, taxa: &TaxonTable) -> String {
    let order = tree.postorder(tree.root());
    let mut rendered: HashMap<NodeId, String> = HashMap::with_capacity(order.len());
    for id in order {
        let node = tree.node(id);
        let s = if let Some(t) = node.taxon {
            taxa.name(t).to_string()
        } else {
            let parts: Vec<&str> = node.children.iter().map(|c| rendered[c].as_str()).collect();
            format!("({})", parts.join(","))
        };
        rendered.insert(id, s);
    }
    format!("{};", rendered[&tree.root()])
}

/// Reads a PHYLIP-style distance matrix, interning any taxa not already
/// known to `taxa`.
pub fn read_distance_matrix<P: AsRef<Path>>(path: P, taxa: &mut TaxonTable) -> Result<DistanceMatrix, CoreError> {
    let content = fs::read_to_string(path.as_ref())?;
    distances::parse_phylip(&content, taxa)
}

/// Writes a Newick string to a file, or to stdout if `path` is `-`.
/// Gzip-compresses the output when `path` ends in `.gz`.
pub fn write_newick<P: AsRef<Path>>(path: P, newick: &str) -> io::Result<()> {
    let p = path.as_ref();
    if p.as_os_str() == "-" {
        let stdout = io::stdout();
        let mut lock = stdout.lock();
        return writeln!(lock, "{newick}");
    }

    let is_gz = p.to_string_lossy().ends_with(".gz");
    let mut out: Box<dyn Write> = if is_gz {
        let f = fs::File::create(p)?;
        Box::new(GzEncoder::new(f, Compression::default()))
    } else {
        Box::new(fs::File::create(p)?)
    };
    writeln!(out, "{newick}")?;
    out.flush()
}

/// Writes a labeled square matrix as TSV to a file. Gzip-compresses when
/// `path` ends in `.gz`. Used by the CLI's optional `--dump-distances`
/// diagnostic, not by the merge itself.
pub fn write_matrix_tsv<P: AsRef<Path>, T: std::fmt::Display>(
    path: P,
    names: &[String],
    mat: &[Vec<T>],
) -> io::Result<()> {
    use std::fs::File;
    use std::io::BufWriter;

    let p = path.as_ref();
    if p.as_os_str() == "-" {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "writing to stdout is not supported by write_matrix_tsv",
        ));
    }

    let is_gz = p.to_string_lossy().ends_with(".gz");
    let mut out: Box<dyn Write> = if is_gz {
        let f = File::create(p)?;
        let enc = GzEncoder::new(f, Compression::default());
        Box::new(BufWriter::new(enc))
    } else {
        Box::new(BufWriter::new(File::create(p)?))
    };

    write!(&mut out, "\t")?;
    for (k, name) in names.iter().enumerate() {
        if k > 0 {
            write!(&mut out, "\t")?;
        }
        write!(&mut out, "{name}")?;
    }
    writeln!(&mut out)?;

    for (i, row) in mat.iter().enumerate() {
        write!(&mut out, "{}", names[i])?;
        for val in row {
            write!(&mut out, "\t{val}")?;
        }
        writeln!(&mut out)?;
    }

    out.flush()
}
