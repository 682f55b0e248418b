use clap::Parser;
use nj_tree_merge::io::{
    build_tree_store, intern_leaf_names, read_distance_matrix, read_newick, tree_store_to_newick,
    write_matrix_tsv, write_newick,
};
use nj_tree_merge::taxon::TaxonTable;
use std::path::PathBuf;
use std::time::Instant;

/// Merge two unrooted constraint trees over disjoint leaf sets into one
/// unrooted binary tree, via constrained neighbor-joining driven by a
/// labeled distance matrix.
#[derive(Parser, Debug)]
#[command(name = "tree-merge", version, about = "Constrained neighbor-joining tree merger")]
struct Args {
    /// Path to the first constraint tree (Newick)
    #[arg(long = "tree1")]
    tree1: PathBuf,

    /// Path to the second constraint tree (Newick)
    #[arg(long = "tree2")]
    tree2: PathBuf,

    /// Path to the PHYLIP-style distance matrix over the union of both
    /// trees' leaves
    #[arg(short = 'm', long = "matrix")]
    matrix: PathBuf,

    /// Output path for the merged Newick tree
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Optional diagnostic dump of the input distance matrix, in the taxon
    /// order the merge ultimately used
    #[arg(long = "dump-distances")]
    dump_distances: Option<PathBuf>,

    /// Quiet mode: suppresses progress messages on stdout
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

fn main() {
    let args = Args::parse();

    let t0 = Instant::now();
    let pt1 = match read_newick(&args.tree1) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to read {:?}: {e}", args.tree1);
            std::process::exit(2);
        }
    };
    let pt2 = match read_newick(&args.tree2) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Failed to read {:?}: {e}", args.tree2);
            std::process::exit(2);
        }
    };
    let read_s = t0.elapsed().as_secs_f64();
    log_if(!args.quiet, format!("Reading constraint trees {read_s:.3}s"));

    let mut taxa = TaxonTable::new();
    if let Err(e) = intern_leaf_names(&pt1, &mut taxa) {
        eprintln!("Failed to read {:?}: {e}", args.tree1);
        std::process::exit(2);
    }
    if let Err(e) = intern_leaf_names(&pt2, &mut taxa) {
        eprintln!("Failed to read {:?}: {e}", args.tree2);
        std::process::exit(2);
    }

    let t1 = Instant::now();
    let matrix = match read_distance_matrix(&args.matrix, &mut taxa) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Failed to read {:?}: {e}", args.matrix);
            std::process::exit(2);
        }
    };
    let matrix_s = t1.elapsed().as_secs_f64();
    log_if(!args.quiet, format!("Reading distance matrix {matrix_s:.3}s"));
    log_if(!args.quiet, format!("Read {} taxa total", taxa.len()));

    if let Some(dump_path) = &args.dump_distances {
        use rayon::prelude::*;
        let names: Vec<String> = matrix.taxa_in_order().iter().map(|&t| taxa.name(t).to_string()).collect();
        // Independent rows, built in parallel the way the teacher's api.rs
        // computes independent pairwise distances.
        let mat: Vec<Vec<f64>> = matrix
            .taxa_in_order()
            .par_iter()
            .map(|&a| matrix.taxa_in_order().iter().map(|&b| matrix.get(a, b)).collect())
            .collect();
        if let Err(e) = write_matrix_tsv(dump_path, &names, &mat) {
            eprintln!("Failed to write {:?}: {e}", dump_path);
            std::process::exit(4);
        }
    }

    let words = taxa.words();
    let t2 = Instant::now();
    let store1 = match build_tree_store(&pt1, &taxa, words) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to build {:?}: {e}", args.tree1);
            std::process::exit(2);
        }
    };
    let store2 = match build_tree_store(&pt2, &taxa, words) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to build {:?}: {e}", args.tree2);
            std::process::exit(2);
        }
    };
    let build_s = t2.elapsed().as_secs_f64();
    log_if(!args.quiet, format!("Building arena trees {build_s:.3}s"));

    let t3 = Instant::now();
    let merged = match nj_tree_merge::merge(store1, store2, &matrix) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Merge failed: {e}");
            let code = match e {
                nj_tree_merge::CoreError::DisjointnessViolated => 5,
                nj_tree_merge::CoreError::LeafSetMismatch => 6,
                nj_tree_merge::CoreError::ConstraintInfeasible => 7,
                nj_tree_merge::CoreError::BadDistance { .. } => 8,
                _ => 3,
            };
            std::process::exit(code);
        }
    };
    let merge_s = t3.elapsed().as_secs_f64();
    log_if(!args.quiet, format!("Constrained neighbor-joining {merge_s:.3}s"));

    let t4 = Instant::now();
    let newick = tree_store_to_newick(&merged, &taxa);
    if let Err(e) = write_newick(&args.output, &newick) {
        eprintln!("Failed to write {:?}: {e}", args.output);
        std::process::exit(4);
    }
    let write_s = t4.elapsed().as_secs_f64();
    log_write_done(!args.quiet, &args.output, write_s);
}

fn log_if(show: bool, msg: String) {
    if show {
        println!("{}", msg);
    }
}

fn log_write_done(show: bool, output: &PathBuf, secs: f64) {
    if !show {
        return;
    }
    let is_stdout = output.as_os_str() == "-";
    if is_stdout {
        println!("Writing to stdout {secs:.3}s");
    } else {
        println!("Writing to output {secs:.3}s");
    }
}
