//! Validate an edge table and a node table and print the report.
//! Run with: cargo run --example validate_tables [edges.json] [nodes.json]

use neurograph::prelude::*;
use neurograph::ResolutionPolicy;
use std::path::Path;

fn main() -> Result<(), NeurographError> {
    let mut args = std::env::args().skip(1);
    let edges = args
        .next()
        .unwrap_or_else(|| "tests/fixtures/edges.json".to_string());
    let nodes = args
        .next()
        .unwrap_or_else(|| "tests/fixtures/nodes_incomplete.json".to_string());

    for path in [&edges, &nodes] {
        if !Path::new(path).exists() {
            eprintln!("File not found: {}", path);
            eprintln!("Usage: cargo run --example validate_tables [edges.json] [nodes.json]");
            std::process::exit(1);
        }
    }

    let options = ValidationOptions {
        policy: ResolutionPolicy::auto(),
        ..ValidationOptions::default()
    };
    let result = NeurographCore::validate_files(Path::new(&edges), Path::new(&nodes), &options)?;

    println!("Validation results for: {} + {}", edges, nodes);
    println!("Total issues: {}", result.total_issues());
    println!();

    for issue in result.report.issues() {
        println!("  [{}] {}", issue.severity, issue.message);
        if let Some(ref suggestion) = issue.suggestion {
            println!("    Suggestion: {}", suggestion);
        }
    }

    for fix in result.resolution.applied() {
        println!("  fixed {} -> {} ({:?})", fix.node, fix.cell_type, fix.source);
    }

    if !result.is_complete() {
        println!("\nValidation failed (unresolved neurons).");
        std::process::exit(1);
    }

    println!(
        "\nValidation passed: {} neurons, {} synapses.",
        result.graph().node_count(),
        result.graph().synapse_count()
    );
    Ok(())
}
