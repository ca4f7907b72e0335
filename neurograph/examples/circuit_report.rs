//! Print the disinhibition circuit of every configured Purkinje cell.
//! Run with: cargo run --example circuit_report [graph.json] [config.json]

use neurograph::prelude::*;
use std::path::Path;

fn main() -> Result<(), NeurographError> {
    let mut args = std::env::args().skip(1);
    let graph = match args.next() {
        Some(path) => neurograph::load_graph(Path::new(&path))?,
        None => {
            let result = NeurographCore::validate_files(
                Path::new("tests/fixtures/edges.json"),
                Path::new("tests/fixtures/nodes.json"),
                &ValidationOptions::default(),
            )?;
            result.resolution.into_graph()?
        }
    };
    let config = match args.next() {
        Some(path) => AnalysisConfig::load(Path::new(&path))?,
        None => AnalysisConfig::load(Path::new("tests/fixtures/config.json"))?,
    };

    let assoc = config.fiber_association()?;
    let query = CircuitQuery::new(&graph, &assoc);

    for pc in &config.pcs {
        let circuit = match query.disinhibition_circuit(pc, &CircuitOptions::default()) {
            Ok(circuit) => circuit,
            Err(e) => {
                eprintln!("{}: {}", pc, e);
                continue;
            }
        };
        println!("{} (fiber {})", pc, circuit.fiber);
        println!("  MLI2s: {}", circuit.mli2s.join(", "));
        println!("  direct MLI1s: {}", circuit.direct_mli1s.join(", "));
        println!("  indirect MLI1s: {}", circuit.indirect_mli1s.join(", "));
        for path in &circuit.paths {
            println!("  {}", path);
        }
    }
    Ok(())
}
