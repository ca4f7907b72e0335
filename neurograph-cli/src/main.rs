//! neurograph CLI - connectivity table validation and circuit analysis from the command line.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use neurograph::analyzer::{guess_cell_type, CellTypeClassifier};
use neurograph::export::{graph_to_tables, read_table, write_graph, write_table};
use neurograph::geometry::{distance_to_reference_surface, tagged_synapse_distances, DistanceSummary};
use neurograph::graph::{BuildOptions, UnseenNodePolicy};
use neurograph::parser::{apply_soma_table, parse_coord};
use neurograph::{
    AnalysisConfig, CellType, CircuitOptions, CircuitQuery, ConnectomeGraph, NeurographCore,
    ResolutionPolicy, Severity, ValidationOptions, ValidationResult,
};
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "neurograph")]
#[command(about = "Synaptic connectivity graph validation and circuit analysis", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug output to stderr (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an edge table and a node table
    Validate {
        /// Edge table (JSON array of string rows)
        #[arg(long, value_name = "FILE")]
        edges: PathBuf,

        /// Node table (JSON array of string rows)
        #[arg(long, value_name = "FILE")]
        nodes: PathBuf,

        /// Soma table applied after a successful validation
        #[arg(long, value_name = "FILE")]
        somas: Option<PathBuf>,

        /// Fill missing cell types from the id classifier
        #[arg(long)]
        auto: bool,

        /// Set a neuron's cell type, as ID=TYPE
        #[arg(long = "set", value_name = "ID=TYPE", value_parser = parse_override)]
        overrides: Vec<(String, CellType)>,

        /// Leave a neuron unresolved
        #[arg(long, value_name = "ID")]
        skip: Vec<String>,

        /// Ignore node rows for neurons no edge mentions
        #[arg(long)]
        skip_unseen: bool,

        /// Tags that confirm an edge row (default: confirmed, true)
        #[arg(long = "confirm-tag", value_name = "TAG")]
        confirm_tags: Vec<String>,

        /// Write the validated graph document here
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Report the fiber circuit of one or more Purkinje cells
    Circuit {
        /// Graph document written by `validate --output`
        #[arg(long, value_name = "FILE")]
        graph: PathBuf,

        /// Analysis config (associations, neighbours, surface)
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Purkinje cells to analyse (default: the config's list)
        #[arg(long = "pc", value_name = "ID")]
        pcs: Vec<String>,

        /// Use the pc's neighbour as the circuit target
        #[arg(long)]
        neighbor: bool,

        /// Include ephaptic contacts
        #[arg(long)]
        use_ephaptic: bool,

        /// Keep fiber-contacted MLI1s not reached through an MLI2
        #[arg(long)]
        fiber_only: bool,

        /// Drop MLI1s that do not synapse onto the target
        #[arg(long)]
        predecessors_only: bool,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Distances to the reference surface, in microns
    Distance {
        /// Graph document; profiles every synapse carrying the tag
        #[arg(long, value_name = "FILE", required_unless_present = "points")]
        graph: Option<PathBuf>,

        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Edge tag to profile (default: the config's profile tag)
        #[arg(long)]
        tag: Option<String>,

        /// Single points "(x,y,z)" in pixels
        #[arg(long = "point", value_name = "COORD")]
        points: Vec<String>,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Guess cell types from neuron ids
    Classify {
        #[arg(value_name = "ID", required = true)]
        ids: Vec<String>,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Count incoming contacts from a presynaptic cell type
    Contacts {
        #[arg(long, value_name = "FILE")]
        graph: PathBuf,

        /// Presynaptic cell type
        #[arg(long, default_value = "cf")]
        from: CellType,

        /// Neurons to report (default: every MLI1 and MLI2 in the graph)
        #[arg(value_name = "ID")]
        ids: Vec<String>,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Write a graph document back out as edge and node tables
    Export {
        #[arg(long, value_name = "FILE")]
        graph: PathBuf,

        #[arg(long, value_name = "FILE")]
        edges_out: PathBuf,

        #[arg(long, value_name = "FILE")]
        nodes_out: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output for scripts
    Json,
}

fn parse_override(value: &str) -> Result<(String, CellType), String> {
    let (id, label) = value
        .split_once('=')
        .ok_or_else(|| format!("expected ID=TYPE, got '{}'", value))?;
    let cell_type = label.parse::<CellType>().map_err(|e| e.to_string())?;
    Ok((id.trim().to_string(), cell_type))
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    process::exit(exit_code);
}

fn run(command: Commands) -> anyhow::Result<i32> {
    match command {
        Commands::Validate {
            edges,
            nodes,
            somas,
            auto,
            overrides,
            skip,
            skip_unseen,
            confirm_tags,
            output,
            format,
        } => {
            let mut build = BuildOptions::default();
            if !confirm_tags.is_empty() {
                build.confirmation_tags = confirm_tags.iter().map(|t| t.to_lowercase()).collect();
            }
            if skip_unseen {
                build.unseen_nodes = UnseenNodePolicy::Skip;
            }
            let options = ValidationOptions {
                build,
                policy: ResolutionPolicy {
                    auto_classify: auto,
                    overrides: overrides.into_iter().collect(),
                    skip: skip.into_iter().collect(),
                },
            };
            handle_validate(&edges, &nodes, somas.as_deref(), &options, output.as_deref(), format)
        }
        Commands::Circuit {
            graph,
            config,
            pcs,
            neighbor,
            use_ephaptic,
            fiber_only,
            predecessors_only,
            format,
        } => {
            let options = CircuitOptions {
                include_non_predecessor_mli1s: !predecessors_only,
                include_fiber_only_mli1s: fiber_only,
                use_ephaptic,
                target: None,
            };
            handle_circuit(&graph, config.as_deref(), pcs, neighbor, options, format)
        }
        Commands::Distance {
            graph,
            config,
            tag,
            points,
            format,
        } => handle_distance(graph.as_deref(), config.as_deref(), tag, &points, format),
        Commands::Classify { ids, format } => {
            handle_classify(&ids, format)?;
            Ok(0)
        }
        Commands::Contacts {
            graph,
            from,
            ids,
            format,
        } => handle_contacts(&graph, from, ids, format),
        Commands::Export {
            graph,
            edges_out,
            nodes_out,
        } => {
            let graph = load_graph(&graph)?;
            let (edges, nodes) = graph_to_tables(&graph);
            write_table(&edges_out, &edges)
                .with_context(|| format!("writing {}", edges_out.display()))?;
            write_table(&nodes_out, &nodes)
                .with_context(|| format!("writing {}", nodes_out.display()))?;
            println!("Wrote {} edge rows and {} node rows", edges.len(), nodes.len());
            Ok(0)
        }
    }
}

fn load_graph(path: &Path) -> anyhow::Result<ConnectomeGraph> {
    let graph =
        neurograph::load_graph(path).with_context(|| format!("reading graph {}", path.display()))?;
    tracing::debug!(
        "Loaded {} neurons and {} synapses from {}",
        graph.node_count(),
        graph.synapse_count(),
        path.display()
    );
    Ok(graph)
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::load(path)
            .with_context(|| format!("reading config {}", path.display())),
        None => Ok(AnalysisConfig::default()),
    }
}

fn handle_validate(
    edges: &Path,
    nodes: &Path,
    somas: Option<&Path>,
    options: &ValidationOptions,
    output: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    let result = NeurographCore::validate_files(edges, nodes, options)?;

    match format {
        OutputFormat::Human => output_validation_human(&result),
        OutputFormat::Json => output_validation_json(&result)?,
    }

    if !result.is_complete() {
        return Ok(1);
    }

    if let Some(output) = output {
        let mut graph = result.resolution.into_graph()?;
        if let Some(somas) = somas {
            let table = read_table(somas).with_context(|| format!("reading {}", somas.display()))?;
            apply_soma_table(&mut graph, &table)?;
        }
        graph.metadata.source = Some(edges.display().to_string());
        write_graph(output, &graph).with_context(|| format!("writing {}", output.display()))?;
    }
    Ok(0)
}

fn output_validation_human(result: &ValidationResult) {
    let issues = result.report.issues();
    println!("\nTables: {}", result.source.as_ref().map(|p| p.display().to_string()).unwrap_or_default());
    println!("{}", "─".repeat(60));

    for severity in [Severity::Error, Severity::Warning, Severity::Suggestion, Severity::Info] {
        let matching: Vec<_> = issues.iter().filter(|i| i.severity == severity).collect();
        if matching.is_empty() {
            continue;
        }
        println!("\n  {}:", severity.to_string().to_uppercase());
        for issue in matching {
            println!("    - {}", issue.message);
            if let Some(ref suggestion) = issue.suggestion {
                println!("      {}", suggestion);
            }
        }
    }

    let applied = result.resolution.applied();
    if !applied.is_empty() {
        println!("\n  Applied:");
        for fix in applied {
            println!("    - {} = {} ({:?})", fix.node, fix.cell_type, fix.source);
        }
    }

    let graph = result.graph();
    println!("\n  Summary:");
    println!("    Neurons:    {}", graph.node_count());
    println!("    Synapses:   {}", graph.synapse_count());
    println!("    Unresolved: {}", result.resolution.unresolved().len());
    println!("    Complete:   {}", result.is_complete());
}

fn output_validation_json(result: &ValidationResult) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "source": result.source.as_ref().map(|p| p.display().to_string()),
        "complete": result.is_complete(),
        "issues": result.report.issues(),
        "stats": result.stats,
        "build": result.report.build,
        "applied": result.resolution.applied(),
        "unresolved": result.resolution.unresolved(),
        "graph": result.graph().stats(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn handle_circuit(
    graph: &Path,
    config: Option<&Path>,
    pcs: Vec<String>,
    neighbor: bool,
    options: CircuitOptions,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    let graph = load_graph(graph)?;
    let config = load_config(config)?;
    let assoc = config.fiber_association()?;
    let neighbors = config.neighbor_map();
    let query = CircuitQuery::new(&graph, &assoc);

    let pcs = if pcs.is_empty() { config.pcs.clone() } else { pcs };
    let mut reports = Vec::new();
    let mut failed = false;
    for pc in &pcs {
        let mut options = options.clone();
        if neighbor {
            options.target = Some(neighbors.neighbor_of(pc)?.to_string());
        }
        let outcome = query
            .mli1_partition(pc)
            .and_then(|partition| Ok((partition, query.disinhibition_circuit(pc, &options)?)));
        match outcome {
            Ok(report) => reports.push((pc.as_str(), report)),
            Err(e) => {
                eprintln!("{}: {}", pc, e);
                failed = true;
            }
        }
    }

    match format {
        OutputFormat::Human => {
            for (pc, (partition, circuit)) in &reports {
                println!("\n{} (fiber {}, target {})", pc, circuit.fiber, circuit.target);
                println!("{}", "─".repeat(60));
                println!("  Monosynaptic MLI1s: {}", partition.monosynaptic.join(", "));
                println!("  Disynaptic MLI1s:   {}", partition.disynaptic.join(", "));
                println!("  MLI2s:              {}", circuit.mli2s.join(", "));
                for (mli1, count) in &circuit.mli1_target_contacts {
                    println!("  {} -> {}: {} synapses", mli1, circuit.target, count);
                }
                println!("  Paths:");
                for path in &circuit.paths {
                    println!("    {}", path);
                }
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = reports
                .iter()
                .map(|(pc, (partition, circuit))| {
                    serde_json::json!({
                        "pc": pc,
                        "partition": partition,
                        "circuit": circuit,
                        "paths": circuit.paths.iter().map(|p| p.to_string()).collect::<Vec<_>>(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(if failed { 1 } else { 0 })
}

fn handle_distance(
    graph: Option<&Path>,
    config: Option<&Path>,
    tag: Option<String>,
    points: &[String],
    format: OutputFormat,
) -> anyhow::Result<i32> {
    let config = load_config(config)?;
    let surface = config.reference_surface()?;

    let mut point_distances = Vec::new();
    for point in points {
        let coord = parse_coord(point)?;
        point_distances.push((coord, distance_to_reference_surface(coord, &surface)));
    }

    let tag = tag.unwrap_or_else(|| config.profile_tag.clone());
    let profile = match graph {
        Some(path) => tagged_synapse_distances(&load_graph(path)?, &surface, &tag),
        None => Vec::new(),
    };
    let summary = DistanceSummary::from_distances(&profile);

    match format {
        OutputFormat::Human => {
            for (coord, d) in &point_distances {
                println!("{}: {:.3} um", coord, d);
            }
            for d in &profile {
                println!("{} -> {} {}: {:.3} um", d.pre, d.post, d.coord, d.distance);
            }
            if let Some(s) = summary {
                println!(
                    "\n'{}' synapses: {} (min {:.3}, median {:.3}, mean {:.3}, max {:.3} um)",
                    tag, s.count, s.min, s.median, s.mean, s.max
                );
            } else if graph.is_some() {
                println!("No '{}' synapses with coordinates", tag);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "points": point_distances
                    .iter()
                    .map(|(c, d)| serde_json::json!({ "coord": c, "distance": d }))
                    .collect::<Vec<_>>(),
                "tag": tag,
                "synapses": profile,
                "summary": summary,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(0)
}

fn handle_classify(ids: &[String], format: OutputFormat) -> anyhow::Result<()> {
    let classifier = CellTypeClassifier::new();
    match format {
        OutputFormat::Human => {
            for id in ids {
                let marker = classifier
                    .matching_rule(id)
                    .map(|r| r.marker.as_str())
                    .unwrap_or("-");
                println!("{}\t{}\t(rule: {})", id, guess_cell_type(id), marker);
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = ids
                .iter()
                .map(|id| serde_json::json!({ "id": id, "cell_type": classifier.classify(id) }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn handle_contacts(
    graph: &Path,
    from: CellType,
    ids: Vec<String>,
    format: OutputFormat,
) -> anyhow::Result<i32> {
    let graph = load_graph(graph)?;
    let assoc = neurograph::FiberAssociation::default();
    let query = CircuitQuery::new(&graph, &assoc);

    let ids = if ids.is_empty() {
        graph
            .neurons()
            .filter(|n| matches!(n.cell_type, Some(CellType::Mli1 | CellType::Mli2)))
            .map(|n| n.id.clone())
            .collect()
    } else {
        ids
    };
    if ids.is_empty() {
        bail!("no neurons to report; name some ids");
    }

    let mut rows = Vec::new();
    for id in &ids {
        rows.push((id, query.fiber_contacts(id, from)?));
    }

    match format {
        OutputFormat::Human => {
            for (id, count) in &rows {
                println!(
                    "{}: {} synapses from {} {} neurons",
                    id, count.contacts, count.unique_partners, from
                );
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = rows
                .iter()
                .map(|(id, count)| serde_json::json!({ "id": id, "from": from, "contacts": count }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(0)
}
