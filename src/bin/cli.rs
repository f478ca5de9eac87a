//! Command-line front end for the pattern bridge.
#![forbid(unsafe_code)]

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use pattern_bridge::{
    logical::MatchSentence,
    side_table::{DataKey, DataValue},
    BridgeConfig, BridgeError, CompilationSession, HeuristicSelectivity, InMemoryCatalog,
    PatternBridge,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "pattern-bridge",
    version,
    about = "Compile match sentences into canonical patterns and operator trees",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "PATTERN_BRIDGE_CONFIG",
        help = "Configuration file (defaults to the platform config directory)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Print the canonical pattern and side table of a request")]
    Pattern {
        #[arg(value_name = "REQUEST")]
        request: PathBuf,
    },

    #[command(about = "Plan a request with the naive extend chain and print the explain tree")]
    Plan {
        #[arg(value_name = "REQUEST")]
        request: PathBuf,

        #[arg(long, help = "Redact literals in the explain output")]
        redact: bool,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Input file: the schema and the sentences of one match clause.
#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    catalog: InMemoryCatalog,
    sentences: Vec<MatchSentence>,
}

#[derive(Debug, Serialize)]
struct PatternReport {
    pattern_id: u64,
    canonical_hash: String,
    vertices: Vec<VertexReport>,
    edges: Vec<EdgeReport>,
    side_table: Vec<SideTableEntry>,
}

#[derive(Debug, Serialize)]
struct VertexReport {
    order: usize,
    id: usize,
    types: Vec<u32>,
    selectivity: f64,
    optional: bool,
}

#[derive(Debug, Serialize)]
struct EdgeReport {
    order: usize,
    id: usize,
    src: usize,
    dst: usize,
    direction: String,
    types: Vec<String>,
    selectivity: f64,
    optional: bool,
    range: Option<String>,
}

#[derive(Debug, Serialize)]
struct SideTableEntry {
    key: DataKey,
    value: DataValue,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        match err.downcast_ref::<BridgeError>() {
            Some(bridge) => eprintln!("error: [{}] {bridge}", bridge.code()),
            None => eprintln!("error: {err}"),
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let mut config = BridgeConfig::load(cli.config.as_deref()).map_err(BridgeError::from)?;

    match cli.command {
        Command::Pattern { request } => {
            let (bridge, sentences) = open_request(&request, config)?;
            let session = bridge.build(&sentences)?;
            let report = pattern_report(&session);
            emit(cli.format, &report, || {
                print!("{}", session.pattern);
                println!("canonical_hash: {}", report.canonical_hash);
                print!("{}", session.side_table);
            })?;
        }
        Command::Plan { request, redact } => {
            config.explain.redact_literals |= redact;
            let (bridge, sentences) = open_request(&request, config)?;
            let output = bridge.plan_naive(&sentences)?;
            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&output.explain.to_json())?)
                }
                OutputFormat::Text => print!("{}", output.explain.to_text()),
            }
        }
    }

    Ok(())
}

fn open_request(
    path: &Path,
    config: BridgeConfig,
) -> Result<(PatternBridge, Vec<MatchSentence>), Box<dyn Error>> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read request {}: {err}", path.display()))?;
    let request: Request = serde_json::from_str(&contents)
        .map_err(|err| format!("failed to parse request {}: {err}", path.display()))?;
    let bridge = PatternBridge::new(
        Arc::new(request.catalog.reindex()),
        Arc::new(HeuristicSelectivity),
        config,
    );
    Ok((bridge, request.sentences))
}

fn pattern_report(session: &CompilationSession) -> PatternReport {
    let pattern = &session.pattern;
    PatternReport {
        pattern_id: pattern.id().0,
        canonical_hash: format!("{:016x}", pattern.canonical_hash()),
        vertices: pattern
            .vertices()
            .map(|(idx, vertex)| VertexReport {
                order: pattern.vertex_order(idx),
                id: vertex.id,
                types: vertex.type_ids().iter().map(|t| t.0).collect(),
                selectivity: vertex.details.selectivity,
                optional: vertex.details.optional,
            })
            .collect(),
        edges: pattern
            .edges()
            .map(|(idx, edge)| EdgeReport {
                order: pattern.edge_order(idx),
                id: edge.id,
                src: pattern.vertex_order(edge.src),
                dst: pattern.vertex_order(edge.dst),
                direction: edge.direction().to_string(),
                types: edge.type_ids().iter().map(|t| t.to_string()).collect(),
                selectivity: edge.details.selectivity,
                optional: edge.details.optional,
                range: edge.details.range.map(|r| r.to_string()),
            })
            .collect(),
        side_table: session
            .side_table
            .iter()
            .map(|(key, value)| SideTableEntry {
                key: *key,
                value: value.clone(),
            })
            .collect(),
    }
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> Result<(), Box<dyn Error>>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}
