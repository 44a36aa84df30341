//! CLI entry point for the stixgraph threat graph analyzer.
//!
//! Results go to stdout as JSON; logs go to stderr.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use stixgraph_analyze::export::write_report;
use stixgraph_analyze::types::{ExportSummary, QueryReport};
use stixgraph_analyze::{AnalysisBundle, AnalysisEngine, AnalyzeError};
use stixgraph_core::config::{layered, load_analysis_config, AnalysisConfig};
use stixgraph_core::{Bundle, LoadOptions};
use stixgraph_graph::{GraphClient, GraphConfig, GraphSink, MemorySink};

#[derive(Parser)]
#[command(name = "stixgraph")]
#[command(about = "Threat knowledge graph analysis for STIX (MITRE ATT&CK) bundles")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file prefix (default: stixgraph).
    #[arg(short, long, default_value = "stixgraph", global = true)]
    config: String,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse a bundle in memory and print summary statistics.
    Analyze {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Analyse a bundle, replace the graph store's contents, and run the reports.
    Load {
        #[command(flatten)]
        run: RunArgs,

        /// Export into an in-process store instead of Memgraph.
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the analytical reports against an already loaded store.
    Query {
        /// Rows per report.
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// STIX bundle (e.g. enterprise-attack.json).
    #[arg(short, long)]
    input: PathBuf,

    /// Write the full JSON report here.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Louvain seed (overrides config).
    #[arg(long)]
    seed: Option<u64>,

    /// Drop revoked and deprecated objects.
    #[arg(long)]
    skip_revoked: bool,

    /// Rows per report (overrides config).
    #[arg(long)]
    limit: Option<usize>,
}

impl RunArgs {
    fn apply(&self, mut config: AnalysisConfig) -> AnalysisConfig {
        if let Some(seed) = self.seed {
            config.louvain_seed = seed;
        }
        if let Some(limit) = self.limit {
            config.report_limit = limit;
        }
        config.skip_revoked |= self.skip_revoked;
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if cli.log_json {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
    } else {
        fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    }

    let analysis_config = load_analysis_config(&cli.config)?;

    match cli.command {
        Command::Analyze { ref run } => {
            let engine = AnalysisEngine::new(run.apply(analysis_config));
            let start = Instant::now();
            let bundle = load_bundle(run, engine.config())?;
            let analysis = engine.analyze(&bundle.objects);
            let computation_ms = start.elapsed().as_millis() as u64;

            if let Some(path) = &run.output {
                let report = engine.report(&analysis, bundle.summary.clone(), None, Vec::new(), computation_ms);
                write_report(&report, path)?;
            }
            println!("{}", serde_json::to_string_pretty(&analysis.stats)?);
        }
        Command::Load { ref run, dry_run } => {
            let engine = AnalysisEngine::new(run.apply(analysis_config));
            let start = Instant::now();
            let bundle = load_bundle(run, engine.config())?;
            let analysis = engine.analyze(&bundle.objects);
            let computation_ms = start.elapsed().as_millis() as u64;

            let outcome = if dry_run {
                export_and_query(&engine, &analysis, &MemorySink::new()).await
            } else {
                match GraphClient::connect(&load_graph_config(&cli.config)).await {
                    Ok(client) => export_and_query(&engine, &analysis, &client).await,
                    Err(e) => Err(AnalyzeError::from(e)),
                }
            };

            match outcome {
                Ok((summary, queries)) => {
                    let report =
                        engine.report(&analysis, bundle.summary.clone(), Some(summary), queries, computation_ms);
                    if let Some(path) = &run.output {
                        write_report(&report, path)?;
                    }
                    println!("{}", serde_json::to_string_pretty(&report.queries)?);
                }
                Err(e) => {
                    // Keep the in-memory results even though the run failed.
                    if let Some(path) = &run.output {
                        let report =
                            engine.report(&analysis, bundle.summary.clone(), None, Vec::new(), computation_ms);
                        write_report(&report, path)?;
                    }
                    return Err(e.into());
                }
            }
        }
        Command::Query { limit } => {
            let limit = limit.unwrap_or(analysis_config.report_limit);
            let engine = AnalysisEngine::new(AnalysisConfig {
                report_limit: limit,
                ..analysis_config
            });
            let client = GraphClient::connect(&load_graph_config(&cli.config)).await?;
            let queries = engine.run_queries(&client).await?;
            println!("{}", serde_json::to_string_pretty(&queries)?);
        }
    }

    Ok(())
}

async fn export_and_query<S: GraphSink>(
    engine: &AnalysisEngine,
    analysis: &AnalysisBundle,
    sink: &S,
) -> Result<(ExportSummary, Vec<QueryReport>), AnalyzeError> {
    let summary = engine.export(analysis, sink).await?;
    let queries = engine.run_queries(sink).await?;
    Ok((summary, queries))
}

fn load_bundle(run: &RunArgs, config: &AnalysisConfig) -> anyhow::Result<Bundle> {
    let options = LoadOptions {
        skip_retired: config.skip_revoked,
    };
    Ok(Bundle::from_path(&run.input, options)?)
}

fn load_graph_config(file_prefix: &str) -> GraphConfig {
    let defaults = GraphConfig::default();
    match layered(file_prefix) {
        Ok(c) => GraphConfig {
            uri: c.get_string("memgraph.uri").unwrap_or(defaults.uri),
            user: c.get_string("memgraph.user").unwrap_or(defaults.user),
            password: c.get_string("memgraph.password").unwrap_or(defaults.password),
            max_connections: positive_or(
                c.get_int("memgraph.max_connections").ok(),
                defaults.max_connections,
            ),
            fetch_size: positive_or(c.get_int("memgraph.fetch_size").ok(), defaults.fetch_size),
        },
        Err(_) => defaults,
    }
}

/// A configured size, or `default` when unset, zero, negative or out of range.
fn positive_or<T: TryFrom<i64>>(value: Option<i64>, default: T) -> T {
    value
        .filter(|&v| v > 0)
        .and_then(|v| T::try_from(v).ok())
        .unwrap_or(default)
}
