//! BioModels CLI
//!
//! - `insert`: link pathways to BioModels identifiers in a release graph
//!   (Neo4j, or a JSON snapshot)
//! - `verify`: compare BioModels cross-reference counts between two releases

use anyhow::{anyhow, Context, Result};
use biomodels_graph::{GraphStore, MemoryGraph, Neo4jConfig, Neo4jGraph};
use biomodels_import::{
    run_import, verify_release, ImportReport, ImportRequest, InstanceEditRequest,
    ReferenceDatabaseDefinition, Verification,
};
use biomodels_ingest_tsv::read_models_tsv;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

mod config;

use config::{GraphBackend, InsertConfig};

#[derive(Parser)]
#[command(name = "biomodels")]
#[command(author, version, about = "BioModels cross-reference insertion for release graphs")]
struct Cli {
    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert BioModels identifiers and link them to their pathways
    Insert {
        /// Properties file (`personId`, `neo4jUri`, `neo4jUser`, `neo4jPassword`,
        /// `graphSnapshot`, `note`)
        #[arg(short, long, default_value = "config.properties")]
        config: PathBuf,
        /// models2pathways TSV file
        #[arg(short, long, default_value = "models2pathways.tsv")]
        models: PathBuf,
        /// Write the run report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Check that the BioModels cross-reference count did not decrease
    Verify {
        /// Current release: Neo4j URI or graph snapshot path
        #[arg(long, default_value = "bolt://localhost:7687")]
        current: String,
        #[arg(long, default_value = "neo4j")]
        current_user: String,
        #[arg(long, default_value = "root")]
        current_password: String,
        /// Previous release: Neo4j URI or graph snapshot path
        #[arg(long, default_value = "bolt://localhost:7688")]
        previous: String,
        #[arg(long, default_value = "neo4j")]
        previous_user: String,
        #[arg(long, default_value = "root")]
        previous_password: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Insert {
            config,
            models,
            report,
        } => cmd_insert(&config, &models, report.as_deref()),
        Commands::Verify {
            current,
            current_user,
            current_password,
            previous,
            previous_user,
            previous_password,
        } => cmd_verify(
            &GraphBackend::from_target(&current, &current_user, &current_password),
            &GraphBackend::from_target(&previous, &previous_user, &previous_password),
        ),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn cmd_insert(config_path: &Path, models_path: &Path, report_path: Option<&Path>) -> Result<()> {
    let start = Instant::now();
    tracing::info!("running BioModels insertion");

    let config = InsertConfig::load(config_path)?;
    let mapping = read_models_tsv(models_path)?;

    let mut instance_edit =
        InstanceEditRequest::new(config.person_id, chrono::Local::now().naive_local());
    if let Some(note) = &config.note {
        instance_edit = instance_edit.with_note(note.as_str());
    }
    let request = ImportRequest {
        instance_edit,
        pathway_models: mapping.into_pathway_models(),
        reference_database: ReferenceDatabaseDefinition::biomodels(),
    };

    println!(
        "{} {} into {}",
        "Inserting".green().bold(),
        models_path.display(),
        config.backend.describe()
    );
    let report = match &config.backend {
        GraphBackend::Snapshot(path) => {
            let graph = MemoryGraph::open(path)
                .with_context(|| format!("failed to open graph snapshot {}", path.display()))?;
            run_import(&graph, &request)
        }
        GraphBackend::Neo4j(neo4j) => run_import(&connect(neo4j)?, &request),
    }
    .map_err(|err| anyhow!("BioModels insertion failed: {}", err.chain()))?;
    print_report(&report);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        println!("  {} {}", "→".cyan(), path.display());
    }

    tracing::info!(
        seconds = start.elapsed().as_secs(),
        "completed BioModels insertion"
    );
    Ok(())
}

fn print_report(report: &ImportReport) {
    let refdb = if report.reference_database_created {
        "created"
    } else {
        "reused"
    };
    println!(
        "  Instance edit: dbId {}",
        report.instance_edit_db_id.to_string().yellow()
    );
    println!(
        "  Reference database: dbId {} ({refdb})",
        report.reference_database_db_id.to_string().yellow()
    );
    println!(
        "  Pathways linked: {}",
        report.linked_pathways.len().to_string().green()
    );
    println!(
        "  Identifiers created: {}",
        report.identifiers_created.to_string().green()
    );
    if !report.missing_pathways.is_empty() {
        println!(
            "  Pathways not in graph: {}",
            report.missing_pathways.len().to_string().yellow()
        );
    }
    for (rel_type, count) in &report.relationships {
        println!("  {rel_type}: {count}");
    }
}

fn connect(config: &Neo4jConfig) -> Result<Neo4jGraph> {
    Neo4jGraph::connect(config).with_context(|| format!("failed to connect to {}", config.uri))
}

fn load_snapshot(path: &Path) -> Result<MemoryGraph> {
    MemoryGraph::load(path).with_context(|| format!("failed to load {}", path.display()))
}

fn cmd_verify(current: &GraphBackend, previous: &GraphBackend) -> Result<()> {
    let verification = match current {
        GraphBackend::Snapshot(path) => verify_against(&load_snapshot(path)?, previous)?,
        GraphBackend::Neo4j(config) => verify_against(&connect(config)?, previous)?,
    };

    if verification.is_ok() {
        println!("{} {verification}", "✓".green().bold());
        Ok(())
    } else {
        Err(anyhow!("{verification}"))
    }
}

fn verify_against<C: GraphStore>(current: &C, previous: &GraphBackend) -> Result<Verification> {
    let display_name = ReferenceDatabaseDefinition::biomodels().display_name;
    let outcome = match previous {
        GraphBackend::Snapshot(path) => verify_release(current, &load_snapshot(path)?, &display_name),
        GraphBackend::Neo4j(config) => verify_release(current, &connect(config)?, &display_name),
    };
    outcome.map_err(|err| anyhow!("verification failed: {}", err.chain()))
}
