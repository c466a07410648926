use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};
use triage_core::kb::load_path;
use triage_core::service::{IngestReport, ServiceStats};
use triage_core::{SearchConfig, SimilarityService};

#[derive(Parser)]
#[command(name = "triage-indexer")]
#[command(about = "Load a ticket knowledge base, inspect its index and run ad-hoc similarity queries", long_about = None)]
struct Cli {
    /// Optional JSON search config; missing fields use defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and index a knowledge base, then print the ingest report
    Check {
        /// Input path (JSON/JSONL file or directory)
        #[arg(long)]
        input: PathBuf,
        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Rank knowledge-base tickets against a problem description
    Query {
        #[arg(long)]
        input: PathBuf,
        /// Problem description to search for
        #[arg(long)]
        q: String,
        #[arg(long, default_value_t = 4)]
        k: usize,
    },
    /// List the most widespread index terms
    Terms {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value_t = 20)]
        top: usize,
    },
}

#[derive(Serialize)]
struct CheckOutput {
    built_at: String,
    malformed_lines: Vec<String>,
    report: IngestReport,
    stats: ServiceStats,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(p) => SearchConfig::from_json_file(p)?,
        None => SearchConfig::default(),
    };

    match cli.command {
        Commands::Check { input, json } => check(&input, config, json),
        Commands::Query { input, q, k } => query(&input, config, &q, k),
        Commands::Terms { input, top } => terms(&input, config, top),
    }
}

fn load(input: &Path, config: SearchConfig) -> Result<(SimilarityService, IngestReport, Vec<String>)> {
    let kb = load_path(input)?;
    tracing::info!(
        input = %input.display(),
        records = kb.records.len(),
        malformed = kb.malformed.len(),
        "read knowledge base"
    );
    let service = SimilarityService::new(config);
    let report = service.ingest(kb.records);
    tracing::info!(
        inserted = report.load.inserted,
        skipped = report.load.skip_count(),
        unindexed = report.build.skipped.len(),
        "ingested tickets"
    );
    if !service.is_ready() {
        bail!("no valid tickets in {}", input.display());
    }
    let stats = service.stats();
    tracing::info!(indexed = stats.indexed, terms = stats.terms, generation = report.generation, "index build complete");
    Ok((service, report, kb.malformed))
}

fn check(input: &Path, config: SearchConfig, json: bool) -> Result<()> {
    let (service, report, malformed_lines) = load(input, config)?;
    let out = CheckOutput {
        built_at: time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_default(),
        malformed_lines,
        report,
        stats: service.stats(),
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }
    println!("built_at:   {}", out.built_at);
    println!("tickets:    {} ({} indexed)", out.stats.tickets, out.stats.indexed);
    println!("terms:      {}", out.stats.terms);
    println!("malformed:  {}", out.malformed_lines.len());
    for line in &out.malformed_lines {
        println!("  {line}");
    }
    let skipped = out.report.load.skipped.iter().chain(out.report.build.skipped.iter());
    println!("skipped:    {}", out.report.load.skip_count() + out.report.build.skipped.len());
    for s in skipped {
        println!("  #{}: {}", s.position, s.reason);
    }
    Ok(())
}

fn query(input: &Path, config: SearchConfig, q: &str, k: usize) -> Result<()> {
    let (service, _, _) = load(input, config)?;
    let issues = service.similar_issues(q, k)?;
    if issues.is_empty() {
        println!("no similar tickets");
    }
    for (rank, issue) in issues.iter().enumerate() {
        println!("{:>2}. {} [{:.2}] {}", rank + 1, issue.ticket_id, issue.similarity_score, issue.problem_description);
        if !issue.solution_text.is_empty() {
            println!("    -> {}", issue.solution_text);
        }
    }
    Ok(())
}

fn terms(input: &Path, config: SearchConfig, top: usize) -> Result<()> {
    let (service, _, _) = load(input, config)?;
    let snapshot = service.snapshot()?;
    let mut entries: Vec<_> = snapshot.index.entries().collect();
    entries.sort_by(|a, b| b.document_frequency.cmp(&a.document_frequency).then(a.token.cmp(b.token)));
    for e in entries.into_iter().take(top) {
        println!("{:<24} df={}", e.token, e.document_frequency);
    }
    Ok(())
}
