//! skilltree: command-line tool for managing a skills taxonomy state file.
//!
//! Every command opens the JSON state file named in the configuration,
//! applies its change, and writes the file back.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use skilltree_core::{
    InactiveBinRepository, InactiveFilter, InactiveItemType, NodeTree, ProficiencyRepository,
    RestoredItem, SkilltreeConfig, StaticSuggestionProvider, SuggestionProvider,
    TaxonomyRepository,
};
use skilltree_import::{
    export_mappings, export_taxonomy, mapping_template, taxonomy_template, CancelToken,
    ImportProgress, ImportReport, ImportRunner, RowOutcome,
};
use skilltree_store::MemoryRepository;

#[derive(Parser)]
#[command(name = "skilltree")]
#[command(author, version, about = "Hierarchical skills taxonomy management")]
#[command(propagate_version = true)]
struct Cli {
    /// Config file (default: ~/.config/skilltree/config.toml, then SKILLTREE_* env)
    #[arg(short, long, global = true, env = "SKILLTREE_CONFIG")]
    config: Option<PathBuf>,

    /// State file, overriding the configured one
    #[arg(short, long, global = true)]
    state: Option<PathBuf>,

    /// Name recorded on inactivations and merges
    #[arg(short, long, global = true)]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a CSV import template
    Template {
        /// Print the proficiency mapping template instead
        #[arg(long)]
        mappings: bool,
    },

    /// Import taxonomy nodes from CSV (Ctrl-C stops between rows)
    Import {
        /// CSV file with columns name,description,type,parent
        file: PathBuf,

        /// Delay between rows in milliseconds (overrides config)
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export the active taxonomy as CSV
    Export {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import skill proficiency mappings from CSV
    ImportMappings {
        /// CSV file with columns Skill Name,Proficiency Description,Proficiency Level
        file: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export active proficiency mappings as CSV
    ExportMappings {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the active tree
    Tree,

    /// List global proficiency levels
    Levels,

    /// Inspect and manage the Inactive Bin
    Bin {
        #[command(subcommand)]
        command: BinCommands,
    },

    /// Merge a duplicate node into another node of the same kind
    Merge {
        /// Node to absorb and inactivate
        source: Uuid,
        /// Node that survives
        target: Uuid,
    },

    /// Suggest related skills
    Suggest {
        /// Skill name
        skill: String,

        #[arg(short, long, default_value_t = skilltree_core::defaults::SUGGESTION_LIMIT)]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum BinCommands {
    /// List inactive items, newest first
    List {
        /// Restrict to item types (cluster, group, skill, proficiency)
        #[arg(short = 't', long = "type")]
        types: Vec<InactiveItemType>,

        /// Case-insensitive text filter on name, description, and parent
        #[arg(long)]
        search: Option<String>,
    },

    /// Restore an inactive item
    Restore {
        /// Inactive item id
        id: Uuid,
    },

    /// Permanently delete an inactive item
    Purge {
        /// Inactive item id
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize tracing on stderr so CSV output on stdout stays clean.
///
/// Environment variables:
///   LOG_FORMAT  - "json" or "text" (default: "text")
///   LOG_FILE    - path to log file (optional, enables file logging)
///   LOG_ANSI    - "true"/"false" override ANSI colors
///   RUST_LOG    - standard env filter (default: "warn")
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let file_dir = Path::new(path).parent().unwrap_or(Path::new("."));
        let file_name = Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("skilltree.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(log_ansi.unwrap_or(false));
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<SkilltreeConfig> {
    let mut config = match cli.config {
        Some(ref path) => SkilltreeConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SkilltreeConfig::load().context("loading config")?,
    };
    if let Some(ref state) = cli.state {
        config = config.with_state_path(state.clone());
    }
    if let Some(ref actor) = cli.actor {
        config = config.with_actor(actor.clone());
    }
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Templates need no store.
    if let Commands::Template { mappings } = cli.command {
        let template = if mappings {
            mapping_template()?
        } else {
            taxonomy_template()?
        };
        print!("{}", template);
        return Ok(());
    }

    let config = load_config(&cli)?;
    let repo = MemoryRepository::open(&config)
        .await
        .with_context(|| format!("opening state {}", config.store.state_path.display()))?;
    info!(state = %config.store.state_path.display(), actor = %config.actor, "skilltree ready");

    match cli.command {
        Commands::Template { .. } => {}
        Commands::Import {
            file,
            delay_ms,
            json,
        } => {
            let mut runner = ImportRunner::from_config(repo.clone(), &config)
                .with_events(repo.events().clone())
                .with_progress(Box::new(print_progress));
            if let Some(ms) = delay_ms {
                runner = runner.with_row_delay(Duration::from_millis(ms));
            }
            let cancel = cancel_on_ctrl_c();
            let reader = File::open(&file).with_context(|| format!("opening {}", file.display()))?;
            let report = runner.import_taxonomy(reader, &cancel).await?;
            print_report(&report, json)?;
        }
        Commands::Export { output } => {
            let csv = export_taxonomy(&repo.tree().await?)?;
            write_output(output.as_deref(), &csv)?;
        }
        Commands::ImportMappings { file, json } => {
            let runner = ImportRunner::from_config(repo.clone(), &config)
                .with_events(repo.events().clone())
                .with_progress(Box::new(print_progress));
            let cancel = cancel_on_ctrl_c();
            let reader = File::open(&file).with_context(|| format!("opening {}", file.display()))?;
            let report = runner.import_mappings(reader, &cancel).await?;
            print_report(&report, json)?;
        }
        Commands::ExportMappings { output } => {
            let csv = export_mappings(&repo.list_mappings(None).await?)?;
            write_output(output.as_deref(), &csv)?;
        }
        Commands::Tree => {
            let tree = repo.tree().await?;
            if tree.is_empty() {
                println!("(empty taxonomy)");
            }
            for root in &tree {
                print_tree(root, 0);
            }
            let orphans = repo.orphans().await;
            if !orphans.is_empty() {
                println!("\n{} node(s) hidden under inactive parents", orphans.len());
            }
        }
        Commands::Levels => {
            for level in repo.list_levels().await? {
                println!(
                    "{:>2}. {:<14} {:>3}-{:<3} {}",
                    level.order, level.title, level.min_score, level.max_score, level.description
                );
            }
        }
        Commands::Bin { command } => run_bin(&repo, command).await?,
        Commands::Merge { source, target } => {
            let record = repo.merge(source, target).await?;
            println!(
                "Merged {} {} into {}: {} child(ren) moved, {} mapping(s) redirected, {} discarded",
                record.kind,
                record.source_id,
                record.target_id,
                record.moved_children.len(),
                record.redirected_mappings.len(),
                record.discarded_mappings.len()
            );
        }
        Commands::Suggest { skill, limit } => {
            let provider = StaticSuggestionProvider::default();
            let suggestions = provider.suggest(&skill, limit).await?;
            if suggestions.is_empty() {
                println!("No suggestions for '{}'", skill);
            }
            for suggestion in suggestions {
                println!("{}", suggestion.name);
            }
        }
    }
    Ok(())
}

async fn run_bin(repo: &MemoryRepository, command: BinCommands) -> anyhow::Result<()> {
    match command {
        BinCommands::List { types, search } => {
            let items = repo.list_inactive(InactiveFilter { types, search }).await?;
            if items.is_empty() {
                println!("Inactive Bin is empty");
            }
            for item in items {
                println!(
                    "{}  {:<11} {:<30} parent={:<20} by {} at {}",
                    item.id,
                    item.item_type,
                    item.name,
                    item.parent_name.as_deref().unwrap_or("-"),
                    item.inactivated_by,
                    item.inactivated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        BinCommands::Restore { id } => match repo.restore(id).await? {
            RestoredItem::Node(node) => {
                println!("Restored {} '{}' ({})", node.kind(), node.name, node.id)
            }
            RestoredItem::Mapping(mapping) => println!(
                "Restored mapping '{}' for {} ({})",
                mapping.proficiency_description, mapping.skill_name, mapping.id
            ),
        },
        BinCommands::Purge { id } => {
            let item = repo.purge(id).await?;
            println!("Purged {} '{}'", item.item_type, item.name);
        }
    }
    Ok(())
}

/// Token cancelled by the first Ctrl-C.
fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling after the current row...");
            token.cancel();
        }
    });
    cancel
}

fn print_progress(progress: &ImportProgress) {
    let status = match progress.outcome {
        RowOutcome::Created { .. } => "ok".to_string(),
        RowOutcome::Failed { ref message } => format!("error: {}", message),
    };
    eprintln!(
        "[{:>3}%] {}/{} row {}: {}",
        progress.percent(),
        progress.processed,
        progress.total,
        progress.row,
        status
    );
}

fn print_report(report: &ImportReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!(
        "Import {}: {} of {} row(s) created, {} error(s){}",
        report.import_id,
        report.succeeded(),
        report.total,
        report.failed(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    for error in report.sorted_errors() {
        let name = if error.name.is_empty() { "-" } else { error.name.as_str() };
        println!("  row {} [{}]: {}", error.row, name, error.message);
    }
    Ok(())
}

fn print_tree(node: &NodeTree, depth: usize) {
    println!(
        "{}{}. {} [{}]",
        "  ".repeat(depth),
        node.node.rank,
        node.node.name,
        node.node.kind()
    );
    for child in &node.children {
        print_tree(child, depth + 1);
    }
}

fn write_output(path: Option<&Path>, contents: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("Wrote {}", path.display());
        }
        None => print!("{}", contents),
    }
    Ok(())
}
