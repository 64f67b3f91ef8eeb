//! sqlroute — inspect schema indexes, hints and reconciled decisions.
//!
//! # Usage
//!
//! ```bash
//! # Show what the parser found
//! sqlroute schema instructions/db_description.txt
//!
//! # Rank column hints for a question
//! sqlroute hints instructions/db_description.txt "List all products containing peanuts"
//!
//! # Repair an oracle answer
//! sqlroute reconcile instructions/db_description.txt \
//!     --question "List all products containing peanuts" \
//!     --decision '{"route":"sql_query","suggestions":["products.fake_col"]}'
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use sqlroute::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sqlroute")]
#[command(version)]
#[command(about = "Schema-true routing for SQL chat assistants", long_about = None)]
#[command(after_help = "EXAMPLES:
    sqlroute schema db_description.txt
    sqlroute hints db_description.txt 'Which campaigns ran over budget?' -k 5
    sqlroute reconcile db_description.txt --decision '{\"route\":\"clarify\"}'")]
struct Cli {
    /// Configuration file (defaults to ./sqlroute.toml or the user config dir)
    #[arg(short, long, global = true, env = "SQLROUTE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a schema description and list its tables and columns
    Schema {
        /// Schema description file
        file: PathBuf,
    },
    /// Rank fuzzy column hints for a question
    Hints {
        /// Schema description file
        file: PathBuf,
        /// The user question
        question: String,
        /// Number of hints (defaults to hints.limit)
        #[arg(short)]
        k: Option<usize>,
    },
    /// Reconcile a raw oracle decision against the schema
    Reconcile {
        /// Schema description file
        file: PathBuf,
        /// Raw decision JSON, as returned by the oracle
        #[arg(short, long)]
        decision: String,
        /// Question used to compute backfill hints
        #[arg(short, long, default_value = "")]
        question: String,
        /// Language tag to attach
        #[arg(short, long)]
        language: Option<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Print the column list an oracle prompt would embed
    Columns {
        /// Schema description file
        file: PathBuf,
        /// Column budget (defaults to prompt.max_columns)
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "sqlroute=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => RouterConfig::load(path)?,
        None => RouterConfig::discover()?,
    };

    match &cli.command {
        Commands::Schema { file } => show_schema(&load_router(file, config)?),
        Commands::Hints { file, question, k } => {
            show_hints(&load_router(file, config)?, question, *k);
        }
        Commands::Reconcile {
            file,
            decision,
            question,
            language,
            format,
        } => {
            let router = load_router(file, config)?;
            let raw = RawDecision::from_json(decision).context("Failed to decode --decision")?;
            let hints = router.hints(question);
            let reconciled = router.reconcile(&raw, &hints, language.as_deref());
            print_decision(&raw, &reconciled, format)?;
        }
        Commands::Columns { file, limit } => {
            let router = load_router(file, config)?;
            let limit = limit.unwrap_or(router.config().prompt.max_columns);
            let known: Vec<&str> = router
                .index()
                .known_columns(limit)
                .iter()
                .map(ColumnRef::as_str)
                .collect();
            println!("{}", known.join("; "));
        }
    }

    Ok(())
}

fn load_router(file: &Path, config: RouterConfig) -> Result<Router> {
    Router::from_path(file, config).with_context(|| format!("Failed to load schema {}", file.display()))
}

fn show_schema(router: &Router) {
    let index = router.index();
    if index.table_count() == 0 {
        println!("{}", "(no tables recognized)".dimmed());
        return;
    }

    for table in index.tables() {
        println!("{} {}", "###".dimmed(), table.name.cyan().bold());
        for column in &table.columns {
            println!("  • {}", column.white());
        }
    }
    println!();
    println!(
        "{} table(s), {} column(s) total",
        index.table_count().to_string().cyan(),
        index.len().to_string().cyan()
    );
}

fn show_hints(router: &Router, question: &str, k: Option<usize>) {
    let hints = match k {
        Some(k) => HintEngine::new(&router.config().hints).suggest_top(question, router.index(), k),
        None => router.hints(question),
    };

    if hints.is_empty() {
        println!("{}", "(no hints)".dimmed());
        return;
    }

    for (rank, hint) in hints.iter().enumerate() {
        println!(
            "{:>2}. {:40} {}",
            rank + 1,
            hint.column.as_str().white(),
            format!("{:.1}", hint.score).yellow()
        );
    }
}

fn print_decision(raw: &RawDecision, decision: &RoutingDecision, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(decision)?);
        }
        OutputFormat::Table => {
            let route = match decision.route {
                Route::SqlQuery => decision.route.to_string().green().bold(),
                Route::Clarify => decision.route.to_string().yellow().bold(),
            };
            println!("{} {}", "Route:".dimmed(), route);

            let summary = decision.explanation.summary();
            if !summary.is_empty() {
                println!("{} {}", "Reason:".dimmed(), summary);
            }
            for question in decision.explanation.follow_up() {
                println!("{} {}", "Follow-up:".dimmed(), question);
            }

            if decision.suggestions.is_empty() {
                println!("{} {}", "Suggestions:".dimmed(), "None".dimmed());
            } else {
                println!("{}", "Suggestions:".dimmed());
                for col in &decision.suggestions {
                    println!("  • {}", col.as_str().white());
                }
            }

            let dropped: Vec<&String> = raw
                .suggestions
                .iter()
                .filter(|s| !decision.suggestions.iter().any(|c| c == s.as_str()))
                .collect();
            if !dropped.is_empty() {
                println!();
                for s in dropped {
                    println!("{} dropped '{}'", "⚠".yellow(), s);
                }
            }

            if let Some(lang) = &decision.language {
                println!("{} {}", "Language:".dimmed(), lang);
            }
        }
    }
    Ok(())
}
