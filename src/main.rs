//! Binary entry point for ticketcleaner.
//!
//! Installs the schema, manages filters, refreshes the picture registry and
//! runs the lifecycle hooks on records piped through stdin.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow unnecessary_wraps for consistent command function signatures
#![allow(clippy::unnecessary_wraps)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use ticketcleaner::hooks::{HookHandler, RecordHookHandler};
use ticketcleaner::models::NewFilter;
use ticketcleaner::observability;
use ticketcleaner::services::{FileHasher, RefreshOutcome};
use ticketcleaner::storage::SqliteStore;
use ticketcleaner::{
    CleanerConfig, CleanerHooks, FilterStore, FilterType, HashRegistry, HookEvent,
};

/// Ticketcleaner - signature stripping and signature-image dedup for tickets.
#[derive(Parser)]
#[command(name = "ticketcleaner")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "TICKETCLEANER_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the schema and load the picture registry.
    Install,

    /// Drop the picture registry tables. Filters are kept.
    Uninstall,

    /// Reload picture hashes if the pictures directory changed.
    Refresh {
        /// Reload even if the directory did not change.
        #[arg(long)]
        force: bool,
    },

    /// Show filter counts and registry state.
    Status,

    /// Manage text filters.
    Filter {
        /// Filter subcommand.
        #[command(subcommand)]
        action: FilterAction,
    },

    /// Run a lifecycle hook on a JSON record read from stdin.
    Hook {
        /// Hook event type.
        #[command(subcommand)]
        event: HookCommand,
    },

    /// Print the SHA-1 of a file and whether it is a known signature image.
    Hash {
        /// File to hash.
        file: PathBuf,
    },
}

/// Hook events.
#[derive(Subcommand, Clone, Copy)]
enum HookCommand {
    /// Before a ticket is created.
    BeforeCreate,
    /// Before a followup is created.
    BeforeCreateFollowup,
    /// Before a ticket is updated.
    BeforeUpdate,
    /// Before a followup is updated.
    BeforeUpdateFollowup,
}

impl From<HookCommand> for HookEvent {
    fn from(command: HookCommand) -> Self {
        match command {
            HookCommand::BeforeCreate => Self::BeforeCreate,
            HookCommand::BeforeCreateFollowup => Self::BeforeCreateFollowup,
            HookCommand::BeforeUpdate => Self::BeforeUpdate,
            HookCommand::BeforeUpdateFollowup => Self::BeforeUpdateFollowup,
        }
    }
}

/// Filter subcommands.
#[derive(Subcommand)]
enum FilterAction {
    /// List every filter, active or not.
    List,

    /// Add a filter.
    Add {
        /// Filter name.
        #[arg(short, long)]
        name: String,

        /// Type: signature-start, signature-end, body or title.
        #[arg(short = 't', long = "type", value_parser = parse_filter_type)]
        filter_type: FilterType,

        /// Pattern with delimiters, e.g. `/Best regards.*/s`.
        #[arg(short, long)]
        regex: String,

        /// Replacement text.
        #[arg(short = 'p', long, default_value = "")]
        replacement: String,

        /// Position within the type.
        #[arg(short, long)]
        order: Option<i64>,

        /// Free-text comment.
        #[arg(long)]
        comment: Option<String>,

        /// Store the filter inactive.
        #[arg(long)]
        inactive: bool,
    },

    /// Activate a filter.
    Enable {
        /// Filter id.
        id: i64,
    },

    /// Deactivate a filter.
    Disable {
        /// Filter id.
        id: i64,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init_from_settings(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: &CleanerConfig) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Install => cmd_install(config),
        Commands::Uninstall => cmd_uninstall(config),
        Commands::Refresh { force } => cmd_refresh(config, force),
        Commands::Status => cmd_status(config),
        Commands::Filter { action } => cmd_filter(config, action),
        Commands::Hook { event } => cmd_hook(event.into(), config),
        Commands::Hash { file } => cmd_hash(config, &file),
    }
}

/// Loads configuration.
fn load_config(path: Option<&Path>) -> Result<CleanerConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(CleanerConfig::load_from_file(path)?),
        None => Ok(CleanerConfig::load_default()?),
    }
}

fn parse_filter_type(s: &str) -> Result<FilterType, String> {
    FilterType::parse(s).ok_or_else(|| {
        format!("unknown filter type '{s}' (signature-start, signature-end, body, title)")
    })
}

fn open_store(config: &CleanerConfig) -> Result<Arc<SqliteStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(SqliteStore::open(config.db_path())?))
}

fn registry(config: &CleanerConfig, store: &Arc<SqliteStore>) -> HashRegistry {
    HashRegistry::new(store.clone(), store.clone(), config.pictures_dir())
}

fn print_refresh(outcome: &RefreshOutcome) {
    match outcome {
        RefreshOutcome::Unchanged { watermark } => {
            println!("Picture registry up to date (watermark {watermark})");
        },
        RefreshOutcome::Refreshed {
            files,
            blacklisted,
            watermark,
        } => {
            println!(
                "Picture registry loaded: {files} file(s), {blacklisted} blacklisted document(s), watermark {watermark}"
            );
        },
        RefreshOutcome::DirectoryUnavailable => {
            println!("Pictures directory unavailable, registry left as is");
        },
    }
}

/// Install command.
fn cmd_install(config: &CleanerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    let report = store.install()?;
    println!("Schema installed in {}", config.db_path().display());
    if report.legacy_backed_up {
        println!("Legacy filter table kept as backup_filters");
    }
    if report.columns_upgraded {
        println!("Filter columns upgraded to TEXT");
    }

    std::fs::create_dir_all(config.pictures_dir())?;
    print_refresh(&registry(config, &store).refresh_if_stale()?);
    Ok(())
}

/// Uninstall command.
fn cmd_uninstall(config: &CleanerConfig) -> Result<(), Box<dyn std::error::Error>> {
    open_store(config)?.uninstall()?;
    println!("Picture registry removed, filters kept");
    Ok(())
}

/// Refresh command.
fn cmd_refresh(config: &CleanerConfig, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    let registry = registry(config, &store);
    let outcome = if force {
        registry.force_refresh()?
    } else {
        registry.refresh_if_stale()?
    };
    print_refresh(&outcome);
    Ok(())
}

/// Status command.
fn cmd_status(config: &CleanerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    let filters = store.list_filters()?;
    let stats = registry(config, &store).stats()?;

    println!("Ticketcleaner Status");
    println!("====================");
    println!();
    println!("Database: {}", config.db_path().display());
    println!("Pictures: {}", config.pictures_dir().display());
    println!("Staging:  {}", config.staging_dir().display());
    println!();
    println!("Filters (active/total):");
    for filter_type in FilterType::all() {
        let of_type = filters.iter().filter(|f| f.filter_type == filter_type);
        let total = of_type.clone().count();
        let active = of_type.filter(|f| f.is_active).count();
        println!("  {:<16} {active}/{total}", filter_type.as_str());
    }
    println!();
    println!("Picture registry: {} hash(es)", stats.records);
    match stats.watermark {
        Some(watermark) => println!("Watermark: {watermark}"),
        None => println!("Watermark: never loaded"),
    }
    Ok(())
}

/// Filter command.
fn cmd_filter(config: &CleanerConfig, action: FilterAction) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(config)?;
    match action {
        FilterAction::List => {
            for filter in store.list_filters()? {
                let order = filter.order.map_or_else(|| "-".to_string(), |o| o.to_string());
                let state = if filter.is_active { "on " } else { "off" };
                println!(
                    "{:>4} {state} {:<16} {order:>4}  {}  {} => {:?}",
                    filter.id,
                    filter.filter_type.as_str(),
                    filter.name,
                    filter.regex,
                    filter.replacement
                );
            }
        },
        FilterAction::Add {
            name,
            filter_type,
            regex,
            replacement,
            order,
            comment,
            inactive,
        } => {
            let filter = store.insert_filter(&NewFilter {
                name,
                filter_type,
                order,
                regex,
                replacement,
                is_active: !inactive,
                comment,
            })?;
            println!("Filter {} added ({})", filter.id, filter.filter_type);
        },
        FilterAction::Enable { id } => set_active(&store, id, true)?,
        FilterAction::Disable { id } => set_active(&store, id, false)?,
    }
    Ok(())
}

fn set_active(store: &SqliteStore, id: i64, active: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !store.set_active(id, active)? {
        return Err(format!("no filter with id {id}").into());
    }
    println!("Filter {id} {}", if active { "enabled" } else { "disabled" });
    Ok(())
}

/// Hook command.
fn cmd_hook(event: HookEvent, config: &CleanerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let input = read_hook_input()?;
    let hooks = CleanerHooks::from_config(config)?;
    let handler = RecordHookHandler::new(event, Arc::new(hooks));
    let response = handler.handle(&input)?;

    println!("{response}");

    Ok(())
}

/// Hash command.
fn cmd_hash(config: &CleanerConfig, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let hash = FileHasher::hash_file(file)?;
    let store = open_store(config)?;
    let known = registry(config, &store).is_known(&hash)?;
    println!("{hash}  {}", if known { "known" } else { "unknown" });
    Ok(())
}

/// Reads hook input from stdin as a string.
fn read_hook_input() -> Result<String, Box<dyn std::error::Error>> {
    use std::io::{self, Read};

    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    if input.trim().is_empty() {
        Ok("{}".to_string())
    } else {
        Ok(input)
    }
}
