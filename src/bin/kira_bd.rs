use std::collections::BTreeSet;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use kira_biobank_directory::app::{App, LoadOptions, Query, run_query, summarize};
use kira_biobank_directory::config::{ConfigLoader, ResolvedConfig};
use kira_biobank_directory::domain::EntityKind;
use kira_biobank_directory::error::DirectoryError;
use kira_biobank_directory::output::{JsonOutput, LogSink, OutputMode, print_summary_text};
use kira_biobank_directory::snapshot::FileCatalog;
use kira_biobank_directory::store::SnapshotCache;

#[derive(Parser)]
#[command(name = "kira-bd")]
#[command(about = "Reconcile a biobank directory snapshot into a consistent relationship model")]
#[command(version, author)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    #[arg(long, global = true)]
    json: bool,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct SourceArgs {
    #[arg(long, global = true)]
    config: Option<String>,

    #[arg(long, global = true)]
    catalog_dir: Option<String>,

    #[arg(long, global = true)]
    cache_dir: Option<String>,

    #[arg(long, global = true)]
    no_cache: bool,

    #[arg(long, global = true, value_enum, num_args = 1..)]
    purge_cache: Vec<EntityKind>,

    #[arg(long, global = true)]
    purge_all_cache: bool,
}

#[derive(Subcommand)]
enum Command {
    #[command(about = "Build the model and print entity, graph and repair counts")]
    Summary,
    #[command(about = "Resolve the national node of a biobank, collection, network or contact")]
    Node { id: String },
    #[command(about = "List every sub-collection below a collection")]
    Descendants { id: String },
    #[command(about = "Show the hierarchy subgraph around a biobank or collection")]
    Subgraph { id: String },
    #[command(about = "Check whether a collection's size or donor count may be summed")]
    Countable { id: String, metric: String },
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<DirectoryError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &DirectoryError) -> u8 {
    match error {
        DirectoryError::NotFound { .. } | DirectoryError::MissingConfig => 2,
        error if error.is_structural() => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };
    let config = resolve_config(&cli.source)?;

    let cache = if config.use_cache {
        let cache = match &config.cache_dir {
            Some(dir) => SnapshotCache::open(dir.clone()),
            None => SnapshotCache::open_default(),
        };
        Some(cache.into_diagnostic()?)
    } else {
        None
    };

    let app = App::new(FileCatalog::new(config.catalog_dir.clone()), cache);
    let options = LoadOptions {
        purge: config.purge.clone(),
    };
    let loaded = app.load(&options, &LogSink)?;

    let query = match cli.command {
        Command::Summary => {
            let summary = summarize(&loaded);
            match output_mode {
                OutputMode::Json => JsonOutput::print_summary(&summary).into_diagnostic()?,
                OutputMode::Text => print_summary_text(&summary),
            }
            return Ok(());
        }
        Command::Node { id } => Query::NationalNode(id),
        Command::Descendants { id } => Query::Descendants(id),
        Command::Subgraph { id } => Query::Subgraph(id),
        Command::Countable { id, metric } => Query::Countable { id, metric },
    };
    let result = run_query(&loaded.directory, &query)?;
    JsonOutput::print_query(&result).into_diagnostic()?;
    Ok(())
}

fn resolve_config(args: &SourceArgs) -> miette::Result<ResolvedConfig> {
    let mut config = match ConfigLoader::resolve(args.config.as_deref()) {
        Ok(config) => config,
        Err(DirectoryError::MissingConfig) => ResolvedConfig::default(),
        Err(err) => return Err(err.into()),
    };
    if let Some(dir) = &args.catalog_dir {
        config.catalog_dir = Utf8PathBuf::from(dir);
    }
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(Utf8PathBuf::from(dir));
    }
    if args.no_cache {
        config.use_cache = false;
    }
    if args.purge_all_cache {
        config.purge = EntityKind::ALL.into_iter().collect();
    } else if !args.purge_cache.is_empty() {
        config.purge = args.purge_cache.iter().copied().collect::<BTreeSet<_>>();
    }
    Ok(config)
}
