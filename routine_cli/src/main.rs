use clap::{Parser, Subcommand, ValueEnum};
use routine_core::*;
use serde::Serialize;
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "routine")]
#[command(about = "Compose timed exercise and stretch routines", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override catalog directory
    #[arg(long, global = true)]
    catalog_dir: Option<PathBuf>,

    /// Override cache directory
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Always read the catalog directory, bypassing the cache
    #[arg(long, global = true)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a full workout from a request file
    Workout(ComposeArgs),

    /// Compose a stretch-only routine from a request file
    Stretch(ComposeArgs),

    /// Catalog maintenance
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(clap::Args)]
struct ComposeArgs {
    /// JSON request file
    #[arg(long)]
    request: PathBuf,

    /// Image resolution (low, mid, high, original)
    #[arg(long)]
    resolution: Option<String>,

    #[arg(long, value_enum, default_value_t = Format::Json)]
    format: Format,

    /// Write to a file instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Csv,
}

#[derive(Subcommand)]
enum CatalogAction {
    /// Write the built-in sample catalog to a directory
    Init { dir: PathBuf },

    /// Load the configured catalog and report every problem
    Validate,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Remove cached catalog collections
    Clear,
}

fn main() -> ExitCode {
    // Logs go to stderr; keep them quiet unless RUST_LOG asks otherwise
    routine_core::logging::init_with_level("warn");

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}

fn report(error: &Error) -> ExitCode {
    let (kind, code) = if error.is_bad_request() {
        ("bad_request", 2)
    } else {
        ("server_error", 1)
    };
    let body = serde_json::json!({ "kind": kind, "message": error.to_string() });
    eprintln!("{}", body);
    ExitCode::from(code)
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    match &cli.command {
        Commands::Workout(args) => cmd_workout(&open_store(&cli, &config), &config, args),
        Commands::Stretch(args) => cmd_stretch(&open_store(&cli, &config), &config, args),
        Commands::Catalog {
            action: CatalogAction::Init { dir },
        } => cmd_catalog_init(dir),
        Commands::Catalog {
            action: CatalogAction::Validate,
        } => cmd_catalog_validate(&open_store(&cli, &config)),
        Commands::Cache {
            action: CacheAction::Clear,
        } => cmd_cache_clear(&open_store(&cli, &config)),
    }
}

fn open_store(cli: &Cli, config: &Config) -> CatalogStore {
    let catalog_dir = cli
        .catalog_dir
        .clone()
        .unwrap_or_else(|| config.data.catalog_dir.clone());
    let cache_dir = if cli.no_cache {
        None
    } else {
        Some(cli.cache_dir.clone().unwrap_or_else(|| config.data.cache_dir.clone()))
    };
    tracing::debug!("Catalog at {:?}, cache at {:?}", catalog_dir, cache_dir);
    CatalogStore::open(&catalog_dir, cache_dir.as_deref())
}

fn read_request(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        Error::InvalidRequest(format!("cannot read request {}: {}", path.display(), e))
    })
}

/// Flag beats request beats config
fn pick_resolution(flag: Option<&str>, requested: Option<Resolution>, config: &Config) -> Resolution {
    flag.map(Resolution::parse_or_default)
        .or(requested)
        .unwrap_or(config.output.resolution)
}

fn cmd_workout(store: &CatalogStore, config: &Config, args: &ComposeArgs) -> Result<()> {
    let route: WorkoutRoute = serde_json::from_str(&read_request(&args.request)?)?;
    route.validate()?;

    let resolution = pick_resolution(args.resolution.as_deref(), route.resolution, config);
    let catalog = store.fetch_for_workout(&route)?;
    let workout = compose_workout(&catalog, &route, resolution, config)?;

    emit(&workout, args)
}

fn cmd_stretch(store: &CatalogStore, config: &Config, args: &ComposeArgs) -> Result<()> {
    let route: StretchWorkoutRoute = serde_json::from_str(&read_request(&args.request)?)?;
    route.validate()?;

    let resolution = pick_resolution(args.resolution.as_deref(), route.resolution, config);
    let catalog = store.fetch_for_stretch(&route)?;
    let workout = compose_stretch_workout(&catalog, &route, resolution, config)?;

    emit(&workout, args)
}

fn emit<R: Routine + Serialize>(routine: &R, args: &ComposeArgs) -> Result<()> {
    let mut writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };

    match args.format {
        Format::Json => {
            serde_json::to_writer_pretty(&mut writer, routine)?;
            writeln!(writer)?;
        }
        Format::Csv => {
            write_timeline_csv(routine, &mut writer)?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn cmd_catalog_init(dir: &Path) -> Result<()> {
    let catalog = build_sample_catalog();
    catalog.write_to_dir(dir)?;

    println!("✓ Wrote sample catalog to {}", dir.display());
    println!(
        "  {} exercises, {} dynamic / {} static stretches, {} image sets",
        catalog.exercises.len(),
        catalog.dynamics.len(),
        catalog.statics.len(),
        catalog.image_sets.len()
    );
    Ok(())
}

fn cmd_catalog_validate(store: &CatalogStore) -> Result<()> {
    let catalog = store.fetch_all()?;
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in &errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation(format!(
            "{} catalog problem(s)",
            errors.len()
        )));
    }

    println!(
        "✓ Catalog OK: {} exercises, {} dynamic / {} static stretches",
        catalog.exercises.len(),
        catalog.dynamics.len(),
        catalog.statics.len()
    );
    Ok(())
}

fn cmd_cache_clear(store: &CatalogStore) -> Result<()> {
    let removed = store.clear_cache()?;
    println!("✓ Cleared {} cached collection(s)", removed);
    Ok(())
}
