use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pschem_database::{Database, DatabaseConfig, Importer, LibraryKey};
use std::path::{Path, PathBuf};

mod check;
mod hierarchy;

#[derive(Parser)]
#[command(name = "pschem")]
#[command(about = "Inspect and repair PSchem schematic libraries", long_about = None)]
struct Cli {
    /// Database configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the design hierarchy rooted at a cell
    #[command(alias = "h")]
    Hierarchy(hierarchy::HierarchyArgs),

    /// Split overlapping wires and fix solder dots in every schematic
    #[command(alias = "c")]
    Check(check::CheckArgs),
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Hierarchy(args) => hierarchy::execute(args, config),
        Commands::Check(args) => check::execute(args, config),
    }
}

fn load_config(path: Option<&Path>) -> Result<DatabaseConfig> {
    match path {
        Some(path) => DatabaseConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(DatabaseConfig::default()),
    }
}

/// Create a database and import the library description at `file` into
/// `library`.
pub(crate) fn open_database(
    file: &Path,
    library: &str,
    config: DatabaseConfig,
) -> Result<(Database, LibraryKey)> {
    log::debug!("Opening {} as library {library}", file.display());
    let mut db = Database::with_config(config);
    let key = Importer::new(library)
        .import_path(&mut db, file)
        .with_context(|| format!("Failed to import {}", file.display()))?;
    Ok((db, key))
}
