use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use pschem_database::{ConsolidationReport, DatabaseConfig, ViewKey};
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
#[command(about = "Split overlapping wires and fix solder dots in every implementation view")]
pub struct CheckArgs {
    /// JSON library description to load.
    #[arg(value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub file: PathBuf,

    /// Library the description is imported into.
    #[arg(long, default_value = "work")]
    pub library: String,

    /// Print the repaired library description to stdout
    #[arg(long)]
    pub json: bool,
}

pub fn execute(args: CheckArgs, config: DatabaseConfig) -> Result<()> {
    let (mut db, library) = crate::open_database(&args.file, &args.library, config)?;

    let lib = db
        .library(library)
        .with_context(|| format!("Library {} disappeared", args.library))?;
    // Only the configured implementation view of each cell is repaired.
    let kind = db.config().implementation_view;
    let mut views: Vec<(String, ViewKey)> = Vec::new();
    for (_, cell) in lib.cells() {
        if let Some(view) = db.cell_implementation(cell) {
            views.push((db.view_path(view)?, view));
        }
    }

    let mut total = ConsolidationReport::default();
    for (path, view) in &views {
        let mut report = db.check_net_segments(*view, None)?;
        report += db.check_solder_dots(*view, None)?;
        total += report;

        if report.is_unchanged() {
            eprintln!("{} {}", "✓".green(), path.green());
        } else {
            eprintln!("{} {}: {}", "!".yellow(), path.yellow().bold(), report);
        }
    }
    eprintln!(
        "Checked {} {kind} views: {} elements added, {} removed",
        views.len(),
        total.added,
        total.removed
    );

    if args.json {
        let description = db.export_library(library)?;
        println!("{}", serde_json::to_string_pretty(&description)?);
    }
    Ok(())
}
