use anyhow::{Context, Result};
use clap::Args;
use pschem_database::DatabaseConfig;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
#[command(about = "Print the design hierarchy rooted at a cell")]
pub struct HierarchyArgs {
    /// JSON library description to load.
    #[arg(value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub file: PathBuf,

    /// Name of the top cell.
    #[arg(long, short)]
    pub top: String,

    /// Library the description is imported into.
    #[arg(long, default_value = "work")]
    pub library: String,

    /// Only show this many levels below the top cell.
    #[arg(long)]
    pub depth: Option<usize>,
}

pub fn execute(args: HierarchyArgs, config: DatabaseConfig) -> Result<()> {
    let (mut db, _) = crate::open_database(&args.file, &args.library, config)?;

    let cell = db
        .cell_by_name(&args.library, &args.top)
        .with_context(|| format!("Cell {}/{} not found", args.library, args.top))?;
    let view = db.cell_implementation(cell).with_context(|| {
        format!(
            "Cell {}/{} has no {} view",
            args.library,
            args.top,
            db.config().implementation_view
        )
    })?;

    let design = db.add_design(view)?;
    let tree = db
        .render_hierarchy(design, args.depth)
        .with_context(|| format!("Failed to expand the hierarchy of {}", args.top))?;
    db.run_deferred_processes()?;

    println!("{tree}");
    Ok(())
}
