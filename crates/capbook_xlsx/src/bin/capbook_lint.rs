use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use capbook_xlsx::lint_workbook;
use clap::Parser;
use tracing::info;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Check a generated capbook for formula hygiene.
///
/// Exits 1 when any violation is found and 2 when the workbook cannot be read.
#[derive(Parser)]
#[command(about = "Lint LET/LAMBDA bindings and spill references in a capbook workbook.")]
struct Args {
    /// Workbook to check.
    file_in: PathBuf,

    /// Print only the summary line.
    #[arg(long)]
    quiet: bool,
}

fn run(args: &Args) -> Result<bool> {
    let report = lint_workbook(&args.file_in)
        .with_context(|| format!("lint {}", args.file_in.display()))?;
    if !args.quiet {
        for violation in &report.violations {
            println!("{violation}");
        }
    }
    info!("{report}");
    Ok(report.is_clean())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Args::parse();
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}
