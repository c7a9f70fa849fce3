//! CLI tool for inspecting how Hive splits resolve to reader strategies.

mod error;
mod plan;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use hive_scan_core::formats::FormatRegistry;
use snafu::ResultExt;

use crate::error::{CliResult, RenderJsonSnafu};

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve the reader strategy of every split in a scan description
    Explain {
        /// JSON scan description (table, splits, columns, options)
        #[arg(long)]
        plan: PathBuf,

        /// Print the split plans as JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the registered input formats and their strategies
    Formats,
}

#[derive(Debug, Parser)]
#[command(name = "hivescan")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

fn cmd_explain(path: &std::path::Path, json: bool) -> CliResult<()> {
    let desc = plan::load(path)?;
    let plans = plan::explain(&desc)?;
    if json {
        let rendered = serde_json::to_string_pretty(&plans).context(RenderJsonSnafu)?;
        println!("{rendered}");
    } else {
        print!("{}", plan::render_text(&plans));
    }
    Ok(())
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Explain { plan, json } => cmd_explain(&plan, json),
        Command::Formats => {
            print!("{}", plan::render_formats(&FormatRegistry::hive_defaults()));
            Ok(())
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}
