//! Command-line arguments of the `uast-transformer` binary.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "uast-transformer",
    version,
    about = "Normalizes native parser trees into role-annotated universal trees."
)]
pub struct TransformerArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Normalize a native tree read as JSON.
    Parse {
        /// Native tree file. Reads stdin when omitted or `-`.
        file: Option<PathBuf>,
        /// Driver configuration (YAML or JSON). Without it only generic stages run.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print a colored line diff between the native and the normalized tree.
        #[arg(long)]
        diff: bool,
        /// Print a parse response document instead of the bare tree.
        #[arg(long, conflicts_with = "diff")]
        response: bool,
    },
    /// Print version metadata.
    Version,
}
