//! The `uast-transformer` command-line interface.
//!
//! Reads a native tree as JSON, runs a driver over it and prints the result. Failures are
//! rendered as `miette` reports and exit with status 1.

use clap::Parser;
use std::io::Read;
use std::path::Path;
use std::{fs, process};
use tracing::debug;

use crate::cli::args::{Command, TransformerArgs};
use crate::driver::Driver;
use crate::errors::{Result, TransformError};
use crate::node::Node;
use crate::protocol::{self, ParseRequest, VersionRequest};

pub mod args;
pub mod output;

/// The main entry point for the CLI.
pub fn run() {
    let args = TransformerArgs::parse();
    init_logging();

    let result = match args.command {
        Command::Parse {
            file,
            config,
            diff,
            response,
        } => handle_parse(file.as_deref(), config.as_deref(), diff, response),
        Command::Version => output::print_version(&protocol::version(&VersionRequest::default()))
            .map_err(TransformError::from),
    };

    if let Err(e) = result {
        eprintln!("{:?}", miette::Report::new(e));
        process::exit(1);
    }
}

// RUST_LOG controls the level; warnings only by default
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_parse(file: Option<&Path>, config: Option<&Path>, diff: bool, response: bool) -> Result<()> {
    let driver = match config {
        Some(path) => Driver::load(path)?,
        None => Driver::passthrough(),
    };
    let (text, filename) = read_input(file)?;
    let native: Node = serde_json::from_str(&text)?;
    debug!(driver = driver.name(), input = %filename, "parsing");

    if response {
        let resp = protocol::parse(
            &driver,
            &ParseRequest {
                native,
                content: None,
                filename: Some(filename),
            },
        );
        output::print_response(&resp)?;
        if resp.status == protocol::Status::Error {
            process::exit(1);
        }
        return Ok(());
    }

    let uast = driver.transform(&native)?;
    if diff {
        output::print_diff(&native, &uast)?;
    } else {
        output::print_tree(&uast)?;
    }
    Ok(())
}

fn read_input(file: Option<&Path>) -> Result<(String, String)> {
    match file {
        Some(path) if path != Path::new("-") => {
            let text = fs::read_to_string(path)?;
            Ok((text, path.display().to_string()))
        }
        _ => {
            if atty::is(atty::Stream::Stdin) {
                return Err(TransformError::config(
                    "no input: pass a native tree file or pipe one on stdin",
                ));
            }
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok((text, "<stdin>".to_string()))
        }
    }
}
