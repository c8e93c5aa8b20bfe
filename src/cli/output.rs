//! User-facing output of the CLI.
//!
//! Trees are printed as pretty JSON. Colors are only used when stdout is a terminal.

use difference::{Changeset, Difference};
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::node::Node;
use crate::protocol::{ParseResponse, VersionResponse};

fn stdout() -> StandardStream {
    let choice = if atty::is(atty::Stream::Stdout) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    };
    StandardStream::stdout(choice)
}

pub fn print_tree(node: &Node) -> io::Result<()> {
    let mut out = stdout();
    writeln!(out, "{}", node.to_pretty_json())
}

/// Prints a line diff of the pretty JSON renderings of two trees.
pub fn print_diff(before: &Node, after: &Node) -> io::Result<()> {
    let mut out = stdout();
    let changeset = Changeset::new(&before.to_pretty_json(), &after.to_pretty_json(), "\n");
    for diff in &changeset.diffs {
        match diff {
            Difference::Same(x) => {
                out.reset()?;
                write_lines(&mut out, ' ', x)?;
            }
            Difference::Add(x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
                write_lines(&mut out, '+', x)?;
            }
            Difference::Rem(x) => {
                out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
                write_lines(&mut out, '-', x)?;
            }
        }
    }
    out.reset()
}

// a single diff chunk may span several lines; each one gets the marker
fn write_lines(out: &mut StandardStream, marker: char, chunk: &str) -> io::Result<()> {
    for line in chunk.lines() {
        writeln!(out, "{}{}", marker, line)?;
    }
    Ok(())
}

pub fn print_response(resp: &ParseResponse) -> io::Result<()> {
    let mut out = stdout();
    let text = serde_json::to_string_pretty(resp).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    writeln!(out, "{}", text)
}

pub fn print_version(resp: &VersionResponse) -> io::Result<()> {
    let mut out = stdout();
    out.set_color(ColorSpec::new().set_bold(true))?;
    write!(out, "{}", resp.build)?;
    out.reset()?;
    writeln!(out, " {}", resp.version)
}
