//! Entry point: parse the CLI surface from §6, dispatch to a command
//! handler, and print the stable JSON outcome shape to stdout.
//!
//! Exit codes: `0` success, `1` any classified error, `2` is clap's own
//! parse-error default and is never produced by this code directly.

mod args;
mod commands;
mod context;
mod output;
mod runtime;

use clap::Parser;

fn main() {
    let cli = args::Cli::parse();
    let outcome = commands::dispatch(cli);
    std::process::exit(outcome.emit());
}
