//! # reporag CLI
//!
//! Command-line interface for RepoRAG.
//!
//! Searches and queries a chunk index through `reporag-core`.
//! Run `reporag --help` for usage information.

mod cli;
pub mod ui;

use std::process::ExitCode;

fn main() -> ExitCode {
    cli::run()
}
