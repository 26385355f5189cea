//! `minigit` — a command-line front end over `minigit-core`.

use anyhow::Result;
use clap::Parser;

mod cli;
mod diff_engine;
mod history;
mod plumbing;
mod refs_cmd;
mod stage;
mod telemetry;

use cli::Cli;

fn main() -> std::process::ExitCode {
    telemetry::init();
    let cli = Cli::parse();
    match cli.run() {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("minigit: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}

/// Open the repository rooted at (or an ancestor of) the current directory.
fn open_repo() -> Result<minigit_core::Repository> {
    let cwd = std::env::current_dir()?;
    Ok(minigit_core::Repository::open(&cwd)?)
}
