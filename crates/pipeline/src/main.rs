use anyhow::Result;
use clap::Parser;
use tuneforge_pipeline::cli::{run_cli, Cli};

fn main() -> Result<()> {
    run_cli(Cli::parse())
}
