mod api;
mod cli;
mod credentials;
mod error;
mod job;
mod output;
mod parser;
mod pattern;
mod plan;
mod results;
mod runner;

use anyhow::Result;
use clap::Parser;
use cli::{Args, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Parse command line arguments
    let args = Args::parse();

    match args.command {
        Command::Curl { tokens } => runner::run_curl(args.host, tokens).await?,
        Command::Init { user, api_key } => runner::run_init(args.host, user, api_key).await?,
    }

    Ok(())
}
