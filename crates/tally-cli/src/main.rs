use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{check::CheckArgs, init::InitArgs, serve::ServeArgs, tools::ToolsArgs};

#[derive(Parser, Debug)]
#[command(name = "tally", version, about = "MCP server for a mirror-cached todo list or wishlist")]
struct Cli {
    /// Log filter (e.g. `debug`, `tally_mcp=trace`). Overrides RUST_LOG.
    #[arg(long, global = true, env = "TALLY_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server on stdin/stdout.
    Serve(ServeArgs),

    /// Show the tools and prompts the server publishes.
    Tools(ToolsArgs),

    /// Validate the configuration and load the mirror once.
    Check(CheckArgs),

    /// Write a starter tally.yaml.
    Init(InitArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the protocol; logs go to stderr.
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Serve(args) => commands::serve::run(args).await,
        Command::Tools(args) => commands::tools::run(args),
        Command::Check(args) => commands::check::run(args).await,
        Command::Init(args) => commands::init::run(args),
    }
}
