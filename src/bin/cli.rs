// src/bin/cli.rs
// Thin REPL client entrypoint for the orchestrator's WebSocket protocol.

use clap::Parser;
use forge_orchestrator::cli::{CliArgs, Repl};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = CliArgs::parse();
    let repl = Repl::new(args).await?;
    repl.run().await
}
