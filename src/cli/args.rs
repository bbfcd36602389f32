// src/cli/args.rs
// CLI argument definitions for the REPL client (spec 4.7/4.9 consumer).

use clap::Parser;

/// Orchestrator WebSocket REPL client.
#[derive(Parser, Debug)]
#[command(name = "forge-cli")]
#[command(version)]
#[command(about = "Interactive client for the orchestrator's WebSocket protocol", long_about = None)]
pub struct CliArgs {
    /// Project id to attach to. If omitted, a new project is created from `query`.
    #[arg(long)]
    pub project_id: Option<String>,

    /// Initial query used to create a new project when `--project-id` is not given.
    #[arg(long)]
    pub query: Option<String>,

    /// Orchestrator HTTP/WebSocket origin.
    #[arg(long, env = "FORGE_URL", default_value = "http://localhost:8080")]
    pub backend_url: String,

    /// Bearer token for WebSocket auth.
    #[arg(long, env = "FORGE_TOKEN")]
    pub token: Option<String>,

    /// User id to create the project under, when creating a new project.
    #[arg(long, default_value = "cli-user")]
    pub user_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_args() {
        let args = CliArgs::parse_from(["forge-cli", "--project-id", "abc"]);
        assert_eq!(args.project_id.as_deref(), Some("abc"));
        assert_eq!(args.backend_url, "http://localhost:8080");
    }
}
