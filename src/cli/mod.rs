// src/cli/mod.rs
// REPL client for the orchestrator's WebSocket protocol (spec 4.9).

pub mod args;
pub mod repl;
pub mod ws_client;

pub use args::CliArgs;
pub use repl::Repl;
pub use ws_client::ForgeClient;
