// src/state_machine/commands.rs
// The deterministic command-execution sub-algorithm (spec 4.8):
// normalize -> chunk -> execute with retry -> record history -> sync
// package.json.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::OrchestratorResult;
use crate::files::FileManager;
use crate::operations::provider::{parse_json_reply, CompletionRequest, ModelProvider};
use crate::sandbox::SandboxClient;
use crate::store::schema::HistoricCommand;
use crate::store::Store;

const BATCH_SIZE: usize = 5;
const MAX_RETRIES: usize = 3;

const ALTERNATIVE_COMMAND_SYSTEM_PROMPT: &str = "A batch of shell setup commands failed in a \
sandboxed web-application project. Propose a replacement command for each failed command that is \
more likely to succeed (e.g. a different package name, a `--force`/`--legacy-peer-deps` flag, or \
an equivalent `bun` invocation). Reply with JSON: {\"commands\": [...]} in the same order as the \
failed commands given, one replacement per input.";

#[derive(Debug, Deserialize)]
struct AlternativeCommandsReply {
    commands: Vec<String>,
}

/// Asks the model for a replacement per failed command instead of blindly
/// resubmitting the same batch (spec 4.8 step 3 retry sub-algorithm). Falls
/// back to the original commands if the provider errors or returns a
/// mismatched count.
async fn suggest_alternative_commands(provider: &dyn ModelProvider, failed: &[String]) -> Vec<String> {
    let content = format!("Failed commands:\n{}", failed.join("\n"));
    let response = match provider
        .complete(CompletionRequest {
            system: ALTERNATIVE_COMMAND_SYSTEM_PROMPT.to_string(),
            messages: vec![("user".to_string(), content)],
            expects_json: true,
        })
        .await
    {
        Ok(resp) => resp,
        Err(err) => {
            warn!(%err, "alternative-command consultation failed; retrying unchanged");
            return failed.to_vec();
        }
    };

    let parsed = parse_json_reply(&response.text)
        .ok()
        .and_then(|value| serde_json::from_value::<AlternativeCommandsReply>(value).ok());

    match parsed {
        Some(reply) if reply.commands.len() == failed.len() => reply.commands,
        _ => {
            warn!("alternative-command reply malformed or mismatched; retrying unchanged");
            failed.to_vec()
        }
    }
}

pub struct CommandOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    pub package_json_changed: bool,
}

/// Strips common bullet prefixes (`-`, `*`, `1.`) and rewrites `npm` to
/// `bun` (spec 4.8 step 1).
fn normalize(cmd: &str) -> String {
    let trimmed = cmd.trim();
    let without_bullet = trimmed
        .trim_start_matches(|c: char| c == '-' || c == '*')
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches('.')
        .trim();
    without_bullet.replacen("npm ", "bun ", 1)
}

fn looks_like_command(cmd: &str) -> bool {
    !cmd.is_empty() && !cmd.starts_with('#') && cmd.split_whitespace().count() >= 1
}

fn is_install_command(cmd: &str) -> bool {
    cmd.contains("bun ") && (cmd.contains("install") || cmd.contains("add "))
}

fn touches_package_json(cmd: &str) -> bool {
    cmd.contains("install") || cmd.contains("add ") || cmd.contains("remove") || cmd.contains("uninstall")
}

/// Runs the full sub-algorithm against `commands`, recording survivors into
/// `commandsHistory` and syncing `package.json` if any batch touched
/// dependencies.
pub async fn execute_commands(
    sandbox: &SandboxClient,
    store: &Arc<Store>,
    files: &FileManager,
    provider: &dyn ModelProvider,
    session_id: &str,
    commands: Vec<String>,
) -> OrchestratorResult<CommandOutcome> {
    let mut seen = std::collections::HashSet::new();
    let normalized: Vec<String> = commands
        .iter()
        .map(|c| normalize(c))
        .filter(|c| looks_like_command(c))
        .filter(|c| seen.insert(c.clone()))
        .collect();

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    let mut touched_package_json = false;

    for batch in normalized.chunks(BATCH_SIZE) {
        let mut batch_commands = batch.to_vec();
        let mut attempt = 0;
        loop {
            let started = std::time::Instant::now();
            let result = sandbox
                .execute_commands(session_id, &batch_commands, None)
                .await?;
            let elapsed = started.elapsed().as_secs_f64();

            let mut batch_failed = Vec::new();
            for cmd_result in &result.results {
                crate::metrics::record_command_execution(cmd_result.success, elapsed);
                if cmd_result.success {
                    succeeded.push(cmd_result.command.clone());
                    if touches_package_json(&cmd_result.command) {
                        touched_package_json = true;
                    }
                } else {
                    batch_failed.push(cmd_result.command.clone());
                }
            }

            if batch_failed.is_empty() {
                break;
            }

            let any_install_failed = batch_failed.iter().any(|c| is_install_command(c));
            if attempt < MAX_RETRIES && any_install_failed {
                warn!(attempt, ?batch_failed, "retrying failed install batch");
                attempt += 1;
                batch_commands = suggest_alternative_commands(provider, &batch_failed).await;
                continue;
            }

            debug!(?batch_failed, "dropping failed batch after exhausting retries");
            failed.extend(batch_failed);
            break;
        }
    }

    if !succeeded.is_empty() {
        let now = chrono::Utc::now();
        store
            .mutate(|s| {
                let mut seen_cmds: std::collections::HashSet<String> =
                    s.commands_history.iter().map(|h| h.command.clone()).collect();
                for cmd in &succeeded {
                    if seen_cmds.insert(cmd.clone()) {
                        s.commands_history.push(HistoricCommand {
                            command: cmd.clone(),
                            executed_at: now,
                        });
                    }
                }
            })
            .await?;

        let history = store.get().await.commands_history.clone();
        let bootstrap = render_bootstrap_script(&history);
        files
            .save_generated_files(vec![(".bootstrap.js".to_string(), bootstrap, "setup".to_string())], None)
            .await?;
    }

    if touched_package_json {
        if let Ok(files) = sandbox.get_files(session_id, &["package.json".to_string()]).await {
            if let Some(pkg) = files.files.first() {
                store
                    .mutate(|s| s.last_package_json = Some(pkg.contents.clone()))
                    .await?;
            }
        }
    }

    Ok(CommandOutcome {
        succeeded,
        failed,
        package_json_changed: touched_package_json,
    })
}

/// Rewrites `.bootstrap.js` from the validated, deduped command history
/// (spec 4.8 step 4) so a cold-start clone can replay setup without the
/// generation pipeline.
fn render_bootstrap_script(history: &[HistoricCommand]) -> String {
    let commands = history
        .iter()
        .map(|h| format!("  {:?},", h.command))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "#!/usr/bin/env node\n\
         // Regenerated from commandsHistory; replays setup for a cold-start clone.\n\
         const {{ execSync }} = require('child_process');\n\n\
         const commands = [\n{commands}\n];\n\n\
         for (const cmd of commands) {{\n\
         \x20 console.log(`$ ${{cmd}}`);\n\
         \x20 execSync(cmd, {{ stdio: 'inherit' }});\n\
         }}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_bullets_and_rewrites_npm() {
        assert_eq!(normalize("- npm install zod"), "bun install zod");
        assert_eq!(normalize("1. npm run build"), "bun run build");
    }

    #[test]
    fn looks_like_command_rejects_comments_and_blank() {
        assert!(!looks_like_command(""));
        assert!(!looks_like_command("# just a comment"));
        assert!(looks_like_command("bun install"));
    }

    #[test]
    fn is_install_command_detects_bun_install() {
        assert!(is_install_command("bun install zod"));
        assert!(!is_install_command("bun run dev"));
    }

    #[test]
    fn render_bootstrap_script_embeds_each_command_once() {
        let history = vec![
            HistoricCommand { command: "bun install".to_string(), executed_at: chrono::Utc::now() },
            HistoricCommand { command: "bun run build".to_string(), executed_at: chrono::Utc::now() },
        ];
        let script = render_bootstrap_script(&history);
        assert!(script.contains("\"bun install\""));
        assert!(script.contains("\"bun run build\""));
        assert!(script.starts_with("#!/usr/bin/env node"));
    }
}
