// src/operations/plan_next_phase.rs
// PlanNextPhase (spec 4.6): proposes the next Phase given known issues and
// user-suggested direction, or signals completion by returning `None`.

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::OrchestratorResult;
use crate::store::schema::FileConcept;

use super::provider::{parse_json_reply, CompletionRequest, ModelProvider};
use super::types::{OperationContext, PhaseConcept, UserContext};

#[derive(Debug, Deserialize)]
struct NextPhaseReply {
    done: bool,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    files: Vec<FileConcept>,
    #[serde(default)]
    install_commands: Vec<String>,
    #[serde(default)]
    files_to_delete: Vec<String>,
    #[serde(default)]
    last_phase: bool,
}

const SYSTEM_PROMPT: &str = "You are planning the next implementation phase of an \
in-progress web application. Given the completed phases, known issues, and any \
user-suggested direction, decide whether another phase is needed. Reply with JSON: \
{\"done\": bool, \"name\", \"description\", \"files\": [{\"path\",\"purpose\",\"changes\"}], \
\"install_commands\": [...], \"files_to_delete\": [...], \"last_phase\": bool}. \
If no further phase is needed, reply {\"done\": true}.";

pub async fn plan_next_phase(
    provider: &dyn ModelProvider,
    ctx: &OperationContext,
    issues: &[String],
    user_context: &UserContext,
    is_user_suggested: bool,
) -> OrchestratorResult<Option<PhaseConcept>> {
    info!(phase_count = ctx.state.generated_phases.len(), "planning next phase");

    let mut content = format!(
        "Completed phases: {}\nIssues:\n{}\n",
        ctx.state
            .generated_phases
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        issues.join("\n")
    );
    if is_user_suggested && !user_context.suggestions.is_empty() {
        content.push_str("\nUser-suggested direction:\n");
        content.push_str(&user_context.suggestions.join("\n"));
    }

    let response = provider
        .complete(CompletionRequest {
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![("user".to_string(), content)],
            expects_json: true,
        })
        .await?;

    let value = parse_json_reply(&response.text)?;
    let reply: NextPhaseReply = serde_json::from_value(value)
        .map_err(|e| crate::error::OrchestratorError::Transient(format!("malformed phase reply: {e}")))?;

    if reply.done {
        debug!("planner signaled no further phase");
        return Ok(None);
    }

    let next_id = format!("phase-{}", ctx.state.generated_phases.len() + 1);
    Ok(Some(PhaseConcept {
        phase: crate::store::schema::Phase {
            id: next_id,
            name: reply.name,
            description: reply.description,
            files: reply.files,
            last_phase: reply.last_phase,
            completed: false,
        },
        install_commands: reply.install_commands,
        files_to_delete: reply.files_to_delete,
    }))
}
