// src/router/mod.rs
// MessageRouter (spec 4.9): dispatches a client's `ClientMessage` onto the
// matching `Orchestrator` method. Grounded on the dispatch shape of
// `api/ws/chat/message_router.rs` (one `match` arm per client message kind,
// delegating to a narrow per-kind handler) generalized to this
// orchestrator's own message set.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::broadcaster::{ClientMessage, ServerMessage};
use crate::orchestrator::Orchestrator;

pub struct MessageRouter {
    orchestrator: Arc<Orchestrator>,
}

impl MessageRouter {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    pub async fn route(&self, msg: ClientMessage) {
        match msg {
            ClientMessage::Preview => {
                self.orchestrator.broadcast_preview().await;
            }
            ClientMessage::GenerateAll { review_cycles } => {
                if let Err(err) = self.orchestrator.generate_all_files(review_cycles.unwrap_or(5)).await {
                    warn!(%err, "generateAllFiles failed");
                    self.orchestrator
                        .broadcast(ServerMessage::Error {
                            code: err.tag().to_string(),
                            message: err.to_string(),
                        })
                        .await;
                }
            }
            ClientMessage::StopGeneration => {
                self.orchestrator.stop_generation().await;
            }
            ClientMessage::ResumeGeneration => {
                if let Err(err) = self.orchestrator.resume_generation().await {
                    warn!(%err, "resumeGeneration failed");
                }
            }
            ClientMessage::ClearConversation => {
                if let Err(err) = self.orchestrator.clear_conversation().await {
                    warn!(%err, "clearConversation failed");
                }
            }
            ClientMessage::UserSuggestion { text, images } => {
                if let Err(err) = self.orchestrator.queue_user_request(text, images).await {
                    warn!(%err, "queueUserRequest failed");
                }
            }
            ClientMessage::GetModelConfigs => {
                self.orchestrator.broadcast_model_configs().await;
            }
            ClientMessage::TerminalCommand { command } => {
                debug!(%command, "routing terminal command");
                if let Err(err) = self.orchestrator.exec_commands(vec![command], true, None).await {
                    warn!(%err, "terminal command failed");
                }
            }
        }
    }
}
