// src/cli/repl.rs
// Interactive REPL loop (spec 4.9 client). Grounded on the teacher's
// `repl.rs` Repl: rustyline line editor, ctrlc-driven interrupt flag, a
// loop that sends one user line per turn and prints streamed server
// events until the next prompt.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::api::projects::CreateProjectResponse;
use crate::broadcaster::{ClientMessage, ServerMessage};
use crate::cli::args::CliArgs;
use crate::cli::ws_client::ForgeClient;

pub struct Repl {
    client: ForgeClient,
    editor: DefaultEditor,
    interrupted: Arc<AtomicBool>,
}

impl Repl {
    pub async fn new(args: CliArgs) -> Result<Self> {
        let project_id = match args.project_id {
            Some(id) => id,
            None => {
                let query = args
                    .query
                    .context("either --project-id or --query is required")?;
                create_project(&args.backend_url, &args.user_id, &query).await?
            }
        };

        let ws_url = to_ws_url(&args.backend_url, &project_id, args.token.as_deref());
        let client = ForgeClient::connect(&ws_url).await?;

        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = interrupted.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;

        Ok(Self { client, editor: DefaultEditor::new()?, interrupted })
    }

    pub async fn run(mut self) -> Result<()> {
        println!("connected. type a message, or /generate, /stop, /resume, /preview, /clear, /quit");
        loop {
            if self.interrupted.swap(false, Ordering::SeqCst) {
                self.client.send(&ClientMessage::StopGeneration).await?;
            }

            let line = match self.editor.readline("forge> ") {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(err.into()),
            };
            let _ = self.editor.add_history_entry(line.as_str());

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed == "/quit" {
                break;
            }

            let msg = match trimmed {
                "/generate" => ClientMessage::GenerateAll { review_cycles: None },
                "/stop" => ClientMessage::StopGeneration,
                "/resume" => ClientMessage::ResumeGeneration,
                "/preview" => ClientMessage::Preview,
                "/clear" => ClientMessage::ClearConversation,
                text => ClientMessage::UserSuggestion { text: text.to_string(), images: Vec::new() },
            };
            self.client.send(&msg).await?;
            self.drain_events().await;
        }

        Ok(())
    }

    async fn drain_events(&mut self) {
        while let Ok(Some(event)) =
            tokio::time::timeout(std::time::Duration::from_millis(200), self.client.events.recv()).await
        {
            print_event(&event);
        }
    }
}

fn print_event(event: &ServerMessage) {
    match event {
        ServerMessage::FileChunkGenerated { chunk, .. } => print!("{chunk}"),
        ServerMessage::ConversationResponse { response } => println!("\n{response}"),
        ServerMessage::Error { code, message } => eprintln!("\n[{code}] {message}"),
        other => println!("\n{}", serde_json::to_string(other).unwrap_or_default()),
    }
}

fn to_ws_url(backend_url: &str, project_id: &str, token: Option<&str>) -> String {
    let ws_origin = backend_url.replacen("http", "ws", 1);
    match token {
        Some(token) => format!("{ws_origin}/projects/{project_id}/ws?token={token}"),
        None => format!("{ws_origin}/projects/{project_id}/ws"),
    }
}

async fn create_project(backend_url: &str, user_id: &str, query: &str) -> Result<String> {
    let response = reqwest::Client::new()
        .post(format!("{backend_url}/projects"))
        .json(&serde_json::json!({ "user_id": user_id, "query": query }))
        .send()
        .await
        .context("failed to reach orchestrator")?
        .error_for_status()
        .context("project creation failed")?
        .json::<CreateProjectResponse>()
        .await?;
    println!("created project {} ({})", response.project_id, response.project_name);
    Ok(response.project_id)
}
