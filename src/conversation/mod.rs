// src/conversation/mod.rs
// ConversationLog (spec 4.2): two ordered, deduplicated-by-conversationId
// message lists persisted in their own tables, keyed by session id.
// Grounded on the teacher's small-embedded-store pattern (sqlx row per key,
// JSON-serialized array column) used throughout `checkpoint/mod.rs` and
// `budget/mod.rs`.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::OrchestratorResult;

const INTERNAL_MEMO_SENTINEL: &str = "<Internal Memo>";

/// A conversation turn (spec 3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub conversation_id: String,
    pub content: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    fn text(&self) -> &str {
        self.content.as_str().unwrap_or_default()
    }

    fn is_internal_memo(&self) -> bool {
        self.text().contains(INTERNAL_MEMO_SENTINEL)
    }
}

/// Two-tier chat history for one session id.
pub struct ConversationLog {
    session_id: String,
    pool: SqlitePool,
}

impl ConversationLog {
    pub fn new(pool: SqlitePool, session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            pool,
        }
    }

    pub fn default_session(pool: SqlitePool) -> Self {
        Self::new(pool, "default")
    }

    /// Upserts `msg` by `conversationId` into both the full and compact
    /// lists, then writes both arrays back.
    pub async fn append(&self, msg: Message) -> OrchestratorResult<()> {
        let mut full = self.read_table("full_conversations").await?;
        let mut compact = self.read_table("compact_conversations").await?;

        upsert_by_conversation_id(&mut full, msg.clone());
        upsert_by_conversation_id(&mut compact, msg);

        self.write_table("full_conversations", &full).await?;
        self.write_table("compact_conversations", &compact).await?;
        debug!(session_id = %self.session_id, full = full.len(), compact = compact.len(), "conversation appended");
        Ok(())
    }

    /// Returns `(full, compact)`, both deduplicated. If `compact` is empty
    /// but `full` is not (migration path), falls back to `full` for the
    /// compact side too.
    pub async fn get(&self) -> OrchestratorResult<(Vec<Message>, Vec<Message>)> {
        let full = self.read_table("full_conversations").await?;
        let mut compact = self.read_table("compact_conversations").await?;
        if compact.is_empty() && !full.is_empty() {
            compact = full.clone();
        }
        Ok((full, compact))
    }

    /// UI-facing view: hides messages containing the internal-memo sentinel
    /// while still retaining them for model context via `get()`.
    pub async fn get_for_ui(&self) -> OrchestratorResult<Vec<Message>> {
        let (full, _) = self.get().await?;
        Ok(full.into_iter().filter(|m| !m.is_internal_memo()).collect())
    }

    /// Empties the compacted working set only (spec 4.7 `clearConversation`);
    /// the persisted full history is untouched.
    pub async fn clear_running(&self) -> OrchestratorResult<()> {
        self.write_table("compact_conversations", &[]).await
    }

    async fn read_table(&self, table: &str) -> OrchestratorResult<Vec<Message>> {
        let row = match table {
            "full_conversations" => {
                sqlx::query!(
                    "SELECT messages FROM full_conversations WHERE id = ?",
                    self.session_id
                )
                .fetch_optional(&self.pool)
                .await?
                .map(|r| r.messages)
            }
            _ => {
                sqlx::query!(
                    "SELECT messages FROM compact_conversations WHERE id = ?",
                    self.session_id
                )
                .fetch_optional(&self.pool)
                .await?
                .map(|r| r.messages)
            }
        };
        match row {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write_table(&self, table: &str, messages: &[Message]) -> OrchestratorResult<()> {
        let json = serde_json::to_string(messages)?;
        match table {
            "full_conversations" => {
                sqlx::query!(
                    "INSERT INTO full_conversations (id, messages) VALUES (?, ?)
                     ON CONFLICT(id) DO UPDATE SET messages = excluded.messages",
                    self.session_id,
                    json
                )
                .execute(&self.pool)
                .await?;
            }
            _ => {
                sqlx::query!(
                    "INSERT INTO compact_conversations (id, messages) VALUES (?, ?)
                     ON CONFLICT(id) DO UPDATE SET messages = excluded.messages",
                    self.session_id,
                    json
                )
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }
}

fn upsert_by_conversation_id(list: &mut Vec<Message>, msg: Message) {
    if let Some(existing) = list.iter_mut().find(|m| m.conversation_id == msg.conversation_id) {
        *existing = msg;
    } else {
        list.push(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: &str, text: &str) -> Message {
        Message {
            role: Role::User,
            conversation_id: id.to_string(),
            content: serde_json::Value::String(text.to_string()),
            tool_calls: None,
            name: None,
        }
    }

    #[tokio::test]
    async fn append_dedups_by_conversation_id_last_write_wins() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let log = ConversationLog::default_session(pool);

        log.append(msg("1", "first")).await.unwrap();
        log.append(msg("1", "second")).await.unwrap();
        log.append(msg("2", "other")).await.unwrap();

        let (full, compact) = log.get().await.unwrap();
        assert_eq!(full.len(), 2);
        assert_eq!(compact.len(), 2);
        let m1 = full.iter().find(|m| m.conversation_id == "1").unwrap();
        assert_eq!(m1.text(), "second");
    }

    #[tokio::test]
    async fn ui_view_hides_internal_memo() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        let log = ConversationLog::default_session(pool);

        log.append(msg("1", "visible")).await.unwrap();
        log.append(msg("2", "<Internal Memo> hidden")).await.unwrap();

        let ui = log.get_for_ui().await.unwrap();
        assert_eq!(ui.len(), 1);
        assert_eq!(ui[0].conversation_id, "1");
    }
}
