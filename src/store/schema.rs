// src/store/schema.rs
// Persisted per-project document (spec 3 Data Model, 6 External Interfaces).
// One JSON document per project id, round-tripped through MigrationEngine on
// every load (spec 4.10).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `currentDevState` in spec 4.8 / 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DevState {
    Idle,
    PhaseGenerating,
    PhaseImplementing,
    Reviewing,
    Finalizing,
}

impl Default for DevState {
    fn default() -> Self {
        Self::Idle
    }
}

/// `agentMode` (spec 6, Open Question decision in SPEC_FULL: selects which
/// post-phase fixers run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    Deterministic,
    Smart,
}

impl Default for AgentMode {
    fn default() -> Self {
        Self::Deterministic
    }
}

/// `FileConcept` (spec 3): an entry in a phase's file manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConcept {
    pub path: String,
    pub purpose: String,
    /// `"delete"`, a free-text change note, or absent/null for "create fresh".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changes: Option<String>,
}

impl FileConcept {
    pub fn is_delete(&self) -> bool {
        self.changes.as_deref() == Some("delete")
    }
}

/// `Phase` (spec 3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub name: String,
    pub description: String,
    pub files: Vec<FileConcept>,
    #[serde(default)]
    pub last_phase: bool,
    #[serde(default)]
    pub completed: bool,
}

/// Generated `File` (spec 3). Uniqueness is by `path` within
/// `generated_files_map`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub contents: String,
    pub purpose: String,
    /// Unified diff between previous and current contents, or empty string
    /// for the first save of a path.
    #[serde(default)]
    pub last_diff: String,
    pub last_modified: DateTime<Utc>,
}

/// Blueprint plan (spec 3). Mutable only through the whitelisted patch set
/// honored by `Orchestrator::update_blueprint`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    pub title: String,
    pub project_name: String,
    pub description: String,
    pub frameworks: Vec<String>,
    pub views: Vec<String>,
    pub user_flow: String,
    pub architecture: String,
    pub pitfalls: Vec<String>,
    pub implementation_roadmap: Vec<String>,
    pub initial_phase: Phase,
    pub color_palette: Vec<String>,
}

/// Keys in `Blueprint` that `update_blueprint` is permitted to deep-merge
/// (spec 4.7). `project_name` is handled separately via `update_project_name`.
pub const BLUEPRINT_PATCHABLE_KEYS: &[&str] = &[
    "title",
    "description",
    "frameworks",
    "views",
    "user_flow",
    "architecture",
    "pitfalls",
    "implementation_roadmap",
    "color_palette",
];

/// Cached template metadata (spec 3 `templateDetails`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateDetails {
    pub all_files: HashMap<String, String>,
    pub important_files: Vec<String>,
    pub redacted_files: Vec<String>,
}

/// A validated, deduplicated shell command recorded into `commands_history`
/// (spec 4.8 command sub-algorithm, step 4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricCommand {
    pub command: String,
    pub executed_at: DateTime<Utc>,
}

/// `inferenceContext` (spec 3): model-provider hints threaded through to
/// Operations; treated as an opaque bag by the state machine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceContext {
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The full persisted document for one project (spec 3, 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectState {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub hostname: String,
    pub created_at: DateTime<Utc>,

    pub query: String,
    #[serde(default)]
    pub images: Vec<String>,

    pub blueprint: Blueprint,
    pub project_name: String,
    pub template_name: String,
    #[serde(default)]
    pub template_details: Option<TemplateDetails>,

    pub generated_phases: Vec<Phase>,
    pub generated_files_map: HashMap<String, GeneratedFile>,
    pub commands_history: Vec<HistoricCommand>,
    #[serde(default)]
    pub last_package_json: Option<String>,

    #[serde(default)]
    pub sandbox_instance_id: Option<String>,

    #[serde(default)]
    pub should_be_generating: bool,
    #[serde(default)]
    pub mvp_generated: bool,
    #[serde(default)]
    pub reviewing_initiated: bool,
    #[serde(default)]
    pub agent_mode: AgentMode,

    pub phases_counter: i64,
    #[serde(default)]
    pub pending_user_inputs: Vec<String>,
    #[serde(default)]
    pub current_dev_state: DevState,
    #[serde(default)]
    pub review_cycles: Option<u32>,
    #[serde(default)]
    pub current_phase: Option<String>,

    #[serde(default)]
    pub conversation_messages: Vec<serde_json::Value>,
    #[serde(default)]
    pub project_updates_accumulator: Vec<String>,

    #[serde(default)]
    pub inference_context: InferenceContext,
    #[serde(default)]
    pub last_deep_debug_transcript: Option<String>,

    /// Schema version, bumped by MigrationEngine (spec 4.10); absent on
    /// legacy documents, treated as 0.
    #[serde(default)]
    pub schema_version: u32,

    /// Consecutive rate-limit hits for this project (SPEC_FULL supplemented
    /// feature 5); widens the backoff hint attached to `rate_limit_error`.
    #[serde(default)]
    pub consecutive_rate_limits: u32,
}

impl ProjectState {
    pub fn phases_counter_at_least(&mut self, floor: i64) {
        if self.phases_counter < floor {
            self.phases_counter = floor;
        }
    }

    pub fn last_incomplete_phase(&self) -> Option<&Phase> {
        self.generated_phases.iter().find(|p| !p.completed)
    }

    pub fn last_incomplete_phase_mut(&mut self) -> Option<&mut Phase> {
        self.generated_phases.iter_mut().find(|p| !p.completed)
    }
}
