// tests/common/mod.rs
// Shared fixtures for black-box integration tests.

use std::collections::HashMap;

use forge_orchestrator::store::schema::{AgentMode, Blueprint, DevState, Phase, ProjectState};

pub fn sample_state(id: &str) -> ProjectState {
    ProjectState {
        id: id.to_string(),
        user_id: "u1".into(),
        session_id: "s1".into(),
        hostname: "localhost".into(),
        created_at: chrono::Utc::now(),
        query: "build a todo app".into(),
        images: vec![],
        blueprint: Blueprint {
            title: "Todo".into(),
            project_name: "todo-app".into(),
            description: "A todo app".into(),
            frameworks: vec!["react".into()],
            views: vec![],
            user_flow: String::new(),
            architecture: String::new(),
            pitfalls: vec![],
            implementation_roadmap: vec![],
            initial_phase: Phase {
                id: "p1".into(),
                name: "Setup".into(),
                description: "setup".into(),
                files: vec![],
                last_phase: false,
                completed: false,
            },
            color_palette: vec![],
        },
        project_name: "todo-app".into(),
        template_name: "react-vite-cf".into(),
        template_details: None,
        generated_phases: vec![],
        generated_files_map: HashMap::new(),
        commands_history: vec![],
        last_package_json: None,
        sandbox_instance_id: None,
        should_be_generating: false,
        mvp_generated: false,
        reviewing_initiated: false,
        agent_mode: AgentMode::Deterministic,
        phases_counter: 8,
        pending_user_inputs: vec![],
        current_dev_state: DevState::Idle,
        review_cycles: None,
        current_phase: None,
        conversation_messages: vec![],
        project_updates_accumulator: vec![],
        inference_context: Default::default(),
        last_deep_debug_transcript: None,
        schema_version: forge_orchestrator::migration::CURRENT_SCHEMA_VERSION,
        consecutive_rate_limits: 0,
    }
}
