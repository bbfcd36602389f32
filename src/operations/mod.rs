// src/operations/mod.rs
// The eight model-backed Operations invoked by the StateMachine (spec 4.6),
// plus the provider seam and shared request/response types they build on.

pub mod deep_debug;
pub mod deterministic_fixer;
pub mod fast_code_fixer;
pub mod implement_phase;
pub mod plan_blueprint;
pub mod plan_next_phase;
pub mod provider;
pub mod provider_client;
pub mod regenerate_file;
pub mod types;
pub mod user_converse;

pub use deep_debug::deep_debug;
pub use deterministic_fixer::deterministic_fixer;
pub use fast_code_fixer::fast_code_fixer;
pub use implement_phase::implement_phase;
pub use plan_blueprint::plan_blueprint;
pub use plan_next_phase::plan_next_phase;
pub use provider::ModelProvider;
pub use provider_client::InferenceClient;
pub use regenerate_file::regenerate_file;
pub use user_converse::user_converse;
