// src/auth/mod.rs
// Bearer-token auth on the WebSocket upgrade (SPEC_FULL supplemented feature 1).
// No account/password model — the orchestrator is bound to a single project
// and treats a valid token only as a userId hint, falling back to an
// anonymous session.

pub mod jwt;

pub use jwt::{Claims, create_token, verify_token};
