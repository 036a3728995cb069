//! HTTP middleware for Toolhub Core
//!
//! - `Authz` extractor and session token extraction
//! - Edge gate deciding redirects and rejections before any handler runs

pub mod auth;
pub mod edge_gate;

pub use auth::{extract_session_token, Authz};
pub use edge_gate::edge_gate_middleware;
