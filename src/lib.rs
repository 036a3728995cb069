//! Toolhub Core - authorization engine for the Toolhub dashboard
//!
//! Resolves principals from identity-provider sessions, answers role,
//! permission and module-visibility questions, and serves the admin API
//! that manages roles, bindings, module toggles and global settings.

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod migration;
pub mod policy;
pub mod repository;
pub mod server;
pub mod service;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, Result};
