//! Domain models for Toolhub Core

pub mod catalog;
pub mod module;
pub mod principal;
pub mod rbac;
pub mod system_settings;

pub use catalog::*;
pub use module::*;
pub use principal::*;
pub use rbac::*;
pub use system_settings::*;
