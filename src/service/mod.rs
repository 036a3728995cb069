//! Business logic layer

pub mod authz;
pub mod module;
pub mod principal;
pub mod rbac;
pub mod system_settings;

pub use authz::{AuthzContext, AuthzService, AuthzSnapshot, PrincipalState};
pub use module::{ModuleService, ModuleStatus};
pub use principal::PrincipalService;
pub use rbac::{PermissionGroup, RbacService};
pub use system_settings::{FlagChange, SettingsService};
