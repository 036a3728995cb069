//! Data access layer (Repository pattern)

pub mod audit;
pub mod principal;
pub mod rbac;
pub mod system_settings;

pub use audit::AuditRepository;
pub use principal::PrincipalRepository;
pub use rbac::RbacRepository;
pub use system_settings::SettingsRepository;
