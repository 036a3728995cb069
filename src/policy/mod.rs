//! Mutation guards for HTTP handlers.
//!
//! Every state-changing handler calls into this module before touching a
//! service. Guards answer 401 when there is no active principal and a
//! generic 403 when the principal lacks the capability.

use crate::domain::{PermissionKey, Principal};
use crate::error::{AppError, Result};
use crate::repository::{RbacRepository, SettingsRepository};
use crate::service::AuthzContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    /// Admin screens: modules, settings, roles, role assignment
    AdminConsole,
    UserRead,
    UserDeactivate,
    AuditRead,
}

/// Capability an action demands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Admin,
    /// Held directly, or implied by the Admin role
    Permission(PermissionKey),
}

impl PolicyAction {
    pub fn requirement(&self) -> Requirement {
        match self {
            PolicyAction::AdminConsole => Requirement::Admin,
            PolicyAction::UserRead => Requirement::Permission(PermissionKey::UsersView),
            PolicyAction::UserDeactivate => Requirement::Permission(PermissionKey::UsersDelete),
            PolicyAction::AuditRead => Requirement::Permission(PermissionKey::AuditView),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            PolicyAction::AdminConsole => "admin_console",
            PolicyAction::UserRead => "user_read",
            PolicyAction::UserDeactivate => "user_deactivate",
            PolicyAction::AuditRead => "audit_read",
        }
    }
}

fn deny(principal: &Principal, action: &str, requirement: Requirement) -> AppError {
    let required = match requirement {
        Requirement::Admin => "role:Admin",
        Requirement::Permission(key) => key.as_str(),
    };
    tracing::warn!(
        event = "permission_denied",
        principal_id = %principal.id,
        action,
        required,
        "Permission denied"
    );
    metrics::counter!("toolhub_permission_denied_total", "action" => action.to_string())
        .increment(1);
    AppError::Forbidden(format!("{} requires {}", action, required))
}

/// The active principal behind the request, or 401
pub fn require_authenticated<R, S>(ctx: &AuthzContext<R, S>) -> Result<&Principal>
where
    R: RbacRepository,
    S: SettingsRepository,
{
    ctx.active_principal()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
}

async fn check<'a, R, S>(
    ctx: &'a AuthzContext<R, S>,
    action: &str,
    requirement: Requirement,
) -> Result<&'a Principal>
where
    R: RbacRepository,
    S: SettingsRepository,
{
    let principal = require_authenticated(ctx)?;
    let allowed = match requirement {
        Requirement::Admin => ctx.is_admin().await?,
        Requirement::Permission(key) => ctx.is_admin().await? || ctx.has_permission(key).await?,
    };

    if allowed {
        Ok(principal)
    } else {
        Err(deny(principal, action, requirement))
    }
}

pub async fn require_admin<R, S>(ctx: &AuthzContext<R, S>) -> Result<&Principal>
where
    R: RbacRepository,
    S: SettingsRepository,
{
    check(ctx, "admin", Requirement::Admin).await
}

/// Admins pass every permission check
pub async fn require_permission<R, S>(
    ctx: &AuthzContext<R, S>,
    key: PermissionKey,
) -> Result<&Principal>
where
    R: RbacRepository,
    S: SettingsRepository,
{
    check(ctx, key.as_str(), Requirement::Permission(key)).await
}

pub async fn enforce<R, S>(ctx: &AuthzContext<R, S>, action: PolicyAction) -> Result<&Principal>
where
    R: RbacRepository,
    S: SettingsRepository,
{
    check(ctx, action.as_str(), action.requirement()).await
}

/// Module surfaces answer 404 for invisible modules so their existence
/// does not leak. A module whose required permission is missing from the
/// catalog is a configuration error and answers as forbidden.
pub async fn require_module<R, S>(ctx: &AuthzContext<R, S>, module_key: &str) -> Result<()>
where
    R: RbacRepository,
    S: SettingsRepository,
{
    require_authenticated(ctx)?;
    if ctx.is_module_visible(module_key).await? {
        return Ok(());
    }

    if let Some(Err(e)) = ctx.module(module_key).map(|m| m.required_key()) {
        return Err(AppError::ConfigurationInvalid(format!(
            "module '{}': {}",
            module_key, e
        )));
    }
    Err(AppError::NotFound(format!("Module '{}' not found", module_key)))
}
