//! Principal directory: registration, login checks and administration

use crate::domain::{
    NewPrincipal, Principal, RegisterInput, SessionIdentity, SettingKey, ADMIN_ROLE, USER_ROLE,
};
use crate::error::{AppError, Result};
use crate::repository::{PrincipalRepository, RbacRepository, SettingsRepository};
use crate::service::system_settings::read_flag;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

pub struct PrincipalService<P, R, S>
where
    P: PrincipalRepository,
    R: RbacRepository,
    S: SettingsRepository,
{
    repo: Arc<P>,
    rbac: Arc<R>,
    settings: Arc<S>,
}

impl<P, R, S> PrincipalService<P, R, S>
where
    P: PrincipalRepository,
    R: RbacRepository,
    S: SettingsRepository,
{
    pub fn new(repo: Arc<P>, rbac: Arc<R>, settings: Arc<S>) -> Self {
        Self {
            repo,
            rbac,
            settings,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Principal> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Principal {} not found", id)))
    }

    /// Register the caller's identity with the "User" role
    pub async fn register(
        &self,
        identity: &SessionIdentity,
        input: RegisterInput,
    ) -> Result<Principal> {
        input.validate()?;

        if !read_flag(self.settings.as_ref(), &SettingKey::AllowRegistration).await? {
            return Err(AppError::Forbidden("Registration is disabled".to_string()));
        }
        if self.repo.find_by_id(identity.id).await?.is_some() {
            return Err(AppError::Conflict("Principal already registered".to_string()));
        }

        let role_id = match self.rbac.find_role_by_name(USER_ROLE).await? {
            Some(role) => Some(role.id),
            None => {
                tracing::warn!("Default role missing, registering principal without a role");
                None
            }
        };

        let principal = self
            .repo
            .create(&NewPrincipal {
                id: identity.id,
                email: identity.email.clone(),
                display_name: input.display_name.map(|n| n.trim().to_string()),
                role_id,
            })
            .await?;

        tracing::info!(principal_id = %principal.id, "Principal registered");
        Ok(principal)
    }

    async fn holds_admin_role(&self, principal: &Principal) -> Result<bool> {
        let Some(role_id) = principal.role_id else {
            return Ok(false);
        };
        Ok(self
            .rbac
            .find_role_by_id(role_id)
            .await?
            .is_some_and(|role| role.name == ADMIN_ROLE))
    }

    /// Decide whether the identity may start a dashboard session.
    ///
    /// Admins bypass `allow_login` so the toggle cannot lock everyone out.
    pub async fn check_login(&self, identity: &SessionIdentity) -> Result<Principal> {
        let principal = self
            .repo
            .find_by_id(identity.id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Not registered".to_string()))?;

        if !principal.is_active {
            return Err(AppError::Unauthorized("Account is deactivated".to_string()));
        }

        if !read_flag(self.settings.as_ref(), &SettingKey::AllowLogin).await?
            && !self.holds_admin_role(&principal).await?
        {
            return Err(AppError::Forbidden("Login is disabled".to_string()));
        }

        Ok(principal)
    }

    pub async fn list(&self, offset: i64, limit: i64) -> Result<(Vec<Principal>, i64)> {
        let principals = self.repo.list(offset, limit).await?;
        let total = self.repo.count().await?;
        Ok((principals, total))
    }

    /// Assign a role, or clear it with `None`
    pub async fn assign_role(&self, id: Uuid, role_id: Option<Uuid>) -> Result<Principal> {
        let _ = self.get(id).await?;
        if let Some(role_id) = role_id {
            if self.rbac.find_role_by_id(role_id).await?.is_none() {
                return Err(AppError::NotFound(format!("Role {} not found", role_id)));
            }
        }

        self.repo.set_role(id, role_id).await?;
        self.get(id).await
    }

    /// Deactivate a principal. Records are never hard-deleted.
    ///
    /// Nobody may deactivate themselves and only Admins may deactivate Admins.
    pub async fn deactivate(
        &self,
        actor_id: Uuid,
        actor_is_admin: bool,
        id: Uuid,
    ) -> Result<Principal> {
        if actor_id == id {
            return Err(AppError::BadRequest(
                "You cannot deactivate your own account".to_string(),
            ));
        }

        let target = self.get(id).await?;
        if !actor_is_admin && self.holds_admin_role(&target).await? {
            return Err(AppError::Forbidden(
                "Only an Admin can deactivate an Admin".to_string(),
            ));
        }
        if !target.is_active {
            return Ok(target);
        }

        self.repo.set_active(id, false).await?;
        self.get(id).await
    }
}
