//! Role and permission administration
//!
//! This service trusts its caller. Handlers run the mutation guard before
//! reaching any method here.

use crate::domain::{
    CreateRoleInput, NewRole, Permission, PermissionKey, Role, RoleSummary, RoleWithPermissions,
    UpdateRoleInput, ADMIN_ROLE, USER_ROLE,
};
use crate::error::{AppError, Result};
use crate::repository::{PrincipalRepository, RbacRepository};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Catalog entries sharing a category tag
#[derive(Debug, Clone, Serialize)]
pub struct PermissionGroup {
    pub category: String,
    pub permissions: Vec<Permission>,
}

/// Outcome of reconciling the code catalog with the durable one
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSyncReport {
    pub inserted: Vec<PermissionKey>,
    /// Stored keys the running code does not know
    pub unknown: Vec<String>,
}

/// The two built-in roles, as stored
#[derive(Debug, Clone)]
pub struct SystemRoles {
    pub admin: Role,
    pub user: Role,
}

/// Parse raw keys into a deduplicated, sorted key set.
///
/// Any malformed or unknown key rejects the whole set.
pub fn parse_permission_keys(raw: &[String]) -> Result<Vec<PermissionKey>> {
    let mut keys = BTreeSet::new();
    for key in raw {
        let parsed = key
            .parse::<PermissionKey>()
            .map_err(|e| AppError::Validation(e.to_string()))?;
        keys.insert(parsed);
    }
    Ok(keys.into_iter().collect())
}

fn key_strings(keys: &[PermissionKey]) -> Vec<String> {
    keys.iter().map(|k| k.as_str().to_string()).collect()
}

pub struct RbacService<R: RbacRepository, P: PrincipalRepository> {
    repo: Arc<R>,
    principals: Arc<P>,
}

impl<R: RbacRepository, P: PrincipalRepository> RbacService<R, P> {
    pub fn new(repo: Arc<R>, principals: Arc<P>) -> Self {
        Self { repo, principals }
    }

    // ==================== Catalog ====================

    /// Insert catalog keys missing from the store and report stored keys the
    /// code does not know. Existing rows are never modified or removed.
    pub async fn sync_catalog(&self) -> Result<CatalogSyncReport> {
        let stored = self.repo.list_catalog().await?;
        let stored_keys: HashSet<&str> = stored.iter().map(|p| p.permission_key.as_str()).collect();

        let mut report = CatalogSyncReport::default();
        for key in PermissionKey::ALL {
            if !stored_keys.contains(key.as_str()) {
                self.repo.insert_catalog_entry(&key.definition()).await?;
                report.inserted.push(*key);
            }
        }

        for row in &stored {
            if row.permission_key.parse::<PermissionKey>().is_err() {
                tracing::warn!(
                    event = "authz_config_invalid",
                    permission = %row.permission_key,
                    "Stored permission is not known to this build"
                );
                report.unknown.push(row.permission_key.clone());
            }
        }

        if !report.inserted.is_empty() {
            tracing::info!(count = report.inserted.len(), "Inserted new catalog permissions");
        }
        Ok(report)
    }

    /// Durable catalog grouped by category
    pub async fn list_permissions(&self) -> Result<Vec<PermissionGroup>> {
        let mut groups: BTreeMap<String, Vec<Permission>> = BTreeMap::new();
        for permission in self.repo.list_catalog().await? {
            groups
                .entry(permission.category.clone())
                .or_default()
                .push(permission);
        }

        Ok(groups
            .into_iter()
            .map(|(category, permissions)| PermissionGroup {
                category,
                permissions,
            })
            .collect())
    }

    // ==================== Roles ====================

    /// Create "Admin" and "User" when absent.
    ///
    /// Default grants are applied only on creation; an operator's later
    /// edits to either role are left alone.
    pub async fn ensure_system_roles(&self) -> Result<SystemRoles> {
        let admin = self
            .ensure_system_role(
                ADMIN_ROLE,
                "Full access to the dashboard and its administration",
                PermissionKey::ALL,
            )
            .await?;
        let user = self
            .ensure_system_role(
                USER_ROLE,
                "Default role for registered users",
                &PermissionKey::default_user_grants(),
            )
            .await?;
        Ok(SystemRoles { admin, user })
    }

    async fn ensure_system_role(
        &self,
        name: &str,
        description: &str,
        grants: &[PermissionKey],
    ) -> Result<Role> {
        if let Some(role) = self.repo.find_role_by_name(name).await? {
            if !role.is_system {
                tracing::warn!(role = name, "Built-in role name is held by a custom role");
            }
            return Ok(role);
        }

        let role = self
            .repo
            .create_role(
                &NewRole {
                    name: name.to_string(),
                    description: Some(description.to_string()),
                    is_system: true,
                },
                &key_strings(grants),
            )
            .await?;
        tracing::info!(role = name, "Created system role");
        Ok(role)
    }

    pub async fn create_role(&self, input: CreateRoleInput) -> Result<RoleWithPermissions> {
        input.validate()?;
        // Reject bad keys before the role row exists
        let permissions = match &input.permission_keys {
            Some(raw) => parse_permission_keys(raw)?,
            None => Vec::new(),
        };

        let role = self
            .repo
            .create_role(
                &NewRole {
                    name: input.name.trim().to_string(),
                    description: input.description,
                    is_system: false,
                },
                &key_strings(&permissions),
            )
            .await?;

        Ok(RoleWithPermissions { role, permissions })
    }

    pub async fn get_role(&self, id: Uuid) -> Result<Role> {
        self.repo
            .find_role_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Role {} not found", id)))
    }

    pub async fn get_role_with_permissions(&self, id: Uuid) -> Result<RoleWithPermissions> {
        let role = self.get_role(id).await?;
        let raw = self.repo.find_role_permission_keys(id).await?;
        let permissions: BTreeSet<PermissionKey> =
            raw.iter().filter_map(|k| k.parse().ok()).collect();
        Ok(RoleWithPermissions {
            role,
            permissions: permissions.into_iter().collect(),
        })
    }

    /// Roles with the number of principals holding each
    pub async fn list_roles(&self) -> Result<Vec<RoleSummary>> {
        let roles = self.repo.list_roles().await?;
        let mut summaries = Vec::with_capacity(roles.len());
        for role in roles {
            let assigned_principals = self.principals.count_by_role(role.id).await?;
            summaries.push(RoleSummary {
                role,
                assigned_principals,
            });
        }
        Ok(summaries)
    }

    pub async fn update_role(&self, id: Uuid, input: UpdateRoleInput) -> Result<Role> {
        input.validate()?;
        let existing = self.get_role(id).await?;

        let name = match input.name {
            Some(name) => name.trim().to_string(),
            None => existing.name.clone(),
        };
        if existing.is_system && name != existing.name {
            return Err(AppError::SystemRoleProtected(existing.name));
        }

        let description = input.description.or(existing.description);
        self.repo
            .update_role(id, &name, description)
            .await
    }

    /// Delete a custom role that no principal references.
    ///
    /// Bindings go with it in the same transaction.
    pub async fn delete_role(&self, id: Uuid) -> Result<Role> {
        let role = self.get_role(id).await?;
        if role.is_system {
            return Err(AppError::SystemRoleProtected(role.name));
        }

        let assigned = self.principals.count_by_role(id).await?;
        if assigned > 0 {
            return Err(AppError::RoleInUse {
                role: role.name,
                assigned,
            });
        }

        self.repo.delete_role(id).await.map_err(|e| match e {
            // FK RESTRICT tripped by an assignment that raced the count
            AppError::Database(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                AppError::RoleInUse {
                    role: role.name.clone(),
                    assigned: 1,
                }
            }
            other => other,
        })?;
        Ok(role)
    }

    // ==================== Role-Permission ====================

    /// Replace the role's whole permission set in one transaction
    pub async fn set_role_permissions(
        &self,
        role_id: Uuid,
        raw_keys: &[String],
    ) -> Result<RoleWithPermissions> {
        let role = self.get_role(role_id).await?;
        let permissions = parse_permission_keys(raw_keys)?;

        self.repo
            .replace_role_permissions(role_id, &key_strings(&permissions))
            .await?;

        Ok(RoleWithPermissions { role, permissions })
    }
}
