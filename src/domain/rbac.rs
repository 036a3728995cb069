//! RBAC (Role-Based Access Control) domain models

use super::catalog::PermissionKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Name of the built-in administrator role
pub const ADMIN_ROLE: &str = "Admin";
/// Name of the built-in default role
pub const USER_ROLE: &str = "User";

/// Role entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// System roles ("Admin", "User") can be neither deleted nor renamed
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Role {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            description: None,
            is_system: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Row of the durable permission catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: Uuid,
    pub permission_key: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
}

/// Role-Permission grant edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
}

/// Row handed to the repository when creating a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
}

/// Input for creating a custom role
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRoleInput {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    /// Initial permission set; validated against the catalog
    pub permission_keys: Option<Vec<String>>,
}

/// Input for updating a role
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRoleInput {
    #[validate(length(min = 1, max = 64))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

/// Full-replace input for a role's permission set
#[derive(Debug, Clone, Deserialize)]
pub struct SetRolePermissionsInput {
    pub permission_keys: Vec<String>,
}

/// Role with its permissions (for API responses)
#[derive(Debug, Clone, Serialize)]
pub struct RoleWithPermissions {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<PermissionKey>,
}

/// Role listing entry for the admin screen
#[derive(Debug, Clone, Serialize)]
pub struct RoleSummary {
    #[serde(flatten)]
    pub role: Role,
    pub assigned_principals: i64,
}
