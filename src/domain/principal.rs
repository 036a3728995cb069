//! Principal (authenticated identity) domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A registered identity capable of holding one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Principal {
    /// Subject id issued by the identity provider
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    /// `None` means the principal holds no privilege at all
    pub role_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Default for Principal {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: String::new(),
            display_name: None,
            is_active: true,
            role_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// What the identity provider knows about the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    pub id: Uuid,
    pub email: String,
    pub email_confirmed: bool,
}

/// Row handed to the repository on registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPrincipal {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub role_id: Option<Uuid>,
}

/// Registration request body
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct RegisterInput {
    #[validate(length(min = 1, max = 100))]
    pub display_name: Option<String>,
}

/// Role assignment request body. `role_id: null` unassigns.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignRoleInput {
    pub role_id: Option<Uuid>,
}
