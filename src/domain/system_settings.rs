//! System settings domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::module::enablement_setting_key;

/// Setting row from the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SettingRow {
    pub setting_key: String,
    #[sqlx(json)]
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

impl SettingRow {
    /// Interpret the stored value as a flag.
    ///
    /// Only an explicit JSON `false` switches a flag off.
    pub fn is_explicitly_false(&self) -> bool {
        self.value == serde_json::Value::Bool(false)
    }
}

/// Well-known setting keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingKey {
    AllowRegistration,
    AllowLogin,
    ModuleEnabled(String),
}

impl SettingKey {
    pub fn as_key(&self) -> String {
        match self {
            Self::AllowRegistration => "allow_registration".to_string(),
            Self::AllowLogin => "allow_login".to_string(),
            Self::ModuleEnabled(module) => enablement_setting_key(module),
        }
    }

    /// Value assumed when no row exists
    pub fn default_flag(&self) -> bool {
        true
    }
}

/// Global toggles as shown on the settings screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    pub allow_registration: bool,
    pub allow_login: bool,
}

/// Partial update of the global toggles
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateGlobalSettingsInput {
    pub allow_registration: Option<bool>,
    pub allow_login: Option<bool>,
}

/// Module enablement toggle request body
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SetModuleEnabledInput {
    pub enabled: bool,
}
