//! Global toggles and the shared flag write path

use crate::domain::{GlobalSettings, SettingKey, UpdateGlobalSettingsInput};
use crate::error::Result;
use crate::repository::SettingsRepository;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// Result of a flag write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlagChange {
    pub previous: bool,
    pub current: bool,
}

impl FlagChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Current value of a flag; absent rows use the key's default
pub(crate) async fn read_flag<S: SettingsRepository + ?Sized>(
    repo: &S,
    key: &SettingKey,
) -> Result<bool> {
    let row = repo.get(&key.as_key()).await?;
    Ok(match row {
        Some(row) => !row.is_explicitly_false(),
        None => key.default_flag(),
    })
}

/// Read-check-then-insert-or-update.
///
/// Writing the value already stored is a successful no-op. Concurrent writers
/// of the same key may lose an update.
pub(crate) async fn write_flag<S: SettingsRepository + ?Sized>(
    repo: &S,
    key: &SettingKey,
    value: bool,
    updated_by: Option<Uuid>,
) -> Result<FlagChange> {
    let storage_key = key.as_key();
    let existing = repo.get(&storage_key).await?;
    let previous = match &existing {
        Some(row) => !row.is_explicitly_false(),
        None => key.default_flag(),
    };

    let json = serde_json::Value::Bool(value);
    match existing {
        Some(row) if row.value == json => {}
        Some(_) => repo.update(&storage_key, &json, updated_by).await?,
        // An absent row already reads as the default
        None if value == key.default_flag() => {}
        None => repo.insert(&storage_key, &json, updated_by).await?,
    }

    Ok(FlagChange {
        previous,
        current: value,
    })
}

/// Service for the dashboard-wide toggles
pub struct SettingsService<S: SettingsRepository> {
    repo: Arc<S>,
}

impl<S: SettingsRepository> SettingsService<S> {
    pub fn new(repo: Arc<S>) -> Self {
        Self { repo }
    }

    pub async fn is_registration_allowed(&self) -> Result<bool> {
        read_flag(self.repo.as_ref(), &SettingKey::AllowRegistration).await
    }

    pub async fn is_login_allowed(&self) -> Result<bool> {
        read_flag(self.repo.as_ref(), &SettingKey::AllowLogin).await
    }

    pub async fn get_global(&self) -> Result<GlobalSettings> {
        Ok(GlobalSettings {
            allow_registration: self.is_registration_allowed().await?,
            allow_login: self.is_login_allowed().await?,
        })
    }

    /// Apply the provided toggles; omitted fields are left untouched
    pub async fn update_global(
        &self,
        input: UpdateGlobalSettingsInput,
        updated_by: Option<Uuid>,
    ) -> Result<GlobalSettings> {
        if let Some(value) = input.allow_registration {
            write_flag(
                self.repo.as_ref(),
                &SettingKey::AllowRegistration,
                value,
                updated_by,
            )
            .await?;
        }
        if let Some(value) = input.allow_login {
            write_flag(self.repo.as_ref(), &SettingKey::AllowLogin, value, updated_by).await?;
        }
        self.get_global().await
    }
}
