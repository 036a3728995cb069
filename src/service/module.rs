//! Module enablement administration

use crate::domain::{ModuleDefinition, ModuleRegistry, SettingKey};
use crate::error::{AppError, Result};
use crate::repository::SettingsRepository;
use crate::service::system_settings::{write_flag, FlagChange};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

/// Catalog entry with its current enablement, for the admin screen
#[derive(Debug, Clone, Serialize)]
pub struct ModuleStatus {
    #[serde(flatten)]
    pub module: ModuleDefinition,
    pub enabled: bool,
}

pub struct ModuleService<S: SettingsRepository> {
    settings: Arc<S>,
    modules: Arc<ModuleRegistry>,
}

impl<S: SettingsRepository> ModuleService<S> {
    pub fn new(settings: Arc<S>, modules: Arc<ModuleRegistry>) -> Self {
        Self { settings, modules }
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub async fn list_modules(&self) -> Result<Vec<ModuleStatus>> {
        let disabled: HashSet<String> = self
            .settings
            .list_by_prefix("module:")
            .await?
            .into_iter()
            .filter(|row| row.is_explicitly_false())
            .map(|row| row.setting_key)
            .collect();

        Ok(self
            .modules
            .all()
            .iter()
            .map(|module| ModuleStatus {
                enabled: !disabled.contains(&module.enablement_key()),
                module: module.clone(),
            })
            .collect())
    }

    /// Toggle a module. Setting the current value again succeeds without a write.
    pub async fn set_module_enabled(
        &self,
        module_key: &str,
        enabled: bool,
        updated_by: Option<Uuid>,
    ) -> Result<FlagChange> {
        let module = self
            .modules
            .get(module_key)
            .ok_or_else(|| AppError::NotFound(format!("Module '{}' not found", module_key)))?;

        write_flag(
            self.settings.as_ref(),
            &SettingKey::ModuleEnabled(module.key.to_string()),
            enabled,
            updated_by,
        )
        .await
    }
}
