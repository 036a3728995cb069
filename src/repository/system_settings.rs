//! Settings repository
//!
//! Writes are split into `insert` and `update` so callers perform the
//! read-check-then-write sequence themselves. Two admins toggling the same
//! key at the same moment can lose one write; that is accepted for these
//! low-traffic, admin-only keys.

use crate::domain::SettingRow;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Get a setting by key
    async fn get(&self, key: &str) -> Result<Option<SettingRow>>;

    /// List all settings whose key starts with `prefix`
    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<SettingRow>>;

    async fn insert(
        &self,
        key: &str,
        value: &serde_json::Value,
        updated_by: Option<Uuid>,
    ) -> Result<()>;

    async fn update(
        &self,
        key: &str,
        value: &serde_json::Value,
        updated_by: Option<Uuid>,
    ) -> Result<()>;
}

pub struct SettingsRepositoryImpl {
    pool: MySqlPool,
}

impl SettingsRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for SettingsRepositoryImpl {
    async fn get(&self, key: &str) -> Result<Option<SettingRow>> {
        let row = sqlx::query_as::<_, SettingRow>(
            r#"
            SELECT setting_key, value, updated_at, updated_by
            FROM settings
            WHERE setting_key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<SettingRow>> {
        let rows = sqlx::query_as::<_, SettingRow>(
            r#"
            SELECT setting_key, value, updated_at, updated_by
            FROM settings
            WHERE setting_key LIKE CONCAT(?, '%')
            ORDER BY setting_key
            "#,
        )
        .bind(prefix)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn insert(
        &self,
        key: &str,
        value: &serde_json::Value,
        updated_by: Option<Uuid>,
    ) -> Result<()> {
        let value_json =
            serde_json::to_string(value).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO settings (setting_key, value, updated_at, updated_by)
            VALUES (?, ?, NOW(), ?)
            "#,
        )
        .bind(key)
        .bind(&value_json)
        .bind(updated_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update(
        &self,
        key: &str,
        value: &serde_json::Value,
        updated_by: Option<Uuid>,
    ) -> Result<()> {
        let value_json =
            serde_json::to_string(value).map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            UPDATE settings
            SET value = ?, updated_at = NOW(), updated_by = ?
            WHERE setting_key = ?
            "#,
        )
        .bind(&value_json)
        .bind(updated_by)
        .bind(key)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
