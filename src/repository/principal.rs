//! Principal directory repository

use crate::domain::{NewPrincipal, Principal};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PrincipalRepository: Send + Sync {
    async fn create(&self, input: &NewPrincipal) -> Result<Principal>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>>;
    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Principal>>;
    async fn count(&self) -> Result<i64>;
    /// Number of principals (active or not) referencing the role
    async fn count_by_role(&self, role_id: Uuid) -> Result<i64>;
    async fn set_role(&self, id: Uuid, role_id: Option<Uuid>) -> Result<()>;
    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<()>;
    /// Cheap round trip used by the readiness probe
    async fn ping(&self) -> Result<()>;
}

pub struct PrincipalRepositoryImpl {
    pool: MySqlPool,
}

impl PrincipalRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PrincipalRepository for PrincipalRepositoryImpl {
    async fn create(&self, input: &NewPrincipal) -> Result<Principal> {
        sqlx::query(
            r#"
            INSERT INTO principals (id, email, display_name, is_active, role_id, created_at, updated_at)
            VALUES (?, ?, ?, TRUE, ?, NOW(), NOW())
            "#,
        )
        .bind(input.id)
        .bind(&input.email)
        .bind(&input.display_name)
        .bind(input.role_id)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict("Principal already registered".to_string())
            }
            other => AppError::Database(other),
        })?;

        self.find_by_id(input.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create principal")))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>> {
        let principal = sqlx::query_as::<_, Principal>(
            r#"
            SELECT id, email, display_name, is_active, role_id, created_at, updated_at
            FROM principals
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(principal)
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<Principal>> {
        let principals = sqlx::query_as::<_, Principal>(
            r#"
            SELECT id, email, display_name, is_active, role_id, created_at, updated_at
            FROM principals
            ORDER BY created_at DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(principals)
    }

    async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM principals")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn count_by_role(&self, role_id: Uuid) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM principals WHERE role_id = ?")
            .bind(role_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    async fn set_role(&self, id: Uuid, role_id: Option<Uuid>) -> Result<()> {
        let result =
            sqlx::query("UPDATE principals SET role_id = ?, updated_at = NOW() WHERE id = ?")
                .bind(role_id)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Principal {} not found", id)));
        }
        Ok(())
    }

    async fn set_active(&self, id: Uuid, is_active: bool) -> Result<()> {
        let result =
            sqlx::query("UPDATE principals SET is_active = ?, updated_at = NOW() WHERE id = ?")
                .bind(is_active)
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Principal {} not found", id)));
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
