//! RBAC repository: roles, the durable permission catalog and role bindings

use crate::domain::{NewRole, Permission, PermissionDefinition, Role};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;
use uuid::Uuid;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RbacRepository: Send + Sync {
    // Permission catalog (append-only)
    async fn list_catalog(&self) -> Result<Vec<Permission>>;
    async fn insert_catalog_entry(&self, definition: &PermissionDefinition) -> Result<()>;

    // Roles
    /// Insert the role together with its initial bindings in one
    /// transaction. Unknown keys fail the whole call and leave no role behind.
    async fn create_role(&self, input: &NewRole, keys: &[String]) -> Result<Role>;
    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>>;
    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>>;
    async fn list_roles(&self) -> Result<Vec<Role>>;
    async fn update_role(
        &self,
        id: Uuid,
        name: &str,
        description: Option<String>,
    ) -> Result<Role>;
    /// Delete the role and its bindings in one transaction
    async fn delete_role(&self, id: Uuid) -> Result<()>;

    // Role-Permission bindings
    async fn find_role_permission_keys(&self, role_id: Uuid) -> Result<Vec<String>>;
    /// Replace the whole binding set of a role atomically.
    ///
    /// Fails without touching existing bindings if any key is missing from
    /// the durable catalog.
    async fn replace_role_permissions(&self, role_id: Uuid, keys: &[String]) -> Result<()>;
}

pub struct RbacRepositoryImpl {
    pool: MySqlPool,
}

impl RbacRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Bind catalog permissions to a role inside an open transaction.
///
/// Returns `Validation` on the first key the catalog does not hold; the
/// caller drops the transaction, which rolls everything back.
async fn insert_bindings(
    tx: &mut sqlx::Transaction<'_, sqlx::MySql>,
    role_id: Uuid,
    keys: &[String],
) -> Result<()> {
    for key in keys {
        let result = sqlx::query(
            r#"
            INSERT INTO role_permission_bindings (role_id, permission_id)
            SELECT ?, id FROM permission_catalog WHERE permission_key = ?
            "#,
        )
        .bind(role_id)
        .bind(key)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation(format!(
                "Permission '{}' is not in the catalog",
                key
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl RbacRepository for RbacRepositoryImpl {
    async fn list_catalog(&self) -> Result<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT id, permission_key, name, description, category
            FROM permission_catalog
            ORDER BY category, permission_key
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(permissions)
    }

    async fn insert_catalog_entry(&self, definition: &PermissionDefinition) -> Result<()> {
        // INSERT IGNORE: an existing key is never rewritten
        sqlx::query(
            r#"
            INSERT IGNORE INTO permission_catalog (id, permission_key, name, description, category)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(definition.key.as_str())
        .bind(definition.name)
        .bind(definition.description)
        .bind(definition.category.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_role(&self, input: &NewRole, keys: &[String]) -> Result<Role> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO roles (id, name, description, is_system, created_at, updated_at)
            VALUES (?, ?, ?, ?, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(input.is_system)
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Role '{}' already exists", input.name))
            }
            other => AppError::Database(other),
        })?;

        insert_bindings(&mut tx, id, keys).await?;
        tx.commit().await?;

        self.find_role_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to create role")))
    }

    async fn find_role_by_id(&self, id: Uuid) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, is_system, created_at, updated_at FROM roles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, is_system, created_at, updated_at FROM roles WHERE name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(role)
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT id, name, description, is_system, created_at, updated_at FROM roles ORDER BY is_system DESC, name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    async fn update_role(
        &self,
        id: Uuid,
        name: &str,
        description: Option<String>,
    ) -> Result<Role> {
        let result = sqlx::query(
            r#"
            UPDATE roles
            SET name = ?, description = ?, updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(name)
        .bind(description)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::Conflict(format!("Role '{}' already exists", name))
            }
            other => AppError::Database(other),
        })?;

        if result.rows_affected() == 0 && self.find_role_by_id(id).await?.is_none() {
            return Err(AppError::NotFound(format!("Role {} not found", id)));
        }

        self.find_role_by_id(id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to update role")))
    }

    async fn delete_role(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_permission_bindings WHERE role_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        // principals.role_id has ON DELETE RESTRICT, so a concurrent assignment
        // makes this statement fail instead of leaving a dangling reference
        let result = sqlx::query("DELETE FROM roles WHERE id = ? AND is_system = FALSE")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Role {} not found", id)));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_role_permission_keys(&self, role_id: Uuid) -> Result<Vec<String>> {
        let keys: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT p.permission_key
            FROM permission_catalog p
            INNER JOIN role_permission_bindings rpb ON p.id = rpb.permission_id
            WHERE rpb.role_id = ?
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(keys.into_iter().map(|(key,)| key).collect())
    }

    async fn replace_role_permissions(&self, role_id: Uuid, keys: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM role_permission_bindings WHERE role_id = ?")
            .bind(role_id)
            .execute(&mut *tx)
            .await?;

        // an error drops `tx`, which rolls back the delete above
        insert_bindings(&mut tx, role_id, keys).await?;

        tx.commit().await?;
        Ok(())
    }
}
