//! Audit log repository

use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, MySqlPool};
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditLog {
    pub id: i64,
    pub principal_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    #[sqlx(json)]
    pub metadata: Option<serde_json::Value>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an audit log entry
#[derive(Debug, Clone, Default)]
pub struct CreateAuditLogInput {
    pub principal_id: Option<Uuid>,
    pub action: String,
    pub resource_type: String,
    pub resource_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
}

/// Audit log query parameters
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditLogQuery {
    pub principal_id: Option<Uuid>,
    pub resource_type: Option<String>,
    pub action: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

impl AuditLogQuery {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 100;

    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }

    pub fn matches(&self, log: &AuditLog) -> bool {
        self.principal_id.map_or(true, |id| log.principal_id == Some(id))
            && self
                .resource_type
                .as_ref()
                .map_or(true, |t| &log.resource_type == t)
            && self.action.as_ref().map_or(true, |a| &log.action == a)
            && self.from_date.map_or(true, |d| log.created_at >= d)
            && self.to_date.map_or(true, |d| log.created_at <= d)
    }

    fn where_clause(&self) -> String {
        let mut sql = String::from(" WHERE 1=1");
        if self.principal_id.is_some() {
            sql.push_str(" AND principal_id = ?");
        }
        if self.resource_type.is_some() {
            sql.push_str(" AND resource_type = ?");
        }
        if self.action.is_some() {
            sql.push_str(" AND action = ?");
        }
        if self.from_date.is_some() {
            sql.push_str(" AND created_at >= ?");
        }
        if self.to_date.is_some() {
            sql.push_str(" AND created_at <= ?");
        }
        sql
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn create(&self, input: &CreateAuditLogInput) -> Result<()>;
    async fn find(&self, query: &AuditLogQuery) -> Result<Vec<AuditLog>>;
    async fn count(&self, query: &AuditLogQuery) -> Result<i64>;
}

pub struct AuditRepositoryImpl {
    pool: MySqlPool,
}

impl AuditRepositoryImpl {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

// Binds filter values in the same order `where_clause` emits placeholders
macro_rules! bind_filters {
    ($builder:expr, $query:expr) => {{
        let mut builder = $builder;
        if let Some(principal_id) = $query.principal_id {
            builder = builder.bind(principal_id);
        }
        if let Some(ref resource_type) = $query.resource_type {
            builder = builder.bind(resource_type);
        }
        if let Some(ref action) = $query.action {
            builder = builder.bind(action);
        }
        if let Some(from_date) = $query.from_date {
            builder = builder.bind(from_date);
        }
        if let Some(to_date) = $query.to_date {
            builder = builder.bind(to_date);
        }
        builder
    }};
}

#[async_trait]
impl AuditRepository for AuditRepositoryImpl {
    async fn create(&self, input: &CreateAuditLogInput) -> Result<()> {
        let metadata = input
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::Internal(e.into()))?;

        sqlx::query(
            r#"
            INSERT INTO audit_logs (principal_id, action, resource_type, resource_id, metadata, source_ip, user_agent, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, NOW())
            "#,
        )
        .bind(input.principal_id)
        .bind(&input.action)
        .bind(&input.resource_type)
        .bind(&input.resource_id)
        .bind(metadata)
        .bind(&input.source_ip)
        .bind(&input.user_agent)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, query: &AuditLogQuery) -> Result<Vec<AuditLog>> {
        let sql = format!(
            "SELECT id, principal_id, action, resource_type, resource_id, metadata, source_ip, user_agent, created_at FROM audit_logs{} ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
            query.where_clause()
        );

        let builder = bind_filters!(sqlx::query_as::<_, AuditLog>(&sql), query);
        let logs = builder
            .bind(query.effective_limit())
            .bind(query.effective_offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(logs)
    }

    async fn count(&self, query: &AuditLogQuery) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM audit_logs{}", query.where_clause());

        let builder = bind_filters!(sqlx::query_as::<_, (i64,)>(&sql), query);
        let (count,) = builder.fetch_one(&self.pool).await?;
        Ok(count)
    }
}
