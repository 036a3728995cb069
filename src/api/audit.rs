//! Audit log API handlers

use crate::api::PaginatedResponse;
use crate::error::Result;
use crate::middleware::Authz;
use crate::policy::{enforce, PolicyAction};
use crate::repository::audit::AuditLogQuery;
use crate::repository::AuditRepository;
use crate::state::HasServices;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};

/// List audit logs (Admin or `audit.view`)
pub async fn list<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
    Query(query): Query<AuditLogQuery>,
) -> Result<impl IntoResponse> {
    enforce(&authz, PolicyAction::AuditRead).await?;

    let logs = state.audit_repo().find(&query).await?;
    let total = state.audit_repo().count(&query).await?;

    let per_page = query.effective_limit();
    let page = query.effective_offset() / per_page + 1;

    Ok(Json(PaginatedResponse::new(logs, page, per_page, total)))
}
