//! Principal administration handlers

use crate::api::{write_audit_log, AuditEvent, PaginatedResponse, PaginationQuery, SuccessResponse};
use crate::domain::AssignRoleInput;
use crate::error::Result;
use crate::middleware::Authz;
use crate::policy::{enforce, PolicyAction};
use crate::state::HasServices;
use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

/// List principals (Admin or `users.view`)
pub async fn list<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<impl IntoResponse> {
    enforce(&authz, PolicyAction::UserRead).await?;
    let (principals, total) = state
        .principal_service()
        .list(pagination.offset(), pagination.per_page)
        .await?;
    Ok(Json(PaginatedResponse::new(
        principals,
        pagination.page,
        pagination.per_page,
        total,
    )))
}

/// Assign or clear a principal's role (Admin)
pub async fn assign_role<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<AssignRoleInput>,
) -> Result<impl IntoResponse> {
    let actor = enforce(&authz, PolicyAction::AdminConsole).await?;
    let before = state.principal_service().get(id).await?;
    let principal = state
        .principal_service()
        .assign_role(id, input.role_id)
        .await?;

    write_audit_log(
        &state,
        &headers,
        AuditEvent {
            principal_id: Some(actor.id),
            action: "principal.assign_role",
            resource_type: "principal",
            resource_id: Some(id.to_string()),
            metadata: Some(serde_json::json!({
                "previous_role_id": before.role_id,
                "role_id": principal.role_id,
            })),
        },
    )
    .await;

    Ok(Json(SuccessResponse::new(principal)))
}

/// Deactivate a principal (Admin or `users.delete`)
pub async fn deactivate<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let actor = enforce(&authz, PolicyAction::UserDeactivate).await?;
    let actor_is_admin = authz.is_admin().await?;
    let principal = state
        .principal_service()
        .deactivate(actor.id, actor_is_admin, id)
        .await?;

    write_audit_log(
        &state,
        &headers,
        AuditEvent {
            principal_id: Some(actor.id),
            action: "principal.deactivate",
            resource_type: "principal",
            resource_id: Some(id.to_string()),
            metadata: None,
        },
    )
    .await;

    Ok(Json(SuccessResponse::new(principal)))
}
