//! Role and permission API handlers (Admin)

use crate::api::{write_audit_log, Ack, AuditEvent, SuccessResponse};
use crate::domain::{CreateRoleInput, SetRolePermissionsInput, UpdateRoleInput};
use crate::error::Result;
use crate::middleware::Authz;
use crate::policy::{enforce, PolicyAction};
use crate::state::HasServices;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

// ==================== Permissions ====================

/// Catalog grouped by category
pub async fn list_permissions<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
) -> Result<impl IntoResponse> {
    enforce(&authz, PolicyAction::AdminConsole).await?;
    let groups = state.rbac_service().list_permissions().await?;
    Ok(Json(SuccessResponse::new(groups)))
}

// ==================== Roles ====================

pub async fn list_roles<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
) -> Result<impl IntoResponse> {
    enforce(&authz, PolicyAction::AdminConsole).await?;
    let roles = state.rbac_service().list_roles().await?;
    Ok(Json(SuccessResponse::new(roles)))
}

pub async fn get_role<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    enforce(&authz, PolicyAction::AdminConsole).await?;
    let role = state.rbac_service().get_role_with_permissions(id).await?;
    Ok(Json(SuccessResponse::new(role)))
}

pub async fn create_role<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
    headers: HeaderMap,
    Json(input): Json<CreateRoleInput>,
) -> Result<impl IntoResponse> {
    let actor = enforce(&authz, PolicyAction::AdminConsole).await?;
    let created = state.rbac_service().create_role(input).await?;

    write_audit_log(
        &state,
        &headers,
        AuditEvent {
            principal_id: Some(actor.id),
            action: "role.create",
            resource_type: "role",
            resource_id: Some(created.role.id.to_string()),
            metadata: serde_json::to_value(&created).ok(),
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(SuccessResponse::new(created))))
}

pub async fn update_role<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateRoleInput>,
) -> Result<impl IntoResponse> {
    let actor = enforce(&authz, PolicyAction::AdminConsole).await?;
    let before = state.rbac_service().get_role(id).await?;
    let role = state.rbac_service().update_role(id, input).await?;

    write_audit_log(
        &state,
        &headers,
        AuditEvent {
            principal_id: Some(actor.id),
            action: "role.update",
            resource_type: "role",
            resource_id: Some(id.to_string()),
            metadata: Some(serde_json::json!({ "before": before, "after": role })),
        },
    )
    .await;

    Ok(Json(SuccessResponse::new(role)))
}

pub async fn delete_role<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let actor = enforce(&authz, PolicyAction::AdminConsole).await?;
    let deleted = state.rbac_service().delete_role(id).await?;

    write_audit_log(
        &state,
        &headers,
        AuditEvent {
            principal_id: Some(actor.id),
            action: "role.delete",
            resource_type: "role",
            resource_id: Some(id.to_string()),
            metadata: serde_json::to_value(&deleted).ok(),
        },
    )
    .await;

    Ok(Json(Ack::ok()))
}

/// Replace the role's whole permission set
pub async fn set_role_permissions<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(input): Json<SetRolePermissionsInput>,
) -> Result<impl IntoResponse> {
    let actor = enforce(&authz, PolicyAction::AdminConsole).await?;
    let before = state.rbac_service().get_role_with_permissions(id).await?;
    let after = state
        .rbac_service()
        .set_role_permissions(id, &input.permission_keys)
        .await?;

    write_audit_log(
        &state,
        &headers,
        AuditEvent {
            principal_id: Some(actor.id),
            action: "role.permissions.replace",
            resource_type: "role",
            resource_id: Some(id.to_string()),
            metadata: Some(serde_json::json!({
                "before": before.permissions,
                "after": after.permissions,
            })),
        },
    )
    .await;

    Ok(Json(SuccessResponse::new(after)))
}
