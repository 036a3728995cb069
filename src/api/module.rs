//! Module (tool) handlers

use crate::api::{write_audit_log, AuditEvent, SuccessResponse};
use crate::domain::{ModuleDefinition, SetModuleEnabledInput};
use crate::error::{AppError, Result};
use crate::middleware::Authz;
use crate::policy::{enforce, require_authenticated, require_module, PolicyAction};
use crate::state::HasServices;
use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};

/// Modules the caller may open
pub async fn list_visible<S: HasServices>(authz: Authz<S>) -> Result<impl IntoResponse> {
    require_authenticated(&authz)?;
    let modules: Vec<ModuleDefinition> = authz
        .visible_modules()
        .await?
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(SuccessResponse::new(modules)))
}

/// One module, answered with 404 unless the caller may see it
pub async fn get_visible<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse> {
    require_module(&authz, &key).await?;
    let module = state
        .module_service()
        .registry()
        .get(&key)
        .cloned()
        .ok_or_else(|| AppError::NotFound(format!("Module '{}' not found", key)))?;
    Ok(Json(SuccessResponse::new(module)))
}

// ==================== Admin ====================

/// Every catalog module with its enablement flag
pub async fn list_all<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
) -> Result<impl IntoResponse> {
    enforce(&authz, PolicyAction::AdminConsole).await?;
    let modules = state.module_service().list_modules().await?;
    Ok(Json(SuccessResponse::new(modules)))
}

/// Enable or disable a module
pub async fn set_enabled<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
    headers: HeaderMap,
    Path(key): Path<String>,
    Json(input): Json<SetModuleEnabledInput>,
) -> Result<impl IntoResponse> {
    let actor = enforce(&authz, PolicyAction::AdminConsole).await?;
    let change = state
        .module_service()
        .set_module_enabled(&key, input.enabled, Some(actor.id))
        .await?;

    if change.changed() {
        write_audit_log(
            &state,
            &headers,
            AuditEvent {
                principal_id: Some(actor.id),
                action: "module.toggle",
                resource_type: "module",
                resource_id: Some(key.clone()),
                metadata: Some(serde_json::json!({
                    "previous": change.previous,
                    "current": change.current,
                })),
            },
        )
        .await;
    }

    Ok(Json(SuccessResponse::new(serde_json::json!({
        "key": key,
        "enabled": change.current,
    }))))
}
