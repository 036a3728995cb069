//! Global settings handlers (Admin)

use crate::api::{write_audit_log, AuditEvent, SuccessResponse};
use crate::domain::UpdateGlobalSettingsInput;
use crate::error::Result;
use crate::middleware::Authz;
use crate::policy::{enforce, PolicyAction};
use crate::state::HasServices;
use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};

pub async fn get<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
) -> Result<impl IntoResponse> {
    enforce(&authz, PolicyAction::AdminConsole).await?;
    let settings = state.settings_service().get_global().await?;
    Ok(Json(SuccessResponse::new(settings)))
}

/// Partial update; omitted toggles keep their value
pub async fn update<S: HasServices>(
    State(state): State<S>,
    authz: Authz<S>,
    headers: HeaderMap,
    Json(input): Json<UpdateGlobalSettingsInput>,
) -> Result<impl IntoResponse> {
    let actor = enforce(&authz, PolicyAction::AdminConsole).await?;
    let before = state.settings_service().get_global().await?;
    let after = state
        .settings_service()
        .update_global(input, Some(actor.id))
        .await?;

    if before != after {
        write_audit_log(
            &state,
            &headers,
            AuditEvent {
                principal_id: Some(actor.id),
                action: "settings.update",
                resource_type: "settings",
                resource_id: None,
                metadata: Some(serde_json::json!({ "before": before, "after": after })),
            },
        )
        .await;
    }

    Ok(Json(SuccessResponse::new(after)))
}
