//! Registration and login against an identity-provider session
//!
//! Both routes sit behind the public `/api/auth/` prefix: the caller has a
//! valid session token but may not have a principal yet.

use crate::api::{write_audit_log, AuditEvent, SuccessResponse};
use crate::domain::{RegisterInput, SessionIdentity};
use crate::error::{AppError, Result};
use crate::middleware::extract_session_token;
use crate::state::HasServices;
use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};

async fn session_identity<S: HasServices>(
    state: &S,
    headers: &HeaderMap,
) -> Result<SessionIdentity> {
    let token = extract_session_token(headers, &state.config().session.cookie_name)
        .ok_or_else(|| AppError::Unauthorized("Missing session token".to_string()))?;

    state
        .authz_service()
        .identity()
        .current_user(&token)
        .await
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired session".to_string()))
}

/// Create a principal for the session's identity
pub async fn register<S: HasServices>(
    State(state): State<S>,
    headers: HeaderMap,
    Json(input): Json<RegisterInput>,
) -> Result<impl IntoResponse> {
    let identity = session_identity(&state, &headers).await?;
    let principal = state.principal_service().register(&identity, input).await?;

    write_audit_log(
        &state,
        &headers,
        AuditEvent {
            principal_id: Some(principal.id),
            action: "auth.register",
            resource_type: "principal",
            resource_id: Some(principal.id.to_string()),
            metadata: Some(serde_json::json!({ "email": principal.email })),
        },
    )
    .await;

    Ok((StatusCode::CREATED, Json(SuccessResponse::new(principal))))
}

/// Start a dashboard session for a registered, active principal
pub async fn login<S: HasServices>(
    State(state): State<S>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let identity = session_identity(&state, &headers).await?;

    let principal = match state.principal_service().check_login(&identity).await {
        Ok(principal) => principal,
        Err(e) => {
            if matches!(e, AppError::Forbidden(_) | AppError::Unauthorized(_)) {
                write_audit_log(
                    &state,
                    &headers,
                    AuditEvent {
                        principal_id: Some(identity.id),
                        action: "auth.login_rejected",
                        resource_type: "principal",
                        resource_id: Some(identity.id.to_string()),
                        metadata: Some(serde_json::json!({ "reason": e.to_string() })),
                    },
                )
                .await;
            }
            return Err(e);
        }
    };

    write_audit_log(
        &state,
        &headers,
        AuditEvent {
            principal_id: Some(principal.id),
            action: "auth.login",
            resource_type: "principal",
            resource_id: Some(principal.id.to_string()),
            metadata: None,
        },
    )
    .await;

    let snapshot = state
        .authz_service()
        .context(Some(principal))
        .snapshot()
        .await?;
    Ok(Json(SuccessResponse::new(snapshot)))
}
