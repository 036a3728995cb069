//! Caller's own authorization view

use crate::api::SuccessResponse;
use crate::error::Result;
use crate::middleware::Authz;
use crate::policy::require_authenticated;
use crate::state::HasServices;
use axum::{response::IntoResponse, Json};

/// Snapshot consumed by the client-side UI gate. Advisory only: every
/// mutation is checked again on the server.
pub async fn authz<S: HasServices>(authz: Authz<S>) -> Result<impl IntoResponse> {
    require_authenticated(&authz)?;
    let snapshot = authz.snapshot().await?;
    Ok(Json(SuccessResponse::new(snapshot)))
}
