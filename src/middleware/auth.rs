//! Session token extraction and the `Authz` extractor

use axum::{
    extract::FromRequestParts,
    http::{
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
        HeaderMap,
    },
};
use std::sync::Arc;

use crate::error::AppError;
use crate::state::{HasServices, StateAuthz};

/// Session token from the `Authorization: Bearer` header, falling back to
/// the session cookie.
pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(token) = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == cookie_name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Request-scoped authorization context.
///
/// The edge gate stores the context it resolved in the request extensions;
/// routes outside the gate resolve one on demand. Either way each request
/// resolves the principal at most once.
pub struct Authz<S: HasServices>(pub Arc<StateAuthz<S>>);

impl<S: HasServices> std::ops::Deref for Authz<S> {
    type Target = StateAuthz<S>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Authz<S>
where
    S: HasServices,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(ctx) = parts.extensions.get::<Arc<StateAuthz<S>>>() {
            return Ok(Authz(ctx.clone()));
        }

        let token = extract_session_token(&parts.headers, &state.config().session.cookie_name);
        let ctx = Arc::new(state.authz_service().resolve(token.as_deref()).await?);
        parts.extensions.insert(ctx.clone());
        Ok(Authz(ctx))
    }
}
