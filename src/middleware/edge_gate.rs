//! Edge gate: the pre-render route check
//!
//! Runs before any handler. Anonymous and inactive callers are sent to the
//! login page (navigations) or get 401 (API calls). Non-admins reaching an
//! admin path are sent to the dashboard or get 403. Paths with dot segments
//! are rejected outright so the prefix classification cannot be bypassed.

use axum::{
    body::Body,
    extract::State,
    http::{header::LOCATION, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::auth::extract_session_token;
use crate::service::PrincipalState;
use crate::state::HasServices;

pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

const PUBLIC_EXACT: &[&str] = &["/login", "/register", "/health", "/ready", "/metrics"];
const PUBLIC_PREFIXES: &[&str] = &["/share/", "/api/auth/", "/api/share/"];
const ADMIN_PREFIXES: &[&str] = &["/admin", "/api/admin"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Public,
    Protected,
    AdminOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectToLogin { next: String },
    RedirectToDashboard,
    Unauthorized,
    Forbidden,
}

/// Returns `true` if any path segment is `.` or `..`, percent-encoded or not.
fn has_dot_segments(path: &str) -> bool {
    path.split('/').any(|seg| {
        let decoded = urlencoding::decode(seg).map(|s| s.into_owned());
        let seg = decoded.as_deref().unwrap_or(seg);
        seg == "." || seg == ".."
    })
}

/// `/admin` matches `/admin` and `/admin/...` but not `/administrator`
fn under(path: &str, prefix: &str) -> bool {
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

pub fn classify(path: &str) -> RouteClass {
    if PUBLIC_EXACT.contains(&path)
        || PUBLIC_PREFIXES
            .iter()
            .any(|p| path.starts_with(p) || path == p.trim_end_matches('/'))
    {
        return RouteClass::Public;
    }
    if ADMIN_PREFIXES.iter().any(|p| under(path, p)) {
        return RouteClass::AdminOnly;
    }
    RouteClass::Protected
}

pub fn is_api(path: &str) -> bool {
    under(path, "/api")
}

/// Pure decision table for a classified path and caller state
pub fn decide(
    class: RouteClass,
    state: PrincipalState,
    api: bool,
    path_and_query: &str,
) -> GateDecision {
    use PrincipalState::*;

    match (class, state) {
        (RouteClass::Public, _) => GateDecision::Allow,
        (_, Anonymous | Inactive) if api => GateDecision::Unauthorized,
        (_, Anonymous | Inactive) => GateDecision::RedirectToLogin {
            next: path_and_query.to_string(),
        },
        (RouteClass::Protected, Member | Admin) => GateDecision::Allow,
        (RouteClass::AdminOnly, Admin) => GateDecision::Allow,
        (RouteClass::AdminOnly, Member) if api => GateDecision::Forbidden,
        (RouteClass::AdminOnly, Member) => GateDecision::RedirectToDashboard,
    }
}

fn redirect(location: &str) -> Response {
    (StatusCode::SEE_OTHER, [(LOCATION, location.to_string())]).into_response()
}

impl IntoResponse for GateDecision {
    fn into_response(self) -> Response {
        match self {
            GateDecision::Allow => StatusCode::NO_CONTENT.into_response(),
            GateDecision::RedirectToLogin { next } => redirect(&format!(
                "{}?next={}",
                LOGIN_PATH,
                urlencoding::encode(&next)
            )),
            GateDecision::RedirectToDashboard => redirect(DASHBOARD_PATH),
            GateDecision::Unauthorized => {
                AppError::Unauthorized("Authentication required".to_string()).into_response()
            }
            GateDecision::Forbidden => {
                AppError::Forbidden("admin path".to_string()).into_response()
            }
        }
    }
}

/// Edge gate middleware
pub async fn edge_gate_middleware<S: HasServices>(
    State(state): State<S>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();
    if has_dot_segments(&path) {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let class = classify(&path);
    if class == RouteClass::Public {
        return next.run(request).await;
    }

    let token = extract_session_token(request.headers(), &state.config().session.cookie_name);
    let ctx = match state.authz_service().resolve(token.as_deref()).await {
        Ok(ctx) => ctx,
        Err(e) => return e.into_response(),
    };
    let principal_state = match ctx.state().await {
        Ok(s) => s,
        Err(e) => return e.into_response(),
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    match decide(class, principal_state, is_api(&path), &path_and_query) {
        GateDecision::Allow => {
            request.extensions_mut().insert(Arc::new(ctx));
            next.run(request).await
        }
        denied => {
            if matches!(denied, GateDecision::Forbidden | GateDecision::RedirectToDashboard) {
                if let Some(principal) = ctx.principal() {
                    tracing::warn!(
                        event = "permission_denied",
                        principal_id = %principal.id,
                        path = %path,
                        "Non-admin reached an admin path"
                    );
                    metrics::counter!("toolhub_permission_denied_total", "action" => "edge_gate")
                        .increment(1);
                }
            }
            denied.into_response()
        }
    }
}
