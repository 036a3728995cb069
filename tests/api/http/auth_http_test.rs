//! Registration, login and the caller's authorization snapshot

use super::{build_test_router, get, post, put};
use crate::api::{session_token, TestHarness};
use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use toolhub_core::domain::USER_ROLE;
use toolhub_core::repository::PrincipalRepository;
use uuid::Uuid;

async fn disable(h: &TestHarness, app: &axum::Router, setting: &str) {
    let (_, admin) = h.admin().await;
    let response = put(
        app,
        "/api/admin/settings",
        Some(&admin),
        json!({ setting: false }),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_register_assigns_user_role() {
    let h = TestHarness::new().await;
    let app = build_test_router(h.state.clone());
    let id = Uuid::new_v4();
    let token = session_token(id, "new@toolhub.test");

    let response = post(
        &app,
        "/api/auth/register",
        Some(&token),
        json!({ "display_name": "  New Person " }),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.data()["display_name"], "New Person");

    let stored = h.principals.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(stored.role_id, Some(h.role_id(USER_ROLE).await));
    assert_eq!(h.audit.actions().await, vec!["auth.register"]);
}

#[tokio::test]
async fn test_register_twice_conflicts() {
    let h = TestHarness::new().await;
    let (_, token) = h.member().await;
    let app = build_test_router(h.state.clone());

    let response = post(&app, "/api/auth/register", Some(&token), json!({})).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_without_session_unauthorized() {
    let h = TestHarness::new().await;
    let app = build_test_router(h.state.clone());

    let response = post(&app, "/api/auth/register", None, json!({})).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_registration_closed() {
    let h = TestHarness::new().await;
    let app = build_test_router(h.state.clone());
    disable(&h, &app, "allow_registration").await;
    let id = Uuid::new_v4();
    let token = session_token(id, "late@toolhub.test");

    let response = post(&app, "/api/auth/register", Some(&token), json!({})).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(h.principals.find_by_id(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_returns_snapshot() {
    let h = TestHarness::new().await;
    let (member, token) = h.member().await;
    let app = build_test_router(h.state.clone());

    let response = post(&app, "/api/auth/login", Some(&token), json!({})).await;
    assert_eq!(response.status, StatusCode::OK);
    let snapshot = response.data();
    assert_eq!(snapshot["principal_id"], member.id.to_string());
    assert_eq!(snapshot["role"], "User");
    assert_eq!(snapshot["is_admin"], false);
    assert_eq!(h.audit.actions().await, vec!["auth.login"]);
}

#[tokio::test]
async fn test_login_unregistered_rejected_and_audited() {
    let h = TestHarness::new().await;
    let app = build_test_router(h.state.clone());
    let token = session_token(Uuid::new_v4(), "stranger@toolhub.test");

    let response = post(&app, "/api/auth/login", Some(&token), json!({})).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.audit.actions().await, vec!["auth.login_rejected"]);
}

#[tokio::test]
async fn test_login_closed_except_for_admins() {
    let h = TestHarness::new().await;
    let app = build_test_router(h.state.clone());
    disable(&h, &app, "allow_login").await;
    let (_, member) = h.member().await;
    let (_, admin) = h.admin().await;

    assert_eq!(
        post(&app, "/api/auth/login", Some(&member), json!({})).await.status,
        StatusCode::FORBIDDEN
    );
    let admitted = post(&app, "/api/auth/login", Some(&admin), json!({})).await;
    assert_eq!(admitted.status, StatusCode::OK);
    assert_eq!(admitted.data()["is_admin"], true);
}

#[tokio::test]
async fn test_me_snapshot_lists_permissions_and_modules() {
    let h = TestHarness::new().await;
    let role = h.custom_role("Quizmaster", &["quiz.manage"]).await;
    let (_, token) = h.principal(Some(role)).await;
    let app = build_test_router(h.state.clone());

    let response = get(&app, "/api/me/authz", Some(&token)).await;
    assert_eq!(response.status, StatusCode::OK);
    let snapshot = response.data();
    assert_eq!(snapshot["role"], "Quizmaster");
    assert_eq!(snapshot["permissions"], json!(["quiz.manage"]));

    let modules: Vec<&str> = snapshot["visible_modules"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m.as_str().unwrap())
        .collect();
    assert!(modules.contains(&"quiz-builder"));
    assert!(modules.contains(&"json-formatter"));
    assert!(!modules.contains(&"whois-lookup"));
}

#[tokio::test]
async fn test_role_less_principal_sees_only_ungated_modules() {
    let h = TestHarness::new().await;
    let (_, token) = h.principal(None).await;
    let app = build_test_router(h.state.clone());

    let response = get(&app, "/api/me/authz", Some(&token)).await;
    assert_eq!(response.status, StatusCode::OK);
    let snapshot = response.data();
    assert!(snapshot["role"].is_null());
    assert_eq!(snapshot["permissions"], json!([]));
    assert!(snapshot["visible_modules"]
        .as_array()
        .unwrap()
        .contains(&json!("json-formatter")));
}
