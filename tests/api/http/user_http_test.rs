//! Principal administration over HTTP

use super::{build_test_router, get, post, put};
use crate::api::TestHarness;
use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use toolhub_core::domain::USER_ROLE;
use toolhub_core::repository::PrincipalRepository;
use uuid::Uuid;

#[tokio::test]
async fn test_list_requires_users_view() {
    let h = TestHarness::new().await;
    let (_, member) = h.member().await;
    let viewer_role = h.custom_role("Viewer", &["users.view"]).await;
    let (_, viewer) = h.principal(Some(viewer_role)).await;
    let app = build_test_router(h.state.clone());

    assert_eq!(
        get(&app, "/api/users", Some(&member)).await.status,
        StatusCode::FORBIDDEN
    );

    let response = get(&app, "/api/users?page=1&per_page=1", Some(&viewer)).await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.body.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["total"], 2);
    assert_eq!(body["pagination"]["total_pages"], 2);
}

#[tokio::test]
async fn test_invalid_page_rejected() {
    let h = TestHarness::new().await;
    let (_, admin) = h.admin().await;
    let app = build_test_router(h.state.clone());

    assert_eq!(
        get(&app, "/api/users?page=0", Some(&admin)).await.status,
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn test_admin_assigns_role() {
    let h = TestHarness::new().await;
    let (_, admin) = h.admin().await;
    let (member, _) = h.member().await;
    let editor = h.custom_role("Editor", &["users.edit"]).await;
    let app = build_test_router(h.state.clone());

    let response = put(
        &app,
        &format!("/api/admin/users/{}/role", member.id),
        Some(&admin),
        json!({ "role_id": editor }),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["role_id"], editor.to_string());

    let cleared = put(
        &app,
        &format!("/api/admin/users/{}/role", member.id),
        Some(&admin),
        json!({ "role_id": null }),
    )
    .await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert!(cleared.data()["role_id"].is_null());

    assert_eq!(
        h.audit.actions().await,
        vec!["principal.assign_role", "principal.assign_role"]
    );
}

#[tokio::test]
async fn test_assign_unknown_role_not_found() {
    let h = TestHarness::new().await;
    let (_, admin) = h.admin().await;
    let (member, _) = h.member().await;
    let app = build_test_router(h.state.clone());

    let response = put(
        &app,
        &format!("/api/admin/users/{}/role", member.id),
        Some(&admin),
        json!({ "role_id": Uuid::new_v4() }),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_users_edit_holder_cannot_assign_roles() {
    let h = TestHarness::new().await;
    let editor = h.custom_role("Editor", &["users.edit"]).await;
    let (_, token) = h.principal(Some(editor)).await;
    let (member, _) = h.member().await;
    let app = build_test_router(h.state.clone());

    let response = put(
        &app,
        &format!("/api/admin/users/{}/role", member.id),
        Some(&token),
        json!({ "role_id": editor }),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let unchanged = h.principals.find_by_id(member.id).await.unwrap().unwrap();
    assert_eq!(unchanged.role_id, Some(h.role_id(USER_ROLE).await));
}

#[tokio::test]
async fn test_deactivate_revokes_on_next_request() {
    let h = TestHarness::new().await;
    let moderator = h.custom_role("Moderator", &["users.delete"]).await;
    let (_, mod_token) = h.principal(Some(moderator)).await;
    let (member, member_token) = h.member().await;
    let app = build_test_router(h.state.clone());

    assert_eq!(
        get(&app, "/api/me/authz", Some(&member_token)).await.status,
        StatusCode::OK
    );

    let response = post(
        &app,
        &format!("/api/users/{}/deactivate", member.id),
        Some(&mod_token),
        json!({}),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.data()["is_active"], false);

    assert_eq!(
        get(&app, "/api/me/authz", Some(&member_token)).await.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(h.audit.actions().await, vec!["principal.deactivate"]);
}

#[tokio::test]
async fn test_only_admins_deactivate_admins() {
    let h = TestHarness::new().await;
    let moderator = h.custom_role("Moderator", &["users.delete"]).await;
    let (_, mod_token) = h.principal(Some(moderator)).await;
    let (admin, admin_token) = h.admin().await;
    let (other_admin, _) = h.admin().await;
    let app = build_test_router(h.state.clone());

    let denied = post(
        &app,
        &format!("/api/users/{}/deactivate", admin.id),
        Some(&mod_token),
        json!({}),
    )
    .await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let allowed = post(
        &app,
        &format!("/api/users/{}/deactivate", other_admin.id),
        Some(&admin_token),
        json!({}),
    )
    .await;
    assert_eq!(allowed.status, StatusCode::OK);
}

#[tokio::test]
async fn test_self_deactivation_rejected() {
    let h = TestHarness::new().await;
    let (admin, token) = h.admin().await;
    let app = build_test_router(h.state.clone());

    let response = post(
        &app,
        &format!("/api/users/{}/deactivate", admin.id),
        Some(&token),
        json!({}),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_member_cannot_deactivate() {
    let h = TestHarness::new().await;
    let (_, token) = h.member().await;
    let (other, _) = h.member().await;
    let app = build_test_router(h.state.clone());

    let response = post(
        &app,
        &format!("/api/users/{}/deactivate", other.id),
        Some(&token),
        json!({}),
    )
    .await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert!(h.audit.actions().await.is_empty());
}
