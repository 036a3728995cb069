//! Role and permission administration over HTTP

use super::{build_test_router, delete, get, post, put};
use crate::api::TestHarness;
use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use toolhub_core::domain::ADMIN_ROLE;

#[tokio::test]
async fn test_list_permissions_grouped() {
    let h = TestHarness::new().await;
    let (_, token) = h.admin().await;
    let app = build_test_router(h.state.clone());

    let response = get(&app, "/api/admin/permissions", Some(&token)).await;
    assert_eq!(response.status, StatusCode::OK);

    let groups = response.data().as_array().unwrap();
    let categories: Vec<&str> = groups
        .iter()
        .map(|g| g["category"].as_str().unwrap())
        .collect();
    assert_eq!(categories, vec!["administration", "quiz", "tools", "users"]);
}

#[tokio::test]
async fn test_role_lifecycle() {
    let h = TestHarness::new().await;
    let (_, token) = h.admin().await;
    let app = build_test_router(h.state.clone());

    let created = post(
        &app,
        "/api/admin/roles",
        Some(&token),
        json!({
            "name": "Editor",
            "description": "Edits users",
            "permission_keys": ["users.edit"]
        }),
    )
    .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.data()["permissions"], json!(["users.edit"]));
    let id = created.data()["id"].as_str().unwrap().to_string();

    let replaced = put(
        &app,
        &format!("/api/admin/roles/{}/permissions", id),
        Some(&token),
        json!({ "permission_keys": ["users.view", "users.edit"] }),
    )
    .await;
    assert_eq!(replaced.status, StatusCode::OK);

    let fetched = get(&app, &format!("/api/admin/roles/{}", id), Some(&token)).await;
    assert_eq!(fetched.data()["permissions"], json!(["users.view", "users.edit"]));

    let renamed = put(
        &app,
        &format!("/api/admin/roles/{}", id),
        Some(&token),
        json!({ "name": "Senior Editor" }),
    )
    .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.data()["name"], "Senior Editor");
    assert_eq!(renamed.data()["description"], "Edits users");

    let deleted = delete(&app, &format!("/api/admin/roles/{}", id), Some(&token)).await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body.unwrap()["success"], true);

    let gone = get(&app, &format!("/api/admin/roles/{}", id), Some(&token)).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);

    let actions = h.audit.actions().await;
    assert_eq!(
        actions,
        vec![
            "role.create",
            "role.permissions.replace",
            "role.update",
            "role.delete"
        ]
    );
}

#[tokio::test]
async fn test_list_roles_with_assignees() {
    let h = TestHarness::new().await;
    let (_, token) = h.admin().await;
    h.member().await;
    h.member().await;
    let app = build_test_router(h.state.clone());

    let response = get(&app, "/api/admin/roles", Some(&token)).await;
    assert_eq!(response.status, StatusCode::OK);
    let roles = response.data().as_array().unwrap();
    let user = roles.iter().find(|r| r["name"] == "User").unwrap();
    assert_eq!(user["assigned_principals"], 2);
    assert_eq!(user["is_system"], true);
}

#[tokio::test]
async fn test_delete_system_role_conflicts() {
    let h = TestHarness::new().await;
    let (_, token) = h.admin().await;
    let admin_role = h.role_id(ADMIN_ROLE).await;
    let app = build_test_router(h.state.clone());

    let response = delete(&app, &format!("/api/admin/roles/{}", admin_role), Some(&token)).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    let body = response.body.unwrap();
    assert_eq!(body["error"], "system_role_protected");
    assert!(body["message"].as_str().unwrap().contains("Admin"));
}

#[tokio::test]
async fn test_delete_role_in_use_conflicts() {
    let h = TestHarness::new().await;
    let (_, token) = h.admin().await;
    let role = h.custom_role("Support", &["users.view"]).await;
    h.principal(Some(role)).await;
    let app = build_test_router(h.state.clone());

    let response = delete(&app, &format!("/api/admin/roles/{}", role), Some(&token)).await;
    assert_eq!(response.status, StatusCode::CONFLICT);
    let body = response.body.unwrap();
    assert_eq!(body["error"], "role_in_use");
    assert_eq!(body["details"]["assigned"], 1);
}

#[tokio::test]
async fn test_unknown_permission_key_rejected() {
    let h = TestHarness::new().await;
    let (_, token) = h.admin().await;
    let role = h.custom_role("Support", &["users.view"]).await;
    let app = build_test_router(h.state.clone());

    let response = put(
        &app,
        &format!("/api/admin/roles/{}/permissions", role),
        Some(&token),
        json!({ "permission_keys": ["users.view", "users.teleport"] }),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNPROCESSABLE_ENTITY);

    let fetched = get(&app, &format!("/api/admin/roles/{}", role), Some(&token)).await;
    assert_eq!(fetched.data()["permissions"], json!(["users.view"]));
}

#[tokio::test]
async fn test_duplicate_role_name_conflicts() {
    let h = TestHarness::new().await;
    let (_, token) = h.admin().await;
    let app = build_test_router(h.state.clone());

    let response = post(
        &app,
        "/api/admin/roles",
        Some(&token),
        json!({ "name": "User" }),
    )
    .await;
    assert_eq!(response.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_audit_failure_does_not_block_mutation() {
    let h = TestHarness::new().await;
    let (_, token) = h.admin().await;
    h.audit.set_failing(true);
    let app = build_test_router(h.state.clone());

    let response = post(
        &app,
        "/api/admin/roles",
        Some(&token),
        json!({ "name": "Auditor", "permission_keys": ["audit.view"] }),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert!(h.audit.actions().await.is_empty());
}
