//! Authorization resolver and administration properties, exercised through
//! the services wired into the application state.

use super::TestHarness;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::time::Duration;
use toolhub_core::domain::{
    CreateRoleInput, PermissionKey, UpdateRoleInput, ADMIN_ROLE, USER_ROLE,
};
use toolhub_core::error::AppError;
use toolhub_core::policy::{require_admin, require_permission};
use toolhub_core::repository::{RbacRepository, SettingsRepository};
use toolhub_core::server::bootstrap;
use toolhub_core::state::HasServices;
use uuid::Uuid;

fn keys(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|k| k.to_string()).collect()
}

// ============================================================================
// Role and permission resolution
// ============================================================================

#[tokio::test]
async fn test_roleless_principal_has_nothing() {
    let h = TestHarness::new().await;
    let (principal, _) = h.principal(None).await;
    let ctx = h.context(principal.id).await;

    assert!(!ctx.has_role(ADMIN_ROLE).await.unwrap());
    assert!(!ctx.has_role(USER_ROLE).await.unwrap());
    for key in PermissionKey::ALL {
        assert!(!ctx.has_permission(*key).await.unwrap(), "{} granted", key);
    }
    assert!(ctx.permissions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_editor_scenario() {
    let h = TestHarness::new().await;
    let editor = h.custom_role("Editor", &["users.edit"]).await;
    let (principal, _) = h.principal(Some(editor)).await;
    let ctx = h.context(principal.id).await;

    assert!(ctx.has_permission(PermissionKey::UsersEdit).await.unwrap());
    assert!(!ctx.has_permission(PermissionKey::UsersDelete).await.unwrap());
    assert!(!ctx.has_role(ADMIN_ROLE).await.unwrap());
    assert!(ctx.has_role("Editor").await.unwrap());
    assert!(!ctx.has_role("editor").await.unwrap());
}

#[tokio::test]
async fn test_inactive_principal_loses_capabilities() {
    let h = TestHarness::new().await;
    let (admin, _) = h.admin().await;
    h.state
        .principal_service()
        .deactivate(Uuid::new_v4(), true, admin.id)
        .await
        .unwrap();

    let ctx = h.context(admin.id).await;
    assert!(!ctx.is_authenticated());
    assert!(!ctx.is_admin().await.unwrap());
    assert!(matches!(
        require_admin(&ctx).await,
        Err(AppError::Unauthorized(_))
    ));
    // Ungated modules too: every query agrees with the empty snapshot
    assert!(!ctx.is_module_visible("json-formatter").await.unwrap());
    assert!(ctx.visible_modules().await.unwrap().is_empty());
    assert!(ctx.snapshot().await.unwrap().visible_modules.is_empty());
}

#[tokio::test]
async fn test_admin_passes_permission_guards() {
    let h = TestHarness::new().await;
    let (admin, _) = h.admin().await;
    // Strip every binding: the role itself is what counts
    let admin_role = h.role_id(ADMIN_ROLE).await;
    h.state
        .rbac_service()
        .set_role_permissions(admin_role, &[])
        .await
        .unwrap();

    let ctx = h.context(admin.id).await;
    assert!(require_permission(&ctx, PermissionKey::AuditView).await.is_ok());
}

// ============================================================================
// Role administration
// ============================================================================

#[tokio::test]
async fn test_replace_then_read_round_trip() {
    let h = TestHarness::new().await;
    let role = h.custom_role("Support", &["users.view"]).await;

    let replaced = h
        .state
        .rbac_service()
        .set_role_permissions(role, &keys(&["audit.view", "users.edit", "audit.view"]))
        .await
        .unwrap();
    assert_eq!(
        replaced.permissions,
        vec![PermissionKey::UsersEdit, PermissionKey::AuditView]
    );

    let read = h
        .state
        .rbac_service()
        .get_role_with_permissions(role)
        .await
        .unwrap();
    assert_eq!(read.permissions, replaced.permissions);

    let (principal, _) = h.principal(Some(role)).await;
    let ctx = h.context(principal.id).await;
    assert!(!ctx.has_permission(PermissionKey::UsersView).await.unwrap());
    assert!(ctx.has_permission(PermissionKey::AuditView).await.unwrap());
}

#[tokio::test]
async fn test_replace_with_unknown_key_leaves_bindings() {
    let h = TestHarness::new().await;
    let role = h.custom_role("Support", &["users.view"]).await;

    let result = h
        .state
        .rbac_service()
        .set_role_permissions(role, &keys(&["users.edit", "users.fly"]))
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));

    let read = h
        .state
        .rbac_service()
        .get_role_with_permissions(role)
        .await
        .unwrap();
    assert_eq!(read.permissions, vec![PermissionKey::UsersView]);
}

#[tokio::test]
async fn test_system_roles_cannot_be_deleted() {
    let h = TestHarness::new().await;
    for name in [ADMIN_ROLE, USER_ROLE] {
        let id = h.role_id(name).await;
        let result = h.state.rbac_service().delete_role(id).await;
        assert!(
            matches!(result, Err(AppError::SystemRoleProtected(ref n)) if n == name),
            "{} was deletable",
            name
        );
    }
}

#[tokio::test]
async fn test_system_roles_cannot_be_renamed() {
    let h = TestHarness::new().await;
    let id = h.role_id(USER_ROLE).await;

    let result = h
        .state
        .rbac_service()
        .update_role(
            id,
            UpdateRoleInput {
                name: Some("Member".to_string()),
                description: None,
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::SystemRoleProtected(_))));

    // Description edits are fine
    let updated = h
        .state
        .rbac_service()
        .update_role(
            id,
            UpdateRoleInput {
                name: None,
                description: Some("Everyone".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.description.as_deref(), Some("Everyone"));
}

#[tokio::test]
async fn test_role_in_use_blocks_delete() {
    let h = TestHarness::new().await;
    let role = h.custom_role("Support", &["users.view", "audit.view"]).await;
    let (principal, _) = h.principal(Some(role)).await;

    let result = h.state.rbac_service().delete_role(role).await;
    assert!(matches!(
        result,
        Err(AppError::RoleInUse { assigned: 1, .. })
    ));

    h.state
        .principal_service()
        .assign_role(principal.id, None)
        .await
        .unwrap();
    let deleted = h.state.rbac_service().delete_role(role).await.unwrap();
    assert_eq!(deleted.name, "Support");
    assert_eq!(h.rbac.binding_count(role).await, 0);
    assert!(h.rbac.find_role_by_id(role).await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_role_rejects_unknown_keys_before_insert() {
    let h = TestHarness::new().await;
    let result = h
        .state
        .rbac_service()
        .create_role(CreateRoleInput {
            name: "Ghost".to_string(),
            description: None,
            permission_keys: Some(keys(&["users.haunt"])),
        })
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(h.rbac.find_role_by_name("Ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_failed_create_leaves_no_role_behind() {
    let h = TestHarness::new().await;
    // Known to the code, missing from the durable catalog
    h.rbac.remove_catalog_entry("quiz.manage").await;

    let result = h
        .state
        .rbac_service()
        .create_role(CreateRoleInput {
            name: "Quizmaster".to_string(),
            description: None,
            permission_keys: Some(keys(&["users.view", "quiz.manage"])),
        })
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(h
        .rbac
        .find_role_by_name("Quizmaster")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_readers_never_see_partial_set() {
    let h = TestHarness::new().await;
    let role = h.custom_role("Rotating", &["users.view", "users.edit"]).await;
    let (principal, _) = h.principal(Some(role)).await;

    let set_a: HashSet<PermissionKey> = [PermissionKey::UsersView, PermissionKey::UsersEdit].into();
    let set_b: HashSet<PermissionKey> = [
        PermissionKey::AuditView,
        PermissionKey::UsersDelete,
        PermissionKey::ToolsDnsAccess,
    ]
    .into();

    let writer_state = h.state.clone();
    let writer = tokio::spawn(async move {
        for i in 0..200 {
            let next = if i % 2 == 0 {
                keys(&["audit.view", "users.delete", "tools.dns.access"])
            } else {
                keys(&["users.view", "users.edit"])
            };
            writer_state
                .rbac_service()
                .set_role_permissions(role, &next)
                .await
                .unwrap();
            tokio::task::yield_now().await;
        }
    });

    let mut readers = Vec::new();
    for _ in 0..4 {
        let state = h.state.clone();
        let principal = principal.clone();
        let (a, b) = (set_a.clone(), set_b.clone());
        readers.push(tokio::spawn(async move {
            for _ in 0..200 {
                let ctx = state.authz_service().context(Some(principal.clone()));
                let seen: HashSet<PermissionKey> =
                    ctx.permissions().await.unwrap().into_iter().collect();
                assert!(seen == a || seen == b, "partial set observed: {:?}", seen);
                tokio::task::yield_now().await;
            }
        }));
    }

    writer.await.unwrap();
    for reader in readers {
        reader.await.unwrap();
    }
}

// ============================================================================
// Module visibility
// ============================================================================

#[tokio::test]
async fn test_disabled_module_invisible_even_to_admin() {
    let h = TestHarness::new().await;
    let (admin, _) = h.admin().await;
    h.state
        .module_service()
        .set_module_enabled("dns-lookup", false, None)
        .await
        .unwrap();

    let ctx = h.context(admin.id).await;
    assert!(ctx.has_permission(PermissionKey::ToolsDnsAccess).await.unwrap());
    assert!(!ctx.is_module_visible("dns-lookup").await.unwrap());
    let visible: Vec<&str> = ctx
        .visible_modules()
        .await
        .unwrap()
        .into_iter()
        .map(|m| m.key)
        .collect();
    assert!(!visible.contains(&"dns-lookup"));
}

#[tokio::test]
async fn test_ungated_module_visible_without_record() {
    let h = TestHarness::new().await;
    let (principal, _) = h.principal(None).await;
    let ctx = h.context(principal.id).await;

    assert!(h.settings.raw("module:json-formatter:enabled").await.is_none());
    assert!(ctx.is_module_visible("json-formatter").await.unwrap());
    assert!(!ctx.is_module_visible("whois-lookup").await.unwrap());
    assert!(!ctx.is_module_visible("no-such-tool").await.unwrap());
}

#[tokio::test]
async fn test_whois_disabled_scenario() {
    let h = TestHarness::new().await;
    let (member, _) = h.member().await;

    assert!(h.context(member.id).await.is_module_visible("whois-lookup").await.unwrap());

    h.state
        .module_service()
        .set_module_enabled("whois-lookup", false, None)
        .await
        .unwrap();

    let ctx = h.context(member.id).await;
    assert!(ctx.has_permission(PermissionKey::ToolsWhoisAccess).await.unwrap());
    assert!(!ctx.is_module_visible("whois-lookup").await.unwrap());
    assert!(ctx.is_module_visible("dns-lookup").await.unwrap());
}

#[tokio::test]
async fn test_toggle_off_and_on_restores_visibility() {
    let h = TestHarness::new().await;
    let (member, _) = h.member().await;
    let before = h.context(member.id).await.is_module_visible("ssl-checker").await.unwrap();

    let modules = h.state.module_service();
    modules.set_module_enabled("ssl-checker", false, None).await.unwrap();
    assert!(!h.context(member.id).await.is_module_visible("ssl-checker").await.unwrap());
    modules.set_module_enabled("ssl-checker", true, None).await.unwrap();

    let after = h.context(member.id).await.is_module_visible("ssl-checker").await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_toggle_same_value_skips_write() {
    let h = TestHarness::new().await;
    let modules = h.state.module_service();

    let first = modules.set_module_enabled("pdf-merge", true, None).await.unwrap();
    assert!(!first.changed());
    assert_eq!(h.settings.write_count(), 0);

    modules.set_module_enabled("pdf-merge", false, None).await.unwrap();
    let again = modules.set_module_enabled("pdf-merge", false, None).await.unwrap();
    assert!(!again.changed());
    assert_eq!(h.settings.write_count(), 1);

    assert!(matches!(
        modules.set_module_enabled("no-such-tool", false, None).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_non_boolean_flag_counts_as_enabled() {
    let h = TestHarness::new().await;
    let (member, _) = h.member().await;
    h.settings
        .put_raw("module:dns-lookup:enabled", serde_json::json!("false"))
        .await;

    assert!(h.context(member.id).await.is_module_visible("dns-lookup").await.unwrap());
}

// ============================================================================
// Store failures
// ============================================================================

#[tokio::test]
async fn test_store_timeout_denies() {
    let h = TestHarness::new().await;
    let (admin, _) = h.admin().await;
    h.rbac.set_delay(Some(Duration::from_secs(10))).await;

    let ctx = h.context(admin.id).await;
    let result = require_admin(&ctx).await;
    assert!(matches!(result, Err(AppError::StoreUnavailable(_))));
    assert!(ctx.snapshot().await.is_err());
}

// ============================================================================
// Bootstrap
// ============================================================================

#[tokio::test]
async fn test_bootstrap_is_idempotent() {
    let h = TestHarness::new().await;
    let catalog_before = h.rbac.list_catalog().await.unwrap().len();
    let admin_before = h.role_id(ADMIN_ROLE).await;

    bootstrap(&h.state).await.unwrap();

    assert_eq!(h.rbac.list_catalog().await.unwrap().len(), catalog_before);
    assert_eq!(catalog_before, PermissionKey::ALL.len());
    assert_eq!(h.role_id(ADMIN_ROLE).await, admin_before);
}

#[tokio::test]
async fn test_catalog_sync_keeps_unknown_rows() {
    let h = TestHarness::new().await;
    h.rbac.add_raw_catalog_entry("legacy.reports.view").await;

    let report = h.state.rbac_service().sync_catalog().await.unwrap();
    assert!(report.inserted.is_empty());
    assert_eq!(report.unknown, vec!["legacy.reports.view".to_string()]);
    assert_eq!(
        h.rbac.list_catalog().await.unwrap().len(),
        PermissionKey::ALL.len() + 1
    );
}

#[tokio::test]
async fn test_default_user_grants() {
    let h = TestHarness::new().await;
    let (member, _) = h.member().await;
    let ctx = h.context(member.id).await;

    assert_eq!(
        ctx.permissions().await.unwrap(),
        PermissionKey::default_user_grants()
    );
    assert!(!ctx.has_permission(PermissionKey::UsersView).await.unwrap());
}

#[tokio::test]
async fn test_global_toggles_default_on() {
    let h = TestHarness::new().await;
    let settings = h.state.settings_service();
    assert!(settings.is_registration_allowed().await.unwrap());
    assert!(settings.is_login_allowed().await.unwrap());
    assert!(h.settings.get("allow_login").await.unwrap().is_none());
}
