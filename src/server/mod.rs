//! Server initialization and routing

use crate::api;
use crate::config::Config;
use crate::domain::ModuleRegistry;
use crate::jwt::JwtManager;
use crate::middleware::edge_gate_middleware;
use crate::repository::{
    audit::AuditRepositoryImpl, principal::PrincipalRepositoryImpl, rbac::RbacRepositoryImpl,
    system_settings::SettingsRepositoryImpl,
};
use crate::state::{HasServices, MySqlAppState};
use anyhow::Result;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Reconcile durable authorization data with this build.
///
/// Appends missing catalog permissions, creates the system roles when
/// absent, and reports module requirements that name no known permission.
/// Problems are logged; none of them stop the server.
pub async fn bootstrap<S: HasServices>(state: &S) -> Result<()> {
    let report = state.rbac_service().sync_catalog().await?;
    if !report.unknown.is_empty() {
        tracing::warn!(
            event = "authz_config_invalid",
            unknown = ?report.unknown,
            "Durable catalog holds permissions this build does not define"
        );
    }

    let roles = state.rbac_service().ensure_system_roles().await?;
    info!(admin = %roles.admin.id, user = %roles.user.id, "System roles ready");

    for (module, key) in state.module_service().registry().dangling_permissions() {
        tracing::warn!(
            event = "authz_config_invalid",
            module,
            permission = key,
            "Module requires an unknown permission and will be hidden from everyone"
        );
    }

    Ok(())
}

/// Run the HTTP server against MySQL
pub async fn run(config: Config, metrics: Option<PrometheusHandle>) -> Result<()> {
    if config.run_migrations {
        crate::migration::run_migrations(&config).await?;
    }

    let db_pool = MySqlPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database.url)
        .await?;

    info!("Connected to database");

    let principal_repo = Arc::new(PrincipalRepositoryImpl::new(db_pool.clone()));
    let rbac_repo = Arc::new(RbacRepositoryImpl::new(db_pool.clone()));
    let settings_repo = Arc::new(SettingsRepositoryImpl::new(db_pool.clone()));
    let audit_repo = Arc::new(AuditRepositoryImpl::new(db_pool.clone()));

    let identity = Arc::new(JwtManager::new(config.session.clone()));
    let modules = Arc::new(ModuleRegistry::builtin());

    let state: MySqlAppState = MySqlAppState::new(
        config.clone(),
        principal_repo,
        rbac_repo,
        settings_repo,
        audit_repo,
        identity,
        modules,
        metrics,
    );

    bootstrap(&state).await?;

    let app = build_router(state);

    let http_addr = config.http_addr();
    let listener = TcpListener::bind(&http_addr).await?;
    info!("HTTP server started on {}", http_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db_pool.close().await;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// Build the HTTP router with generic state type
///
/// Generic over the state so the same routes run against MySQL in
/// production and in-memory repositories in tests. The edge gate wraps
/// every route, including the fallback.
pub fn build_router<S: HasServices>(state: S) -> Router {
    Router::new()
        // Health and metrics
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready::<S>))
        .route("/metrics", get(api::health::metrics::<S>))
        // Session bootstrap
        .route("/api/auth/register", post(api::auth::register::<S>))
        .route("/api/auth/login", post(api::auth::login::<S>))
        // Caller's view
        .route("/api/me/authz", get(api::me::authz::<S>))
        .route("/api/modules", get(api::module::list_visible::<S>))
        .route("/api/modules/{key}", get(api::module::get_visible::<S>))
        // Permission-gated administration
        .route("/api/users", get(api::user::list::<S>))
        .route(
            "/api/users/{id}/deactivate",
            post(api::user::deactivate::<S>),
        )
        .route("/api/audit-logs", get(api::audit::list::<S>))
        // Admin console
        .route("/api/admin/modules", get(api::module::list_all::<S>))
        .route("/api/admin/modules/{key}", put(api::module::set_enabled::<S>))
        .route(
            "/api/admin/settings",
            get(api::system_settings::get::<S>).put(api::system_settings::update::<S>),
        )
        .route(
            "/api/admin/permissions",
            get(api::role::list_permissions::<S>),
        )
        .route(
            "/api/admin/roles",
            get(api::role::list_roles::<S>).post(api::role::create_role::<S>),
        )
        .route(
            "/api/admin/roles/{id}",
            get(api::role::get_role::<S>)
                .put(api::role::update_role::<S>)
                .delete(api::role::delete_role::<S>),
        )
        .route(
            "/api/admin/roles/{id}/permissions",
            put(api::role::set_role_permissions::<S>),
        )
        .route(
            "/api/admin/users/{id}/role",
            put(api::user::assign_role::<S>),
        )
        .layer(from_fn_with_state(state.clone(), edge_gate_middleware::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
