//! Application state traits for dependency injection
//!
//! Handlers and middleware are generic over `HasServices`, so the same code
//! runs against MySQL in production and in-memory repositories in tests.

use crate::config::Config;
use crate::domain::ModuleRegistry;
use crate::jwt::IdentityProvider;
use crate::repository::audit::AuditRepositoryImpl;
use crate::repository::principal::PrincipalRepositoryImpl;
use crate::repository::rbac::RbacRepositoryImpl;
use crate::repository::system_settings::SettingsRepositoryImpl;
use crate::repository::{AuditRepository, PrincipalRepository, RbacRepository, SettingsRepository};
use crate::service::{
    AuthzContext, AuthzService, ModuleService, PrincipalService, RbacService, SettingsService,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Trait for application state that provides access to all services.
pub trait HasServices: Clone + Send + Sync + 'static {
    type PrincipalRepo: PrincipalRepository + 'static;
    type RbacRepo: RbacRepository + 'static;
    type SettingsRepo: SettingsRepository + 'static;
    type AuditRepo: AuditRepository + 'static;

    fn config(&self) -> &Config;

    fn authz_service(
        &self,
    ) -> &AuthzService<Self::PrincipalRepo, Self::RbacRepo, Self::SettingsRepo>;

    fn rbac_service(&self) -> &RbacService<Self::RbacRepo, Self::PrincipalRepo>;

    fn module_service(&self) -> &ModuleService<Self::SettingsRepo>;

    fn settings_service(&self) -> &SettingsService<Self::SettingsRepo>;

    fn principal_service(
        &self,
    ) -> &PrincipalService<Self::PrincipalRepo, Self::RbacRepo, Self::SettingsRepo>;

    fn audit_repo(&self) -> &Self::AuditRepo;

    /// Prometheus render handle, present when metrics are enabled
    fn metrics_handle(&self) -> Option<&PrometheusHandle>;

    /// Check if the backing store answers
    fn check_ready(&self) -> impl std::future::Future<Output = bool> + Send;
}

/// Request-scoped authorization context for a given state type
pub type StateAuthz<S> =
    AuthzContext<<S as HasServices>::RbacRepo, <S as HasServices>::SettingsRepo>;

struct Inner<P, R, S, A>
where
    P: PrincipalRepository,
    R: RbacRepository,
    S: SettingsRepository,
    A: AuditRepository,
{
    config: Config,
    principals: Arc<P>,
    audit: Arc<A>,
    authz: AuthzService<P, R, S>,
    rbac: RbacService<R, P>,
    modules: ModuleService<S>,
    settings: SettingsService<S>,
    principal_service: PrincipalService<P, R, S>,
    metrics: Option<PrometheusHandle>,
}

/// Application state wiring repositories into services
pub struct AppState<P, R, S, A>
where
    P: PrincipalRepository,
    R: RbacRepository,
    S: SettingsRepository,
    A: AuditRepository,
{
    inner: Arc<Inner<P, R, S, A>>,
}

impl<P, R, S, A> Clone for AppState<P, R, S, A>
where
    P: PrincipalRepository,
    R: RbacRepository,
    S: SettingsRepository,
    A: AuditRepository,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Production state backed by MySQL
pub type MySqlAppState = AppState<
    PrincipalRepositoryImpl,
    RbacRepositoryImpl,
    SettingsRepositoryImpl,
    AuditRepositoryImpl,
>;

impl<P, R, S, A> AppState<P, R, S, A>
where
    P: PrincipalRepository,
    R: RbacRepository,
    S: SettingsRepository,
    A: AuditRepository,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        principals: Arc<P>,
        rbac: Arc<R>,
        settings: Arc<S>,
        audit: Arc<A>,
        identity: Arc<dyn IdentityProvider>,
        modules: Arc<ModuleRegistry>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let authz = AuthzService::new(
            principals.clone(),
            rbac.clone(),
            settings.clone(),
            identity,
            modules.clone(),
            config.authz.store_timeout(),
        );
        let rbac_service = RbacService::new(rbac.clone(), principals.clone());
        let module_service = ModuleService::new(settings.clone(), modules);
        let settings_service = SettingsService::new(settings.clone());
        let principal_service = PrincipalService::new(principals.clone(), rbac, settings);

        Self {
            inner: Arc::new(Inner {
                config,
                principals,
                audit,
                authz,
                rbac: rbac_service,
                modules: module_service,
                settings: settings_service,
                principal_service,
                metrics,
            }),
        }
    }
}

impl<P, R, S, A> HasServices for AppState<P, R, S, A>
where
    P: PrincipalRepository + 'static,
    R: RbacRepository + 'static,
    S: SettingsRepository + 'static,
    A: AuditRepository + 'static,
{
    type PrincipalRepo = P;
    type RbacRepo = R;
    type SettingsRepo = S;
    type AuditRepo = A;

    fn config(&self) -> &Config {
        &self.inner.config
    }

    fn authz_service(&self) -> &AuthzService<P, R, S> {
        &self.inner.authz
    }

    fn rbac_service(&self) -> &RbacService<R, P> {
        &self.inner.rbac
    }

    fn module_service(&self) -> &ModuleService<S> {
        &self.inner.modules
    }

    fn settings_service(&self) -> &SettingsService<S> {
        &self.inner.settings
    }

    fn principal_service(&self) -> &PrincipalService<P, R, S> {
        &self.inner.principal_service
    }

    fn audit_repo(&self) -> &A {
        &self.inner.audit
    }

    fn metrics_handle(&self) -> Option<&PrometheusHandle> {
        self.inner.metrics.as_ref()
    }

    async fn check_ready(&self) -> bool {
        let timeout = self.inner.config.authz.store_timeout();
        matches!(
            tokio::time::timeout(timeout, self.inner.principals.ping()).await,
            Ok(Ok(()))
        )
    }
}
