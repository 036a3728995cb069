//! Authorization resolver
//!
//! Every enforcement point (edge gate, snapshot endpoint, mutation guards)
//! asks the same `AuthzContext`, so they cannot drift apart. A context is
//! built once per request and memoizes the principal's role and permission
//! set; nothing survives the request.

use crate::domain::{
    ModuleDefinition, ModuleRegistry, PermissionKey, Principal, Role, ADMIN_ROLE,
};
use crate::error::{AppError, Result};
use crate::jwt::IdentityProvider;
use crate::repository::{PrincipalRepository, RbacRepository, SettingsRepository};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Run a store call under the resolver's deadline.
///
/// Both a timeout and a store error become `StoreUnavailable`, which every
/// caller treats as a denial.
pub(crate) async fn bounded<T, F>(
    timeout: Duration,
    operation: &'static str,
    fut: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::warn!(operation, error = %e, "Authorization store call failed");
            Err(AppError::StoreUnavailable(format!("{} failed", operation)))
        }
        Err(_) => {
            metrics::counter!("toolhub_store_timeouts_total", "operation" => operation)
                .increment(1);
            tracing::warn!(
                operation,
                timeout_ms = timeout.as_millis() as u64,
                "Authorization store call timed out"
            );
            Err(AppError::StoreUnavailable(format!("{} timed out", operation)))
        }
    }
}

fn record_decision(query: &'static str, allowed: bool) {
    let outcome = if allowed { "allow" } else { "deny" };
    metrics::counter!("toolhub_authz_decisions_total", "query" => query, "outcome" => outcome)
        .increment(1);
}

/// Coarse state of the caller, as seen by the edge gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalState {
    Anonymous,
    Inactive,
    Member,
    Admin,
}

/// Serialized authorization view handed to the client-side UI gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthzSnapshot {
    pub principal_id: Option<Uuid>,
    pub role: Option<String>,
    pub is_admin: bool,
    pub permissions: Vec<PermissionKey>,
    pub visible_modules: Vec<String>,
}

#[derive(Debug, Default)]
struct Grants {
    role: Option<Role>,
    permissions: HashSet<PermissionKey>,
}

/// Builds request-scoped authorization contexts
pub struct AuthzService<P, R, S>
where
    P: PrincipalRepository,
    R: RbacRepository,
    S: SettingsRepository,
{
    principals: Arc<P>,
    rbac: Arc<R>,
    settings: Arc<S>,
    identity: Arc<dyn IdentityProvider>,
    modules: Arc<ModuleRegistry>,
    store_timeout: Duration,
}

impl<P, R, S> AuthzService<P, R, S>
where
    P: PrincipalRepository,
    R: RbacRepository,
    S: SettingsRepository,
{
    pub fn new(
        principals: Arc<P>,
        rbac: Arc<R>,
        settings: Arc<S>,
        identity: Arc<dyn IdentityProvider>,
        modules: Arc<ModuleRegistry>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            principals,
            rbac,
            settings,
            identity,
            modules,
            store_timeout,
        }
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn identity(&self) -> &dyn IdentityProvider {
        self.identity.as_ref()
    }

    /// Map a session token to a registered principal.
    ///
    /// Missing, invalid or expired tokens and unregistered identities are
    /// anonymous. Only a failing directory lookup is an error.
    pub async fn resolve_principal(&self, token: Option<&str>) -> Result<Option<Principal>> {
        let Some(token) = token else {
            return Ok(None);
        };
        let Some(identity) = self.identity.current_user(token).await else {
            return Ok(None);
        };

        bounded(
            self.store_timeout,
            "principal_lookup",
            self.principals.find_by_id(identity.id),
        )
        .await
    }

    /// Context for an already resolved principal
    pub fn context(&self, principal: Option<Principal>) -> AuthzContext<R, S> {
        AuthzContext {
            principal,
            rbac: self.rbac.clone(),
            settings: self.settings.clone(),
            modules: self.modules.clone(),
            store_timeout: self.store_timeout,
            grants: OnceCell::new(),
        }
    }

    /// Resolve the token and build the request context in one step
    pub async fn resolve(&self, token: Option<&str>) -> Result<AuthzContext<R, S>> {
        let principal = self.resolve_principal(token).await?;
        Ok(self.context(principal))
    }
}

/// Per-request authorization view of one principal
pub struct AuthzContext<R, S>
where
    R: RbacRepository,
    S: SettingsRepository,
{
    principal: Option<Principal>,
    rbac: Arc<R>,
    settings: Arc<S>,
    modules: Arc<ModuleRegistry>,
    store_timeout: Duration,
    grants: OnceCell<Grants>,
}

impl<R, S> AuthzContext<R, S>
where
    R: RbacRepository,
    S: SettingsRepository,
{
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    /// The principal, only when it may hold capabilities
    pub fn active_principal(&self) -> Option<&Principal> {
        self.principal.as_ref().filter(|p| p.is_active)
    }

    pub fn is_authenticated(&self) -> bool {
        self.active_principal().is_some()
    }

    /// Registry entry for `key`, regardless of visibility
    pub fn module(&self, key: &str) -> Option<&ModuleDefinition> {
        self.modules.get(key)
    }

    async fn grants(&self) -> Result<&Grants> {
        self.grants.get_or_try_init(|| self.load_grants()).await
    }

    async fn load_grants(&self) -> Result<Grants> {
        let Some(role_id) = self.active_principal().and_then(|p| p.role_id) else {
            return Ok(Grants::default());
        };

        let role = bounded(
            self.store_timeout,
            "role_lookup",
            self.rbac.find_role_by_id(role_id),
        )
        .await?;
        let Some(role) = role else {
            return Ok(Grants::default());
        };

        let raw_keys = bounded(
            self.store_timeout,
            "binding_lookup",
            self.rbac.find_role_permission_keys(role.id),
        )
        .await?;

        let mut permissions = HashSet::with_capacity(raw_keys.len());
        for raw in raw_keys {
            match raw.parse::<PermissionKey>() {
                Ok(key) => {
                    permissions.insert(key);
                }
                Err(e) => {
                    tracing::warn!(
                        event = "authz_config_invalid",
                        role = %role.name,
                        "Skipping bound permission: {}",
                        e
                    );
                }
            }
        }

        Ok(Grants {
            role: Some(role),
            permissions,
        })
    }

    /// Name of the assigned role, if any
    pub async fn role_name(&self) -> Result<Option<String>> {
        Ok(self.grants().await?.role.as_ref().map(|r| r.name.clone()))
    }

    /// Exact, case-sensitive role name match
    pub async fn has_role(&self, role_name: &str) -> Result<bool> {
        let allowed = self
            .grants()
            .await?
            .role
            .as_ref()
            .is_some_and(|r| r.name == role_name);
        record_decision("role", allowed);
        Ok(allowed)
    }

    pub async fn is_admin(&self) -> Result<bool> {
        self.has_role(ADMIN_ROLE).await
    }

    pub async fn has_permission(&self, key: PermissionKey) -> Result<bool> {
        let allowed = self.grants().await?.permissions.contains(&key);
        record_decision("permission", allowed);
        Ok(allowed)
    }

    /// Sorted permission set of the principal
    pub async fn permissions(&self) -> Result<Vec<PermissionKey>> {
        let sorted: BTreeSet<PermissionKey> =
            self.grants().await?.permissions.iter().copied().collect();
        Ok(sorted.into_iter().collect())
    }

    pub async fn state(&self) -> Result<PrincipalState> {
        match &self.principal {
            None => Ok(PrincipalState::Anonymous),
            Some(p) if !p.is_active => Ok(PrincipalState::Inactive),
            Some(_) if self.is_admin().await? => Ok(PrincipalState::Admin),
            Some(_) => Ok(PrincipalState::Member),
        }
    }

    /// Permission half of the visibility rule, after enablement passed
    async fn may_use(&self, module: &ModuleDefinition) -> Result<bool> {
        match module.required_key() {
            Ok(None) => Ok(true),
            Ok(Some(key)) => self.has_permission(key).await,
            Err(e) => {
                tracing::warn!(
                    event = "authz_config_invalid",
                    module = module.key,
                    "Module requires a permission outside the catalog, denying: {}",
                    e
                );
                Ok(false)
            }
        }
    }

    /// Enablement first, then the required permission.
    ///
    /// A disabled module is invisible to Admins as well. Unknown module keys
    /// are never visible, and neither is anything to an anonymous or inactive
    /// caller.
    pub async fn is_module_visible(&self, module_key: &str) -> Result<bool> {
        if self.active_principal().is_none() {
            record_decision("module", false);
            return Ok(false);
        }
        let Some(module) = self.modules.get(module_key) else {
            record_decision("module", false);
            return Ok(false);
        };

        let flag = bounded(
            self.store_timeout,
            "module_flag_lookup",
            self.settings.get(&module.enablement_key()),
        )
        .await?;

        if flag.is_some_and(|row| row.is_explicitly_false()) {
            record_decision("module", false);
            return Ok(false);
        }

        let visible = self.may_use(module).await?;
        record_decision("module", visible);
        Ok(visible)
    }

    /// All visible modules, reading every enablement flag in one call
    pub async fn visible_modules(&self) -> Result<Vec<&ModuleDefinition>> {
        if self.active_principal().is_none() {
            return Ok(Vec::new());
        }
        let rows = bounded(
            self.store_timeout,
            "module_flag_scan",
            self.settings.list_by_prefix("module:"),
        )
        .await?;
        let disabled: HashSet<String> = rows
            .into_iter()
            .filter(|row| row.is_explicitly_false())
            .map(|row| row.setting_key)
            .collect();

        let mut visible = Vec::new();
        for module in self.modules.all() {
            if disabled.contains(&module.enablement_key()) {
                continue;
            }
            if self.may_use(module).await? {
                visible.push(module);
            }
        }
        Ok(visible)
    }

    pub async fn snapshot(&self) -> Result<AuthzSnapshot> {
        let Some(principal) = self.active_principal() else {
            return Ok(AuthzSnapshot {
                principal_id: None,
                role: None,
                is_admin: false,
                permissions: Vec::new(),
                visible_modules: Vec::new(),
            });
        };

        Ok(AuthzSnapshot {
            principal_id: Some(principal.id),
            role: self.role_name().await?,
            is_admin: self.is_admin().await?,
            permissions: self.permissions().await?,
            visible_modules: self
                .visible_modules()
                .await?
                .into_iter()
                .map(|m| m.key.to_string())
                .collect(),
        })
    }
}
