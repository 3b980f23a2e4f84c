/// Permission model
///
/// The capability catalog is global. Roles belong to one org and hold a set
/// of catalog entries. The Admin role an org receives at creation holds the
/// catalog as it was at that moment; capabilities added to the catalog later
/// reach existing orgs only through [`PermissionService::grant_permission`].
///
/// Holding `roles.manage` does not let a caller hand out more than they
/// have: every capability put on a role must also be held by the caller's
/// own role in that org.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::{RequestContext, ServiceError, ServiceResult};
use crate::auth::authorization::AuthorizationGuard;
use crate::auth::capability;
use crate::models::permission::{CreateRole, Permission, RoleWithCapabilities};
use crate::store::Store;

#[derive(Clone)]
pub struct PermissionService {
    store: Arc<dyn Store>,
    guard: AuthorizationGuard,
}

impl PermissionService {
    pub fn new(store: Arc<dyn Store>, guard: AuthorizationGuard) -> Self {
        Self { store, guard }
    }

    /// The full catalog as of now, used to seed a new org's Admin role
    ///
    /// Configuration error when the catalog is empty.
    pub async fn admin_snapshot(&self) -> ServiceResult<Vec<Permission>> {
        let catalog = self.store.list_permissions().await?;
        if catalog.is_empty() {
            return Err(ServiceError::Configuration(
                "permission catalog is empty".to_string(),
            ));
        }
        Ok(catalog)
    }

    /// Capabilities granted to any role of the org
    pub async fn capabilities_for_org(&self, ctx: &RequestContext) -> ServiceResult<Vec<String>> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::MEMBERS_READ)
            .await?;

        Ok(self.store.org_capabilities(org_id).await?)
    }

    pub async fn list_roles(&self, ctx: &RequestContext) -> ServiceResult<Vec<RoleWithCapabilities>> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::MEMBERS_READ)
            .await?;

        Ok(self.store.list_roles(org_id).await?)
    }

    pub async fn create_role(
        &self,
        ctx: &RequestContext,
        name: &str,
        capabilities: &[String],
    ) -> ServiceResult<RoleWithCapabilities> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::ROLES_MANAGE)
            .await?;

        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::validation("name", "Role name is required"));
        }

        let permission_ids = self.resolve(capabilities).await?;
        self.ensure_held(ctx, org_id, capabilities).await?;
        let role = self
            .store
            .create_role(
                CreateRole {
                    org_id,
                    name: name.to_string(),
                    is_system: false,
                },
                &permission_ids,
            )
            .await?;

        info!(org_id = %org_id, role_id = %role.role.id, "Role created");
        Ok(role)
    }

    /// Adds capabilities to a role of the org
    pub async fn grant_permission(
        &self,
        ctx: &RequestContext,
        role_id: Uuid,
        capabilities: &[String],
    ) -> ServiceResult<RoleWithCapabilities> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::ROLES_MANAGE)
            .await?;

        if capabilities.is_empty() {
            return Err(ServiceError::validation(
                "capabilities",
                "At least one capability is required",
            ));
        }

        let permission_ids = self.resolve(capabilities).await?;
        self.ensure_held(ctx, org_id, capabilities).await?;
        let role = self
            .store
            .grant_permissions(org_id, role_id, &permission_ids)
            .await?
            .ok_or(ServiceError::NotFound("role"))?;

        info!(
            org_id = %org_id,
            role_id = %role_id,
            granted = ?capabilities,
            "Permissions granted"
        );
        Ok(role)
    }

    /// Denies the first capability the caller's own role lacks
    async fn ensure_held(
        &self,
        ctx: &RequestContext,
        org_id: Uuid,
        capabilities: &[String],
    ) -> ServiceResult<()> {
        for name in capabilities {
            self.guard.authorize(ctx.caller, Some(org_id), name).await?;
        }
        Ok(())
    }

    /// Maps capability names to catalog IDs, rejecting names not in the catalog
    async fn resolve(&self, capabilities: &[String]) -> ServiceResult<Vec<Uuid>> {
        let catalog = self.store.list_permissions().await?;

        capabilities
            .iter()
            .map(|name| {
                catalog
                    .iter()
                    .find(|p| &p.name == name)
                    .map(|p| p.id)
                    .ok_or_else(|| {
                        ServiceError::validation("capabilities", format!("Unknown capability: {}", name))
                    })
            })
            .collect()
    }
}
