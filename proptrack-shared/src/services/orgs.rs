/// Org creation workflow and org settings
///
/// # Creating an org
///
/// 1. Resolve the plan: the one named, or the catalog's starter plan
/// 2. Snapshot the capability catalog
/// 3. In one unit: the org row, its Admin role holding the snapshot, and the
///    creator's active membership through that role
///
/// Steps 1 and 2 fail with a configuration error before anything is written.
/// Step 3 is all or nothing, so an org can never exist without an admin.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::permissions::PermissionService;
use super::{RequestContext, ServiceError, ServiceResult};
use crate::auth::authorization::AuthorizationGuard;
use crate::auth::capability;
use crate::models::org::{CreateOrg, Org, UpdateOrg, UserOrg};
use crate::store::{OrgBootstrap, Store};

/// Longest accepted slug
pub const MAX_SLUG_LENGTH: usize = 63;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrg {
    pub name: String,
    pub slug: String,
    /// Falls back to the starter plan
    pub plan_id: Option<uuid::Uuid>,
}

/// Lowercase ASCII letters, digits and inner hyphens
pub fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= MAX_SLUG_LENGTH
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Derives a slug from a display name
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let mut slug = slug.trim_end_matches('-').to_string();
    slug.truncate(MAX_SLUG_LENGTH);
    slug.trim_end_matches('-').to_string()
}

#[derive(Clone)]
pub struct OrgService {
    store: Arc<dyn Store>,
    guard: AuthorizationGuard,
    permissions: PermissionService,
}

impl OrgService {
    pub fn new(
        store: Arc<dyn Store>,
        guard: AuthorizationGuard,
        permissions: PermissionService,
    ) -> Self {
        Self {
            store,
            guard,
            permissions,
        }
    }

    /// Self-service: any authenticated caller may create an org
    pub async fn create_org(&self, ctx: &RequestContext, input: NewOrg) -> ServiceResult<OrgBootstrap> {
        let owner_id = ctx.caller()?;

        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::validation("name", "Org name is required"));
        }
        if !is_valid_slug(&input.slug) {
            return Err(ServiceError::validation(
                "slug",
                "Slug must be lowercase letters, digits and hyphens",
            ));
        }

        let plan = match input.plan_id {
            Some(plan_id) => self.store.find_plan(plan_id).await?.ok_or_else(|| {
                ServiceError::Configuration(format!("plan {} does not exist", plan_id))
            })?,
            None => self.store.find_starter_plan().await?.ok_or_else(|| {
                ServiceError::Configuration("no starter plan is configured".to_string())
            })?,
        };

        let grants = self.permissions.admin_snapshot().await?;

        let bootstrap = self
            .store
            .create_org_with_admin(
                CreateOrg {
                    name,
                    slug: input.slug,
                    plan_id: plan.id,
                },
                owner_id,
                &grants,
            )
            .await?;

        info!(
            org_id = %bootstrap.org.id,
            owner_id = %owner_id,
            plan = %plan.name,
            capabilities = bootstrap.admin_role.capabilities.len(),
            "Org created"
        );

        Ok(bootstrap)
    }

    /// Orgs where the caller holds an active membership
    pub async fn list_my_orgs(&self, ctx: &RequestContext) -> ServiceResult<Vec<UserOrg>> {
        let user_id = ctx.caller()?;
        Ok(self.store.list_orgs_for_user(user_id).await?)
    }

    pub async fn get_org(&self, ctx: &RequestContext) -> ServiceResult<Org> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::ORGS_READ)
            .await?;

        self.store
            .find_org(org_id)
            .await?
            .ok_or(ServiceError::NotFound("org"))
    }

    pub async fn update_org(&self, ctx: &RequestContext, data: UpdateOrg) -> ServiceResult<Org> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::ORGS_MANAGE)
            .await?;

        if matches!(&data.name, Some(name) if name.trim().is_empty()) {
            return Err(ServiceError::validation("name", "Org name cannot be empty"));
        }

        self.store
            .update_org(org_id, data)
            .await?
            .ok_or(ServiceError::NotFound("org"))
    }
}
