/// Memberships
///
/// Revoking a membership keeps the row with status `revoked`, and from then
/// on the guard no longer finds an active membership for that user. The
/// org's last active Admin membership can't be revoked, and adding a member
/// fails once the org's plan is at `max_members`; both are Conflicts raised
/// by the store inside the same write.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{RequestContext, ServiceError, ServiceResult};
use crate::auth::authorization::AuthorizationGuard;
use crate::auth::capability;
use crate::models::membership::{CreateMembership, MemberSummary, Membership};
use crate::models::user::normalize_email;
use crate::pagination::{Page, PageRequest};
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMember {
    /// Email of an existing user
    pub email: String,
    pub role_id: Uuid,
}

#[derive(Clone)]
pub struct MemberService {
    store: Arc<dyn Store>,
    guard: AuthorizationGuard,
}

impl MemberService {
    pub fn new(store: Arc<dyn Store>, guard: AuthorizationGuard) -> Self {
        Self { store, guard }
    }

    pub async fn list_members(
        &self,
        ctx: &RequestContext,
        page: &PageRequest,
    ) -> ServiceResult<Page<MemberSummary>> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::MEMBERS_READ)
            .await?;

        Ok(self.store.list_members(org_id, page).await?)
    }

    pub async fn add_member(&self, ctx: &RequestContext, input: NewMember) -> ServiceResult<Membership> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::MEMBERS_MANAGE)
            .await?;

        let user = self
            .store
            .find_user_by_email(&normalize_email(&input.email))
            .await?
            .ok_or(ServiceError::NotFound("user"))?;

        let membership = self
            .store
            .add_member(CreateMembership {
                org_id,
                user_id: user.id,
                role_id: input.role_id,
            })
            .await?;

        info!(
            org_id = %org_id,
            user_id = %user.id,
            role_id = %input.role_id,
            "Member added"
        );
        Ok(membership)
    }

    pub async fn revoke_member(
        &self,
        ctx: &RequestContext,
        membership_id: Uuid,
    ) -> ServiceResult<Membership> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::MEMBERS_MANAGE)
            .await?;

        let membership = self
            .store
            .revoke_membership(org_id, membership_id)
            .await?
            .ok_or(ServiceError::NotFound("membership"))?;

        info!(
            org_id = %org_id,
            membership_id = %membership_id,
            user_id = %membership.user_id,
            "Membership revoked"
        );
        Ok(membership)
    }
}
