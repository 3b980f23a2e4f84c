/// Authorization guard
///
/// Every tenant-scoped operation asks the guard before touching data. The
/// decision only reads from the store and never writes.
///
/// # Decision order
///
/// 1. No capability required: allow
/// 2. No org in the request: deny with `MissingContext(Org)`
/// 3. No caller: deny with `MissingContext(Caller)`
/// 4. No active membership of the caller in that org: deny with `NoMembership`
/// 5. The membership's role lacks the capability: deny with
///    `InsufficientPermission`
/// 6. Otherwise allow
///
/// Only the membership for the requested org is consulted, so a role held in
/// one org never grants anything in another.
///
/// # Example
///
/// ```no_run
/// use proptrack_shared::auth::authorization::{AuthorizationGuard, Decision};
/// use proptrack_shared::auth::capability;
/// use proptrack_shared::store::{MemoryStore, Store};
/// use std::sync::Arc;
/// use uuid::Uuid;
///
/// # async fn example(caller: Uuid, org_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let store: Arc<dyn Store> = Arc::new(MemoryStore::seeded());
/// let guard = AuthorizationGuard::new(store);
///
/// let decision = guard
///     .check_permission(Some(caller), Some(org_id), Some(capability::DOCUMENTS_READ))
///     .await?;
/// assert!(matches!(decision, Decision::Deny(_)));
/// # Ok(())
/// # }
/// ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::store::{Store, StoreError};

/// What a request was missing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingContext {
    /// No authenticated user
    Caller,

    /// No org named in path, query or body
    Org,
}

/// Why a request was denied
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DenyReason {
    MissingContext(MissingContext),
    NoMembership,
    InsufficientPermission(String),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::MissingContext(MissingContext::Caller) => {
                write!(f, "authentication required")
            }
            DenyReason::MissingContext(MissingContext::Org) => write!(f, "org_id is required"),
            DenyReason::NoMembership => write!(f, "not a member of this org"),
            DenyReason::InsufficientPermission(capability) => {
                write!(f, "missing permission: {}", capability)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Error type for [`AuthorizationGuard::authorize`]
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("{0}")]
    Denied(DenyReason),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Picks the most specific org identifier a request carries
pub fn resolve_org_id(path: Option<Uuid>, query: Option<Uuid>, body: Option<Uuid>) -> Option<Uuid> {
    path.or(query).or(body)
}

#[derive(Clone)]
pub struct AuthorizationGuard {
    store: Arc<dyn Store>,
}

impl AuthorizationGuard {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn check_permission(
        &self,
        caller: Option<Uuid>,
        org_id: Option<Uuid>,
        required: Option<&str>,
    ) -> Result<Decision, StoreError> {
        let Some(required) = required else {
            return Ok(Decision::Allow);
        };

        let Some(org_id) = org_id else {
            return Ok(Decision::Deny(DenyReason::MissingContext(MissingContext::Org)));
        };

        let Some(caller) = caller else {
            return Ok(Decision::Deny(DenyReason::MissingContext(MissingContext::Caller)));
        };

        let Some(membership) = self.store.find_active_membership(org_id, caller).await? else {
            debug!(org_id = %org_id, user_id = %caller, "Denied: no active membership");
            return Ok(Decision::Deny(DenyReason::NoMembership));
        };

        let capabilities = self
            .store
            .role_capabilities(org_id, membership.role_id)
            .await?;

        if capabilities.iter().any(|c| c == required) {
            Ok(Decision::Allow)
        } else {
            debug!(
                org_id = %org_id,
                user_id = %caller,
                capability = required,
                "Denied: insufficient permission"
            );
            Ok(Decision::Deny(DenyReason::InsufficientPermission(
                required.to_string(),
            )))
        }
    }

    /// Requires `capability` in the org and returns the org ID on allow
    pub async fn authorize(
        &self,
        caller: Option<Uuid>,
        org_id: Option<Uuid>,
        capability: &str,
    ) -> Result<Uuid, AuthzError> {
        match self.check_permission(caller, org_id, Some(capability)).await? {
            Decision::Allow => org_id.ok_or(AuthzError::Denied(DenyReason::MissingContext(
                MissingContext::Org,
            ))),
            Decision::Deny(reason) => Err(AuthzError::Denied(reason)),
        }
    }
}
