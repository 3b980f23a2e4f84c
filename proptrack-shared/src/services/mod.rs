/// Use-case operations
///
/// Each service holds the injected [`Store`] and an [`AuthorizationGuard`]
/// built on the same store. Every tenant-scoped operation asks the guard
/// first and only touches data after an allow, so a denied request never
/// learns whether the rows it asked for exist.
///
/// # Services
///
/// - [`users::UserService`]: Registration, login, token refresh, profile
/// - [`orgs::OrgService`]: Org creation workflow and org settings
/// - [`permissions::PermissionService`]: Capability catalog and roles
/// - [`members::MemberService`]: Memberships
/// - [`documents::DocumentService`]: Documents
/// - [`work_orders::WorkOrderService`]: Work orders
/// - [`billing::BillingService`]: Contacts, invoices and charges
/// - [`ledger::LedgerService`]: The payment ledger transaction
///
/// # Example
///
/// ```
/// use proptrack_shared::services::{RequestContext, Services};
/// use proptrack_shared::store::MemoryStore;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let services = Services::new(
///     Arc::new(MemoryStore::seeded()),
///     "a-secret-of-at-least-thirty-two-bytes",
/// );
///
/// // Anonymous callers are turned away before any data is read
/// let ctx = RequestContext::anonymous();
/// assert!(services.documents.get(&ctx, uuid::Uuid::new_v4()).await.is_err());
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::auth::authorization::{AuthorizationGuard, AuthzError, DenyReason, MissingContext};
use crate::store::{Store, StoreError};

pub mod billing;
pub mod documents;
pub mod ledger;
pub mod members;
pub mod orgs;
pub mod permissions;
pub mod users;
pub mod work_orders;

use billing::BillingService;
use documents::DocumentService;
use ledger::{LedgerService, PlaceholderReceipts, ReceiptIssuer};
use members::MemberService;
use orgs::OrgService;
use permissions::PermissionService;
use users::UserService;
use work_orders::WorkOrderService;

/// Service failures
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The authorization guard said no
    #[error("{0}")]
    Denied(DenyReason),

    /// Credentials or a presented token were rejected
    #[error("{0}")]
    Unauthenticated(String),

    /// The entity is absent or belongs to another org
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },

    /// Catalog or plan setup is broken; retrying won't help
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Store(StoreError),
}

impl ServiceError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field,
            message: message.into(),
        }
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ServiceError::NotFound(what),
            StoreError::Conflict(message) => ServiceError::Conflict(message),
            other => ServiceError::Store(other),
        }
    }
}

impl From<AuthzError> for ServiceError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Denied(reason) => ServiceError::Denied(reason),
            AuthzError::Store(err) => err.into(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Who is calling and which org the request names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub caller: Option<Uuid>,
    pub org_id: Option<Uuid>,
}

impl RequestContext {
    pub fn new(caller: Option<Uuid>, org_id: Option<Uuid>) -> Self {
        Self { caller, org_id }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Authenticated caller with no org in play
    pub fn user(caller: Uuid) -> Self {
        Self::new(Some(caller), None)
    }

    pub fn with_org(self, org_id: Uuid) -> Self {
        Self {
            org_id: Some(org_id),
            ..self
        }
    }

    /// The caller, or a `MissingContext(Caller)` denial
    pub fn caller(&self) -> ServiceResult<Uuid> {
        self.caller.ok_or(ServiceError::Denied(DenyReason::MissingContext(
            MissingContext::Caller,
        )))
    }
}

/// Every service, wired to one store
#[derive(Clone)]
pub struct Services {
    pub users: UserService,
    pub orgs: OrgService,
    pub permissions: PermissionService,
    pub members: MemberService,
    pub documents: DocumentService,
    pub work_orders: WorkOrderService,
    pub billing: BillingService,
    pub ledger: LedgerService,
    store: Arc<dyn Store>,
}

impl Services {
    pub fn new(store: Arc<dyn Store>, jwt_secret: &str) -> Self {
        Self::with_receipts(store, jwt_secret, Arc::new(PlaceholderReceipts))
    }

    pub fn with_receipts(
        store: Arc<dyn Store>,
        jwt_secret: &str,
        receipts: Arc<dyn ReceiptIssuer>,
    ) -> Self {
        let guard = AuthorizationGuard::new(store.clone());
        let permissions = PermissionService::new(store.clone(), guard.clone());

        Self {
            users: UserService::new(store.clone(), jwt_secret),
            orgs: OrgService::new(store.clone(), guard.clone(), permissions.clone()),
            members: MemberService::new(store.clone(), guard.clone()),
            documents: DocumentService::new(store.clone(), guard.clone()),
            work_orders: WorkOrderService::new(store.clone(), guard.clone()),
            billing: BillingService::new(store.clone(), guard.clone()),
            ledger: LedgerService::new(store.clone(), guard, receipts),
            permissions,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }
}
