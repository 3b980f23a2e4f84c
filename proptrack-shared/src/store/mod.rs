/// Org-scoped data access
///
/// [`Store`] is the single handle every service and the authorization guard
/// receive. It is always injected as an `Arc<dyn Store>`; nothing reaches
/// the database through a global.
///
/// Every tenant-scoped method takes the `org_id` as its first argument and
/// folds it into the lookup, so a row belonging to another org behaves
/// exactly like a row that doesn't exist.
///
/// # Implementations
///
/// - [`PgStore`]: PostgreSQL through sqlx; multi-step writes run in one
///   transaction
/// - [`MemoryStore`]: in-process tables behind an `RwLock`; multi-step writes
///   are staged on a copy and swapped in on success
///
/// # Example
///
/// ```
/// use proptrack_shared::store::{MemoryStore, Store};
/// use std::sync::Arc;
///
/// let store: Arc<dyn Store> = Arc::new(MemoryStore::seeded());
/// ```

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::charge::{Charge, ChargeFilter, CreateCharge};
use crate::models::contact::{Contact, CreateContact};
use crate::models::document::{CreateDocument, Document, DocumentFilter, UpdateDocument};
use crate::models::invoice::{CreateInvoice, Invoice};
use crate::models::membership::{CreateMembership, MemberSummary, Membership};
use crate::models::org::{CreateOrg, Org, Plan, UpdateOrg, UserOrg};
use crate::models::payment::{CreatePayment, Payment, PaymentDetails};
use crate::models::permission::{CreateRole, Permission, Role, RoleWithCapabilities};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::models::work_order::{CreateWorkOrder, UpdateWorkOrder, WorkOrder, WorkOrderFilter};
use crate::pagination::{Page, PageRequest};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Store failures
#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced row is absent or belongs to another org
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A uniqueness rule was violated
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Maps unique violations to [`StoreError::Conflict`], everything else
    /// to [`StoreError::Database`]
    pub fn from_unique(err: sqlx::Error, what: &str) -> Self {
        match err.as_database_error() {
            Some(db) if db.is_unique_violation() => {
                StoreError::Conflict(format!("{} already exists", what))
            }
            _ => StoreError::Database(err),
        }
    }
}

pub(crate) const LAST_ADMIN: &str = "org must keep at least one active admin";
pub(crate) const MEMBER_LIMIT: &str = "org has reached its plan's member limit";

/// Everything the org-creation workflow writes
#[derive(Debug, Clone, serde::Serialize)]
pub struct OrgBootstrap {
    pub org: Org,
    pub admin_role: RoleWithCapabilities,
    pub membership: Membership,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Round-trip to the backing store
    async fn ping(&self) -> Result<(), StoreError>;

    // Users

    /// Conflict if the email is taken
    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    /// Conflict if the new email is taken
    async fn update_user(&self, id: Uuid, data: UpdateUser) -> Result<Option<User>, StoreError>;
    async fn touch_last_login(&self, id: Uuid) -> Result<(), StoreError>;

    // Catalog

    /// The whole capability catalog, ordered by name
    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError>;
    async fn find_plan(&self, id: Uuid) -> Result<Option<Plan>, StoreError>;
    async fn find_starter_plan(&self) -> Result<Option<Plan>, StoreError>;

    // Orgs

    /// Creates the org, its Admin role holding `grants`, and the owner's
    /// active membership, all or nothing
    ///
    /// Conflict if the slug is taken.
    async fn create_org_with_admin(
        &self,
        org: CreateOrg,
        owner_id: Uuid,
        grants: &[Permission],
    ) -> Result<OrgBootstrap, StoreError>;
    async fn find_org(&self, org_id: Uuid) -> Result<Option<Org>, StoreError>;
    async fn list_orgs_for_user(&self, user_id: Uuid) -> Result<Vec<UserOrg>, StoreError>;
    async fn update_org(&self, org_id: Uuid, data: UpdateOrg) -> Result<Option<Org>, StoreError>;

    // Access

    async fn find_active_membership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError>;
    /// Capabilities of one role; empty when the role isn't in the org
    async fn role_capabilities(&self, org_id: Uuid, role_id: Uuid)
        -> Result<Vec<String>, StoreError>;
    /// Union of capabilities across the org's roles
    async fn org_capabilities(&self, org_id: Uuid) -> Result<Vec<String>, StoreError>;
    async fn list_members(
        &self,
        org_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<MemberSummary>, StoreError>;
    /// NotFound if the role isn't in the org; Conflict if the user already
    /// has an active membership there or the org's plan is at its member cap
    async fn add_member(&self, data: CreateMembership) -> Result<Membership, StoreError>;
    /// None if there is no active membership with this ID in the org;
    /// Conflict if it is the org's last active admin membership
    async fn revoke_membership(
        &self,
        org_id: Uuid,
        membership_id: Uuid,
    ) -> Result<Option<Membership>, StoreError>;
    async fn list_roles(&self, org_id: Uuid) -> Result<Vec<RoleWithCapabilities>, StoreError>;
    /// Creates a role holding `permission_ids`; Conflict on a duplicate name
    async fn create_role(
        &self,
        data: CreateRole,
        permission_ids: &[Uuid],
    ) -> Result<RoleWithCapabilities, StoreError>;
    /// Adds permissions to a role; None if the role isn't in the org
    async fn grant_permissions(
        &self,
        org_id: Uuid,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<Option<RoleWithCapabilities>, StoreError>;

    // Documents

    async fn create_document(
        &self,
        org_id: Uuid,
        data: CreateDocument,
    ) -> Result<Document, StoreError>;
    async fn find_document(&self, org_id: Uuid, id: Uuid) -> Result<Option<Document>, StoreError>;
    async fn list_documents(
        &self,
        org_id: Uuid,
        filter: &DocumentFilter,
        page: &PageRequest,
    ) -> Result<Page<Document>, StoreError>;
    async fn update_document(
        &self,
        org_id: Uuid,
        id: Uuid,
        data: UpdateDocument,
    ) -> Result<Option<Document>, StoreError>;
    async fn delete_document(&self, org_id: Uuid, id: Uuid) -> Result<bool, StoreError>;

    // Work orders

    async fn create_work_order(
        &self,
        org_id: Uuid,
        data: CreateWorkOrder,
    ) -> Result<WorkOrder, StoreError>;
    async fn find_work_order(&self, org_id: Uuid, id: Uuid)
        -> Result<Option<WorkOrder>, StoreError>;
    async fn list_work_orders(
        &self,
        org_id: Uuid,
        filter: &WorkOrderFilter,
        page: &PageRequest,
    ) -> Result<Page<WorkOrder>, StoreError>;
    async fn update_work_order(
        &self,
        org_id: Uuid,
        id: Uuid,
        data: UpdateWorkOrder,
    ) -> Result<Option<WorkOrder>, StoreError>;
    async fn delete_work_order(&self, org_id: Uuid, id: Uuid) -> Result<bool, StoreError>;

    // Billing

    async fn create_contact(&self, org_id: Uuid, data: CreateContact)
        -> Result<Contact, StoreError>;
    async fn find_contact(&self, org_id: Uuid, id: Uuid) -> Result<Option<Contact>, StoreError>;
    async fn list_contacts(
        &self,
        org_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<Contact>, StoreError>;
    /// Conflict if the number is already used in the org
    async fn create_invoice(&self, org_id: Uuid, data: CreateInvoice)
        -> Result<Invoice, StoreError>;
    async fn find_invoice(&self, org_id: Uuid, id: Uuid) -> Result<Option<Invoice>, StoreError>;
    async fn create_charge(&self, org_id: Uuid, data: CreateCharge) -> Result<Charge, StoreError>;
    async fn find_charge(&self, org_id: Uuid, id: Uuid) -> Result<Option<Charge>, StoreError>;
    async fn list_charges(
        &self,
        org_id: Uuid,
        filter: &ChargeFilter,
        page: &PageRequest,
    ) -> Result<Page<Charge>, StoreError>;

    // Ledger

    /// Records a settled payment as one all-or-nothing unit
    ///
    /// Checks that every referenced invoice, charge and contact belongs to
    /// the org (NotFound otherwise), inserts the payment, reconciles the
    /// charge against all of its completed payments, and inserts the
    /// receipt. Conflict if the idempotency key was already used.
    async fn record_payment(
        &self,
        org_id: Uuid,
        data: CreatePayment,
    ) -> Result<PaymentDetails, StoreError>;
    async fn find_payment_by_idempotency_key(
        &self,
        org_id: Uuid,
        key: &str,
    ) -> Result<Option<PaymentDetails>, StoreError>;
    async fn list_payments(
        &self,
        org_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<Payment>, StoreError>;
    async fn charge_payments(&self, org_id: Uuid, charge_id: Uuid)
        -> Result<Vec<Payment>, StoreError>;
}

/// Pairs a role with its sorted capability strings
pub(crate) fn with_capabilities(role: Role, mut capabilities: Vec<String>) -> RoleWithCapabilities {
    capabilities.sort();
    capabilities.dedup();
    RoleWithCapabilities { role, capabilities }
}
