/// PostgreSQL-backed [`Store`]
///
/// Single-row operations go straight to the pool. The org-creation and
/// payment workflows open one transaction each and pass `&mut *tx` to the
/// model functions, so a failure at any step rolls the whole unit back when
/// the transaction is dropped.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use super::{with_capabilities, OrgBootstrap, Store, StoreError, LAST_ADMIN, MEMBER_LIMIT};
use crate::models::charge::{self, Charge, ChargeFilter, CreateCharge};
use crate::models::contact::{Contact, CreateContact};
use crate::models::document::{CreateDocument, Document, DocumentFilter, UpdateDocument};
use crate::models::invoice::{CreateInvoice, Invoice};
use crate::models::membership::{CreateMembership, MemberSummary, Membership};
use crate::models::org::{CreateOrg, Org, Plan, UpdateOrg, UserOrg};
use crate::models::payment::{CreatePayment, Payment, PaymentDetails, Receipt};
use crate::models::permission::{
    CreateRole, Permission, Role, RoleWithCapabilities, ADMIN_ROLE_NAME,
};
use crate::models::user::{CreateUser, UpdateUser, User};
use crate::models::work_order::{CreateWorkOrder, UpdateWorkOrder, WorkOrder, WorkOrderFilter};
use crate::pagination::{Page, PageRequest};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn role_view(&self, role: Role) -> Result<RoleWithCapabilities, StoreError> {
        let capabilities = Role::capabilities(&self.pool, role.org_id, role.id).await?;
        Ok(with_capabilities(role, capabilities))
    }

    async fn payment_details(&self, payment: Payment) -> Result<PaymentDetails, StoreError> {
        let org_id = payment.org_id;

        let contact = match payment.contact_id {
            Some(id) => Contact::find(&self.pool, org_id, id).await?,
            None => None,
        };
        let invoice = match payment.invoice_id {
            Some(id) => Invoice::find(&self.pool, org_id, id).await?,
            None => None,
        };
        let charge = match payment.charge_id {
            Some(id) => Charge::find(&self.pool, org_id, id).await?,
            None => None,
        };
        let receipt = Receipt::find_for_payment(&self.pool, org_id, payment.id)
            .await?
            .ok_or(StoreError::NotFound("receipt"))?;

        Ok(PaymentDetails {
            payment,
            contact,
            invoice,
            charge,
            receipt,
        })
    }
}

/// LIMIT and OFFSET for a page request
fn bounds(page: &PageRequest) -> (i64, i64) {
    let offset = i64::try_from(page.offset()).unwrap_or(i64::MAX);
    (i64::from(page.limit()), offset)
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }

    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError> {
        User::create(&self.pool, &data)
            .await
            .map_err(|e| StoreError::from_unique(e, "user with this email"))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(User::find_by_email(&self.pool, email).await?)
    }

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> Result<Option<User>, StoreError> {
        User::update(&self.pool, id, &data)
            .await
            .map_err(|e| StoreError::from_unique(e, "user with this email"))
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<(), StoreError> {
        User::update_last_login(&self.pool, id).await?;
        Ok(())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        Ok(Permission::list_all(&self.pool).await?)
    }

    async fn find_plan(&self, id: Uuid) -> Result<Option<Plan>, StoreError> {
        Ok(Plan::find_by_id(&self.pool, id).await?)
    }

    async fn find_starter_plan(&self) -> Result<Option<Plan>, StoreError> {
        Ok(Plan::find_starter(&self.pool).await?)
    }

    async fn create_org_with_admin(
        &self,
        org: CreateOrg,
        owner_id: Uuid,
        grants: &[Permission],
    ) -> Result<OrgBootstrap, StoreError> {
        let mut tx = self.pool.begin().await?;

        let org = Org::create(&mut *tx, &org)
            .await
            .map_err(|e| StoreError::from_unique(e, "org with this slug"))?;

        let role = Role::create(
            &mut *tx,
            &CreateRole {
                org_id: org.id,
                name: ADMIN_ROLE_NAME.to_string(),
                is_system: true,
            },
        )
        .await?;

        let permission_ids: Vec<Uuid> = grants.iter().map(|p| p.id).collect();
        Role::grant(&mut *tx, role.id, &permission_ids).await?;
        let capabilities = Role::capabilities(&mut *tx, org.id, role.id).await?;

        let membership = Membership::create(
            &mut *tx,
            &CreateMembership {
                org_id: org.id,
                user_id: owner_id,
                role_id: role.id,
            },
        )
        .await?;

        tx.commit().await?;

        info!(org_id = %org.id, owner_id = %owner_id, "Org created with admin role");

        Ok(OrgBootstrap {
            org,
            admin_role: with_capabilities(role, capabilities),
            membership,
        })
    }

    async fn find_org(&self, org_id: Uuid) -> Result<Option<Org>, StoreError> {
        Ok(Org::find_by_id(&self.pool, org_id).await?)
    }

    async fn list_orgs_for_user(&self, user_id: Uuid) -> Result<Vec<UserOrg>, StoreError> {
        Ok(Org::list_for_user(&self.pool, user_id).await?)
    }

    async fn update_org(&self, org_id: Uuid, data: UpdateOrg) -> Result<Option<Org>, StoreError> {
        Ok(Org::update(&self.pool, org_id, &data).await?)
    }

    async fn find_active_membership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        Ok(Membership::find_active(&self.pool, org_id, user_id).await?)
    }

    async fn role_capabilities(
        &self,
        org_id: Uuid,
        role_id: Uuid,
    ) -> Result<Vec<String>, StoreError> {
        Ok(Role::capabilities(&self.pool, org_id, role_id).await?)
    }

    async fn org_capabilities(&self, org_id: Uuid) -> Result<Vec<String>, StoreError> {
        Ok(Role::capabilities_for_org(&self.pool, org_id).await?)
    }

    async fn list_members(
        &self,
        org_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<MemberSummary>, StoreError> {
        let (limit, offset) = bounds(page);
        let rows = Membership::list_by_org(&self.pool, org_id, limit, offset).await?;
        let total = Membership::count_by_org(&self.pool, org_id).await?;
        Ok(Page::new(rows, total, page))
    }

    async fn add_member(&self, data: CreateMembership) -> Result<Membership, StoreError> {
        let mut tx = self.pool.begin().await?;

        let org = Org::lock(&mut *tx, data.org_id)
            .await?
            .ok_or(StoreError::NotFound("org"))?;
        if Role::find_in_org(&mut *tx, data.org_id, data.role_id)
            .await?
            .is_none()
        {
            return Err(StoreError::NotFound("role"));
        }

        let max_members = Plan::find_by_id(&mut *tx, org.plan_id)
            .await?
            .and_then(|plan| plan.max_members);
        if let Some(max) = max_members {
            if Membership::count_active(&mut *tx, data.org_id).await? >= i64::from(max) {
                return Err(StoreError::Conflict(MEMBER_LIMIT.into()));
            }
        }

        let membership = Membership::create(&mut *tx, &data)
            .await
            .map_err(|e| StoreError::from_unique(e, "active membership"))?;
        tx.commit().await?;

        debug!(org_id = %data.org_id, user_id = %data.user_id, "Member added");
        Ok(membership)
    }

    async fn revoke_membership(
        &self,
        org_id: Uuid,
        membership_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let mut tx = self.pool.begin().await?;

        if Org::lock(&mut *tx, org_id).await?.is_none() {
            return Ok(None);
        }
        let Some(is_admin) = Membership::holds_system_role(&mut *tx, org_id, membership_id).await?
        else {
            return Ok(None);
        };
        if is_admin && Membership::count_active_admins(&mut *tx, org_id).await? <= 1 {
            return Err(StoreError::Conflict(LAST_ADMIN.into()));
        }

        let membership = Membership::revoke(&mut *tx, org_id, membership_id).await?;
        tx.commit().await?;
        Ok(membership)
    }

    async fn list_roles(&self, org_id: Uuid) -> Result<Vec<RoleWithCapabilities>, StoreError> {
        let roles = Role::list_by_org(&self.pool, org_id).await?;

        let mut views = Vec::with_capacity(roles.len());
        for role in roles {
            views.push(self.role_view(role).await?);
        }
        Ok(views)
    }

    async fn create_role(
        &self,
        data: CreateRole,
        permission_ids: &[Uuid],
    ) -> Result<RoleWithCapabilities, StoreError> {
        let mut tx = self.pool.begin().await?;

        let role = Role::create(&mut *tx, &data)
            .await
            .map_err(|e| StoreError::from_unique(e, "role with this name"))?;
        Role::grant(&mut *tx, role.id, permission_ids).await?;
        let capabilities = Role::capabilities(&mut *tx, role.org_id, role.id).await?;

        tx.commit().await?;
        Ok(with_capabilities(role, capabilities))
    }

    async fn grant_permissions(
        &self,
        org_id: Uuid,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<Option<RoleWithCapabilities>, StoreError> {
        let Some(role) = Role::find_in_org(&self.pool, org_id, role_id).await? else {
            return Ok(None);
        };

        Role::grant(&self.pool, role.id, permission_ids).await?;
        Ok(Some(self.role_view(role).await?))
    }

    async fn create_document(
        &self,
        org_id: Uuid,
        data: CreateDocument,
    ) -> Result<Document, StoreError> {
        Ok(Document::create(&self.pool, org_id, &data).await?)
    }

    async fn find_document(&self, org_id: Uuid, id: Uuid) -> Result<Option<Document>, StoreError> {
        Ok(Document::find(&self.pool, org_id, id).await?)
    }

    async fn list_documents(
        &self,
        org_id: Uuid,
        filter: &DocumentFilter,
        page: &PageRequest,
    ) -> Result<Page<Document>, StoreError> {
        let (limit, offset) = bounds(page);
        let rows = Document::list(&self.pool, org_id, filter, limit, offset).await?;
        let total = Document::count(&self.pool, org_id, filter).await?;
        Ok(Page::new(rows, total, page))
    }

    async fn update_document(
        &self,
        org_id: Uuid,
        id: Uuid,
        data: UpdateDocument,
    ) -> Result<Option<Document>, StoreError> {
        Ok(Document::update(&self.pool, org_id, id, &data).await?)
    }

    async fn delete_document(&self, org_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        Ok(Document::delete(&self.pool, org_id, id).await?)
    }

    async fn create_work_order(
        &self,
        org_id: Uuid,
        data: CreateWorkOrder,
    ) -> Result<WorkOrder, StoreError> {
        Ok(WorkOrder::create(&self.pool, org_id, &data).await?)
    }

    async fn find_work_order(
        &self,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WorkOrder>, StoreError> {
        Ok(WorkOrder::find(&self.pool, org_id, id).await?)
    }

    async fn list_work_orders(
        &self,
        org_id: Uuid,
        filter: &WorkOrderFilter,
        page: &PageRequest,
    ) -> Result<Page<WorkOrder>, StoreError> {
        let (limit, offset) = bounds(page);
        let rows = WorkOrder::list(&self.pool, org_id, filter, limit, offset).await?;
        let total = WorkOrder::count(&self.pool, org_id, filter).await?;
        Ok(Page::new(rows, total, page))
    }

    async fn update_work_order(
        &self,
        org_id: Uuid,
        id: Uuid,
        data: UpdateWorkOrder,
    ) -> Result<Option<WorkOrder>, StoreError> {
        Ok(WorkOrder::update(&self.pool, org_id, id, &data).await?)
    }

    async fn delete_work_order(&self, org_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        Ok(WorkOrder::delete(&self.pool, org_id, id).await?)
    }

    async fn create_contact(
        &self,
        org_id: Uuid,
        data: CreateContact,
    ) -> Result<Contact, StoreError> {
        Ok(Contact::create(&self.pool, org_id, &data).await?)
    }

    async fn find_contact(&self, org_id: Uuid, id: Uuid) -> Result<Option<Contact>, StoreError> {
        Ok(Contact::find(&self.pool, org_id, id).await?)
    }

    async fn list_contacts(
        &self,
        org_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<Contact>, StoreError> {
        let (limit, offset) = bounds(page);
        let rows = Contact::list(&self.pool, org_id, limit, offset).await?;
        let total = Contact::count(&self.pool, org_id).await?;
        Ok(Page::new(rows, total, page))
    }

    async fn create_invoice(
        &self,
        org_id: Uuid,
        data: CreateInvoice,
    ) -> Result<Invoice, StoreError> {
        Invoice::create(&self.pool, org_id, &data)
            .await
            .map_err(|e| StoreError::from_unique(e, "invoice with this number"))
    }

    async fn find_invoice(&self, org_id: Uuid, id: Uuid) -> Result<Option<Invoice>, StoreError> {
        Ok(Invoice::find(&self.pool, org_id, id).await?)
    }

    async fn create_charge(&self, org_id: Uuid, data: CreateCharge) -> Result<Charge, StoreError> {
        Ok(Charge::create(&self.pool, org_id, &data).await?)
    }

    async fn find_charge(&self, org_id: Uuid, id: Uuid) -> Result<Option<Charge>, StoreError> {
        Ok(Charge::find(&self.pool, org_id, id).await?)
    }

    async fn list_charges(
        &self,
        org_id: Uuid,
        filter: &ChargeFilter,
        page: &PageRequest,
    ) -> Result<Page<Charge>, StoreError> {
        let (limit, offset) = bounds(page);
        let rows = Charge::list(&self.pool, org_id, filter, limit, offset).await?;
        let total = Charge::count(&self.pool, org_id, filter).await?;
        Ok(Page::new(rows, total, page))
    }

    async fn record_payment(
        &self,
        org_id: Uuid,
        data: CreatePayment,
    ) -> Result<PaymentDetails, StoreError> {
        let mut tx = self.pool.begin().await?;

        let contact = match data.contact_id {
            Some(id) => Some(
                Contact::find(&mut *tx, org_id, id)
                    .await?
                    .ok_or(StoreError::NotFound("contact"))?,
            ),
            None => None,
        };

        let invoice = match data.invoice_id {
            Some(id) => Some(
                Invoice::find(&mut *tx, org_id, id)
                    .await?
                    .ok_or(StoreError::NotFound("invoice"))?,
            ),
            None => None,
        };

        // Locked so concurrent payments on one charge reconcile in turn
        let charge = match data.charge_id {
            Some(id) => Some(
                Charge::find_for_update(&mut *tx, org_id, id)
                    .await?
                    .ok_or(StoreError::NotFound("charge"))?,
            ),
            None => None,
        };

        let payment = Payment::create(&mut *tx, org_id, &data)
            .await
            .map_err(|e| StoreError::from_unique(e, "payment with this idempotency key"))?;

        let charge = match charge {
            Some(current) => {
                let payments = Payment::list_for_charge(&mut *tx, org_id, current.id).await?;
                let status = charge::reconcile(
                    current.status,
                    current.amount,
                    charge::settled_total(&payments),
                );

                if status == current.status {
                    Some(current)
                } else {
                    debug!(charge_id = %current.id, status = status.as_str(), "Charge reconciled");
                    Charge::set_status(&mut *tx, org_id, current.id, status).await?
                }
            }
            None => None,
        };

        let receipt = Receipt::create(&mut *tx, org_id, payment.id, &data.receipt_url).await?;

        tx.commit().await?;

        info!(
            org_id = %org_id,
            payment_id = %payment.id,
            amount = %payment.amount,
            "Payment recorded"
        );

        Ok(PaymentDetails {
            payment,
            contact,
            invoice,
            charge,
            receipt,
        })
    }

    async fn find_payment_by_idempotency_key(
        &self,
        org_id: Uuid,
        key: &str,
    ) -> Result<Option<PaymentDetails>, StoreError> {
        match Payment::find_by_idempotency_key(&self.pool, org_id, key).await? {
            Some(payment) => Ok(Some(self.payment_details(payment).await?)),
            None => Ok(None),
        }
    }

    async fn list_payments(
        &self,
        org_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<Payment>, StoreError> {
        let (limit, offset) = bounds(page);
        let rows = Payment::list(&self.pool, org_id, limit, offset).await?;
        let total = Payment::count(&self.pool, org_id).await?;
        Ok(Page::new(rows, total, page))
    }

    async fn charge_payments(
        &self,
        org_id: Uuid,
        charge_id: Uuid,
    ) -> Result<Vec<Payment>, StoreError> {
        Ok(Payment::list_for_charge(&self.pool, org_id, charge_id).await?)
    }
}
