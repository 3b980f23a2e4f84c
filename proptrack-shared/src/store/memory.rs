/// In-memory [`Store`]
///
/// All tables live in one [`Tables`] value behind a `tokio::sync::RwLock`.
/// Multi-step writes clone the tables, apply every step to the copy, and
/// only replace the live tables once all steps succeeded, which gives the
/// same all-or-nothing behavior as a database transaction.
///
/// Row order mirrors the PostgreSQL queries: newest first for documents,
/// work orders, charges and payments; oldest first for members and roles;
/// alphabetical for contacts.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::{with_capabilities, OrgBootstrap, Store, StoreError, LAST_ADMIN, MEMBER_LIMIT};
use crate::auth::capability;
use crate::models::charge::{self, Charge, ChargeFilter, ChargeStatus, CreateCharge};
use crate::models::contact::{Contact, CreateContact};
use crate::models::document::{CreateDocument, Document, DocumentFilter, UpdateDocument};
use crate::models::invoice::{CreateInvoice, Invoice, InvoiceStatus};
use crate::models::membership::{CreateMembership, MemberSummary, Membership, MembershipStatus};
use crate::models::org::{CreateOrg, Org, Plan, UpdateOrg, UserOrg};
use crate::models::payment::{CreatePayment, Payment, PaymentDetails, PaymentStatus, Receipt};
use crate::models::permission::{
    CreateRole, Permission, Role, RoleWithCapabilities, ADMIN_ROLE_NAME,
};
use crate::models::user::{normalize_email, CreateUser, UpdateUser, User};
use crate::models::work_order::{
    CreateWorkOrder, UpdateWorkOrder, WorkOrder, WorkOrderFilter, WorkOrderStatus,
};
use crate::pagination::{Page, PageRequest};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    plans: Vec<Plan>,
    permissions: Vec<Permission>,
    orgs: Vec<Org>,
    roles: Vec<Role>,
    role_permissions: Vec<(Uuid, Uuid)>,
    memberships: Vec<Membership>,
    documents: Vec<Document>,
    work_orders: Vec<WorkOrder>,
    contacts: Vec<Contact>,
    invoices: Vec<Invoice>,
    charges: Vec<Charge>,
    payments: Vec<Payment>,
    receipts: Vec<Receipt>,
}

/// Row counts per table, for asserting that a failed workflow left nothing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub orgs: usize,
    pub roles: usize,
    pub memberships: usize,
    pub payments: usize,
    pub receipts: usize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Empty store: no capability catalog and no plans
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding the standard capability catalog, a starter plan and a
    /// professional plan, like a freshly migrated database
    pub fn seeded() -> Self {
        let mut tables = Tables::default();
        for name in capability::ALL {
            tables.permissions.push(new_permission(name));
        }
        tables.plans.push(new_plan("Starter", true, Some(5)));
        tables.plans.push(new_plan("Professional", false, Some(50)));

        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Adds a capability to the global catalog
    pub async fn insert_permission(&self, name: &str) -> Permission {
        let permission = new_permission(name);
        self.tables.write().await.permissions.push(permission.clone());
        permission
    }

    /// Adds a plan to the catalog
    pub async fn insert_plan(&self, name: &str, is_starter: bool) -> Plan {
        let plan = new_plan(name, is_starter, None);
        self.tables.write().await.plans.push(plan.clone());
        plan
    }

    pub async fn row_counts(&self) -> RowCounts {
        let tables = self.tables.read().await;
        RowCounts {
            orgs: tables.orgs.len(),
            roles: tables.roles.len(),
            memberships: tables.memberships.len(),
            payments: tables.payments.len(),
            receipts: tables.receipts.len(),
        }
    }
}

fn new_permission(name: &str) -> Permission {
    Permission {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: None,
        created_at: Utc::now(),
    }
}

fn new_plan(name: &str, is_starter: bool, max_members: Option<i32>) -> Plan {
    Plan {
        id: Uuid::new_v4(),
        name: name.to_string(),
        is_starter,
        max_members,
        features: json!({}),
        created_at: Utc::now(),
    }
}

impl Tables {
    fn role_in_org(&self, org_id: Uuid, role_id: Uuid) -> Option<&Role> {
        self.roles
            .iter()
            .find(|r| r.org_id == org_id && r.id == role_id)
    }

    fn role_capabilities(&self, org_id: Uuid, role_id: Uuid) -> Vec<String> {
        if self.role_in_org(org_id, role_id).is_none() {
            return Vec::new();
        }

        let mut names: Vec<String> = self
            .role_permissions
            .iter()
            .filter(|(role, _)| *role == role_id)
            .filter_map(|(_, permission)| self.permissions.iter().find(|p| p.id == *permission))
            .map(|p| p.name.clone())
            .collect();
        names.sort();
        names
    }

    fn role_view(&self, role: &Role) -> RoleWithCapabilities {
        with_capabilities(role.clone(), self.role_capabilities(role.org_id, role.id))
    }

    fn grant(&mut self, role_id: Uuid, permission_ids: &[Uuid]) {
        for permission_id in permission_ids {
            if !self.permissions.iter().any(|p| p.id == *permission_id) {
                continue;
            }
            let pair = (role_id, *permission_id);
            if !self.role_permissions.contains(&pair) {
                self.role_permissions.push(pair);
            }
        }
    }

    fn insert_role(&mut self, data: &CreateRole) -> Result<Role, StoreError> {
        if self
            .roles
            .iter()
            .any(|r| r.org_id == data.org_id && r.name == data.name)
        {
            return Err(StoreError::Conflict("role with this name already exists".into()));
        }

        let role = Role {
            id: Uuid::new_v4(),
            org_id: data.org_id,
            name: data.name.clone(),
            is_system: data.is_system,
            created_at: Utc::now(),
        };
        self.roles.push(role.clone());
        Ok(role)
    }

    fn insert_membership(&mut self, data: &CreateMembership) -> Result<Membership, StoreError> {
        if !self.users.iter().any(|u| u.id == data.user_id) {
            return Err(StoreError::NotFound("user"));
        }
        if self.memberships.iter().any(|m| {
            m.org_id == data.org_id && m.user_id == data.user_id && m.is_active()
        }) {
            return Err(StoreError::Conflict("active membership already exists".into()));
        }

        let membership = Membership {
            id: Uuid::new_v4(),
            org_id: data.org_id,
            user_id: data.user_id,
            role_id: data.role_id,
            status: MembershipStatus::Active,
            created_at: Utc::now(),
            revoked_at: None,
        };
        self.memberships.push(membership.clone());
        Ok(membership)
    }

    fn holds_system_role(&self, membership: &Membership) -> bool {
        self.role_in_org(membership.org_id, membership.role_id)
            .is_some_and(|role| role.is_system)
    }

    fn active_admins(&self, org_id: Uuid) -> usize {
        self.memberships
            .iter()
            .filter(|m| m.org_id == org_id && m.is_active() && self.holds_system_role(m))
            .count()
    }

    fn member_limit_reached(&self, org_id: Uuid) -> bool {
        let Some(max) = self
            .orgs
            .iter()
            .find(|o| o.id == org_id)
            .and_then(|org| self.plans.iter().find(|p| p.id == org.plan_id))
            .and_then(|plan| plan.max_members)
        else {
            return false;
        };

        let active = self
            .memberships
            .iter()
            .filter(|m| m.org_id == org_id && m.is_active())
            .count();
        active >= usize::try_from(max).unwrap_or(0)
    }

    fn email_taken(&self, email: &str, except: Option<Uuid>) -> bool {
        self.users
            .iter()
            .any(|u| u.email == email && Some(u.id) != except)
    }

    fn payment_details(&self, payment: Payment) -> Result<PaymentDetails, StoreError> {
        let org_id = payment.org_id;
        let contact = payment.contact_id.and_then(|id| {
            self.contacts
                .iter()
                .find(|c| c.org_id == org_id && c.id == id)
                .cloned()
        });
        let invoice = payment.invoice_id.and_then(|id| {
            self.invoices
                .iter()
                .find(|i| i.org_id == org_id && i.id == id)
                .cloned()
        });
        let charge = payment.charge_id.and_then(|id| {
            self.charges
                .iter()
                .find(|c| c.org_id == org_id && c.id == id)
                .cloned()
        });
        let receipt = self
            .receipts
            .iter()
            .find(|r| r.org_id == org_id && r.payment_id == payment.id)
            .cloned()
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

/// Pages rows that are already filtered and ordered
fn paginate<T: Clone>(rows: Vec<T>, page: &PageRequest) -> Page<T> {
    let total = rows.len() as i64;
    Page::new(page.window(&rows), total, page)
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn create_user(&self, data: CreateUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        let email = normalize_email(&data.email);
        if tables.email_taken(&email, None) {
            return Err(StoreError::Conflict("user with this email already exists".into()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email,
            password_hash: data.password_hash,
            name: data.name,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let email = normalize_email(email);
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: Uuid, data: UpdateUser) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.write().await;
        let email = data.email.as_deref().map(normalize_email);
        if let Some(email) = &email {
            if tables.email_taken(email, Some(id)) {
                return Err(StoreError::Conflict("user with this email already exists".into()));
            }
        }

        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(email) = email {
            user.email = email;
        }
        if let Some(name) = data.name {
            user.name = name;
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn touch_last_login(&self, id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.id == id) {
            user.last_login_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn list_permissions(&self) -> Result<Vec<Permission>, StoreError> {
        let tables = self.tables.read().await;
        let mut permissions = tables.permissions.clone();
        permissions.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(permissions)
    }

    async fn find_plan(&self, id: Uuid) -> Result<Option<Plan>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.plans.iter().find(|p| p.id == id).cloned())
    }

    async fn find_starter_plan(&self) -> Result<Option<Plan>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.plans.iter().find(|p| p.is_starter).cloned())
    }

    async fn create_org_with_admin(
        &self,
        org: CreateOrg,
        owner_id: Uuid,
        grants: &[Permission],
    ) -> Result<OrgBootstrap, StoreError> {
        let mut live = self.tables.write().await;
        let mut staged = live.clone();

        if staged.orgs.iter().any(|o| o.slug == org.slug) {
            return Err(StoreError::Conflict("org with this slug already exists".into()));
        }
        if !staged.plans.iter().any(|p| p.id == org.plan_id) {
            return Err(StoreError::NotFound("plan"));
        }

        let now = Utc::now();
        let org = Org {
            id: Uuid::new_v4(),
            name: org.name,
            slug: org.slug,
            plan_id: org.plan_id,
            created_at: now,
            updated_at: now,
        };
        staged.orgs.push(org.clone());

        let role = staged.insert_role(&CreateRole {
            org_id: org.id,
            name: ADMIN_ROLE_NAME.to_string(),
            is_system: true,
        })?;
        let permission_ids: Vec<Uuid> = grants.iter().map(|p| p.id).collect();
        staged.grant(role.id, &permission_ids);
        let admin_role = staged.role_view(&role);

        let membership = staged.insert_membership(&CreateMembership {
            org_id: org.id,
            user_id: owner_id,
            role_id: role.id,
        })?;

        *live = staged;

        info!(org_id = %org.id, owner_id = %owner_id, "Org created with admin role");

        Ok(OrgBootstrap {
            org,
            admin_role,
            membership,
        })
    }

    async fn find_org(&self, org_id: Uuid) -> Result<Option<Org>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.orgs.iter().find(|o| o.id == org_id).cloned())
    }

    async fn list_orgs_for_user(&self, user_id: Uuid) -> Result<Vec<UserOrg>, StoreError> {
        let tables = self.tables.read().await;

        let orgs = tables
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id && m.is_active())
            .filter_map(|m| {
                let org = tables.orgs.iter().find(|o| o.id == m.org_id)?;
                let role = tables.role_in_org(m.org_id, m.role_id)?;
                Some(UserOrg {
                    org_id: org.id,
                    name: org.name.clone(),
                    slug: org.slug.clone(),
                    role_id: role.id,
                    role_name: role.name.clone(),
                    joined_at: m.created_at,
                })
            })
            .collect();

        Ok(orgs)
    }

    async fn update_org(&self, org_id: Uuid, data: UpdateOrg) -> Result<Option<Org>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(org) = tables.orgs.iter_mut().find(|o| o.id == org_id) else {
            return Ok(None);
        };
        if let Some(name) = data.name {
            org.name = name;
        }
        org.updated_at = Utc::now();
        Ok(Some(org.clone()))
    }

    async fn find_active_membership(
        &self,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .memberships
            .iter()
            .find(|m| m.org_id == org_id && m.user_id == user_id && m.is_active())
            .cloned())
    }

    async fn role_capabilities(
        &self,
        org_id: Uuid,
        role_id: Uuid,
    ) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.role_capabilities(org_id, role_id))
    }

    async fn org_capabilities(&self, org_id: Uuid) -> Result<Vec<String>, StoreError> {
        let tables = self.tables.read().await;

        let mut names: Vec<String> = tables
            .roles
            .iter()
            .filter(|r| r.org_id == org_id)
            .flat_map(|r| tables.role_capabilities(org_id, r.id))
            .collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn list_members(
        &self,
        org_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<MemberSummary>, StoreError> {
        let tables = self.tables.read().await;

        let rows: Vec<MemberSummary> = tables
            .memberships
            .iter()
            .filter(|m| m.org_id == org_id)
            .filter_map(|m| {
                let user = tables.users.iter().find(|u| u.id == m.user_id)?;
                let role = tables.role_in_org(org_id, m.role_id)?;
                Some(MemberSummary {
                    membership_id: m.id,
                    org_id: m.org_id,
                    user_id: m.user_id,
                    email: user.email.clone(),
                    name: user.name.clone(),
                    role_id: role.id,
                    role_name: role.name.clone(),
                    status: m.status,
                    created_at: m.created_at,
                    revoked_at: m.revoked_at,
                })
            })
            .collect();

        Ok(paginate(rows, page))
    }

    async fn add_member(&self, data: CreateMembership) -> Result<Membership, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.role_in_org(data.org_id, data.role_id).is_none() {
            return Err(StoreError::NotFound("role"));
        }
        if tables.member_limit_reached(data.org_id) {
            return Err(StoreError::Conflict(MEMBER_LIMIT.into()));
        }

        let membership = tables.insert_membership(&data)?;
        debug!(org_id = %data.org_id, user_id = %data.user_id, "Member added");
        Ok(membership)
    }

    async fn revoke_membership(
        &self,
        org_id: Uuid,
        membership_id: Uuid,
    ) -> Result<Option<Membership>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables
            .memberships
            .iter()
            .position(|m| m.org_id == org_id && m.id == membership_id && m.is_active())
        else {
            return Ok(None);
        };

        if tables.holds_system_role(&tables.memberships[index])
            && tables.active_admins(org_id) <= 1
        {
            return Err(StoreError::Conflict(LAST_ADMIN.into()));
        }

        let membership = &mut tables.memberships[index];
        membership.status = MembershipStatus::Revoked;
        membership.revoked_at = Some(Utc::now());
        Ok(Some(membership.clone()))
    }

    async fn list_roles(&self, org_id: Uuid) -> Result<Vec<RoleWithCapabilities>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .iter()
            .filter(|r| r.org_id == org_id)
            .map(|r| tables.role_view(r))
            .collect())
    }

    async fn create_role(
        &self,
        data: CreateRole,
        permission_ids: &[Uuid],
    ) -> Result<RoleWithCapabilities, StoreError> {
        let mut live = self.tables.write().await;
        let mut staged = live.clone();

        let role = staged.insert_role(&data)?;
        staged.grant(role.id, permission_ids);
        let view = staged.role_view(&role);

        *live = staged;
        Ok(view)
    }

    async fn grant_permissions(
        &self,
        org_id: Uuid,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<Option<RoleWithCapabilities>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(role) = tables.role_in_org(org_id, role_id).cloned() else {
            return Ok(None);
        };

        tables.grant(role.id, permission_ids);
        Ok(Some(tables.role_view(&role)))
    }

    async fn create_document(
        &self,
        org_id: Uuid,
        data: CreateDocument,
    ) -> Result<Document, StoreError> {
        let now = Utc::now();
        let document = Document {
            id: Uuid::new_v4(),
            org_id,
            title: data.title,
            category: data.category,
            url: data.url,
            property_ref: data.property_ref,
            uploaded_by: data.uploaded_by,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.documents.push(document.clone());
        Ok(document)
    }

    async fn find_document(&self, org_id: Uuid, id: Uuid) -> Result<Option<Document>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .documents
            .iter()
            .find(|d| d.org_id == org_id && d.id == id)
            .cloned())
    }

    async fn list_documents(
        &self,
        org_id: Uuid,
        filter: &DocumentFilter,
        page: &PageRequest,
    ) -> Result<Page<Document>, StoreError> {
        let tables = self.tables.read().await;
        let rows: Vec<Document> = tables
            .documents
            .iter()
            .rev()
            .filter(|d| d.org_id == org_id)
            .filter(|d| filter.category.as_ref().map_or(true, |c| &d.category == c))
            .cloned()
            .collect();

        Ok(paginate(rows, page))
    }

    async fn update_document(
        &self,
        org_id: Uuid,
        id: Uuid,
        data: UpdateDocument,
    ) -> Result<Option<Document>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(document) = tables
            .documents
            .iter_mut()
            .find(|d| d.org_id == org_id && d.id == id)
        else {
            return Ok(None);
        };

        if let Some(title) = data.title {
            document.title = title;
        }
        if let Some(category) = data.category {
            document.category = category;
        }
        if let Some(url) = data.url {
            document.url = url;
        }
        if let Some(property_ref) = data.property_ref {
            document.property_ref = Some(property_ref);
        }
        document.updated_at = Utc::now();
        Ok(Some(document.clone()))
    }

    async fn delete_document(&self, org_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.documents.len();
        tables
            .documents
            .retain(|d| !(d.org_id == org_id && d.id == id));
        Ok(tables.documents.len() < before)
    }

    async fn create_work_order(
        &self,
        org_id: Uuid,
        data: CreateWorkOrder,
    ) -> Result<WorkOrder, StoreError> {
        let now = Utc::now();
        let order = WorkOrder {
            id: Uuid::new_v4(),
            org_id,
            title: data.title,
            description: data.description,
            priority: data.priority,
            status: WorkOrderStatus::Open,
            property_ref: data.property_ref,
            assigned_to: data.assigned_to,
            created_by: data.created_by,
            due_date: data.due_date,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.work_orders.push(order.clone());
        Ok(order)
    }

    async fn find_work_order(
        &self,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<WorkOrder>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .work_orders
            .iter()
            .find(|w| w.org_id == org_id && w.id == id)
            .cloned())
    }

    async fn list_work_orders(
        &self,
        org_id: Uuid,
        filter: &WorkOrderFilter,
        page: &PageRequest,
    ) -> Result<Page<WorkOrder>, StoreError> {
        let tables = self.tables.read().await;
        let rows: Vec<WorkOrder> = tables
            .work_orders
            .iter()
            .rev()
            .filter(|w| w.org_id == org_id)
            .filter(|w| filter.status.map_or(true, |s| w.status == s))
            .cloned()
            .collect();

        Ok(paginate(rows, page))
    }

    async fn update_work_order(
        &self,
        org_id: Uuid,
        id: Uuid,
        data: UpdateWorkOrder,
    ) -> Result<Option<WorkOrder>, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(order) = tables
            .work_orders
            .iter_mut()
            .find(|w| w.org_id == org_id && w.id == id)
        else {
            return Ok(None);
        };

        order.apply(&data, Utc::now());
        Ok(Some(order.clone()))
    }

    async fn delete_work_order(&self, org_id: Uuid, id: Uuid) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let before = tables.work_orders.len();
        tables
            .work_orders
            .retain(|w| !(w.org_id == org_id && w.id == id));
        Ok(tables.work_orders.len() < before)
    }

    async fn create_contact(
        &self,
        org_id: Uuid,
        data: CreateContact,
    ) -> Result<Contact, StoreError> {
        let contact = Contact {
            id: Uuid::new_v4(),
            org_id,
            name: data.name,
            email: data.email,
            phone: data.phone,
            kind: data.kind,
            created_at: Utc::now(),
        };
        self.tables.write().await.contacts.push(contact.clone());
        Ok(contact)
    }

    async fn find_contact(&self, org_id: Uuid, id: Uuid) -> Result<Option<Contact>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .contacts
            .iter()
            .find(|c| c.org_id == org_id && c.id == id)
            .cloned())
    }

    async fn list_contacts(
        &self,
        org_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<Contact>, StoreError> {
        let tables = self.tables.read().await;
        let mut rows: Vec<Contact> = tables
            .contacts
            .iter()
            .filter(|c| c.org_id == org_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        Ok(paginate(rows, page))
    }

    async fn create_invoice(
        &self,
        org_id: Uuid,
        data: CreateInvoice,
    ) -> Result<Invoice, StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .invoices
            .iter()
            .any(|i| i.org_id == org_id && i.number == data.number)
        {
            return Err(StoreError::Conflict("invoice with this number already exists".into()));
        }

        let invoice = Invoice {
            id: Uuid::new_v4(),
            org_id,
            contact_id: data.contact_id,
            number: data.number,
            amount: data.amount,
            due_date: data.due_date,
            status: InvoiceStatus::Draft,
            created_at: Utc::now(),
        };
        tables.invoices.push(invoice.clone());
        Ok(invoice)
    }

    async fn find_invoice(&self, org_id: Uuid, id: Uuid) -> Result<Option<Invoice>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .invoices
            .iter()
            .find(|i| i.org_id == org_id && i.id == id)
            .cloned())
    }

    async fn create_charge(&self, org_id: Uuid, data: CreateCharge) -> Result<Charge, StoreError> {
        let now = Utc::now();
        let charge = Charge {
            id: Uuid::new_v4(),
            org_id,
            contact_id: data.contact_id,
            description: data.description,
            amount: data.amount,
            due_date: data.due_date,
            status: ChargeStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        self.tables.write().await.charges.push(charge.clone());
        Ok(charge)
    }

    async fn find_charge(&self, org_id: Uuid, id: Uuid) -> Result<Option<Charge>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .charges
            .iter()
            .find(|c| c.org_id == org_id && c.id == id)
            .cloned())
    }

    async fn list_charges(
        &self,
        org_id: Uuid,
        filter: &ChargeFilter,
        page: &PageRequest,
    ) -> Result<Page<Charge>, StoreError> {
        let tables = self.tables.read().await;
        let rows: Vec<Charge> = tables
            .charges
            .iter()
            .rev()
            .filter(|c| c.org_id == org_id)
            .filter(|c| filter.status.map_or(true, |s| c.status == s))
            .cloned()
            .collect();

        Ok(paginate(rows, page))
    }

    async fn record_payment(
        &self,
        org_id: Uuid,
        data: CreatePayment,
    ) -> Result<PaymentDetails, StoreError> {
        let mut live = self.tables.write().await;
        let mut staged = live.clone();

        if let Some(id) = data.contact_id {
            if !staged.contacts.iter().any(|c| c.org_id == org_id && c.id == id) {
                return Err(StoreError::NotFound("contact"));
            }
        }
        if let Some(id) = data.invoice_id {
            if !staged.invoices.iter().any(|i| i.org_id == org_id && i.id == id) {
                return Err(StoreError::NotFound("invoice"));
            }
        }
        if let Some(id) = data.charge_id {
            if !staged.charges.iter().any(|c| c.org_id == org_id && c.id == id) {
                return Err(StoreError::NotFound("charge"));
            }
        }
        if let Some(key) = &data.idempotency_key {
            if staged
                .payments
                .iter()
                .any(|p| p.org_id == org_id && p.idempotency_key.as_ref() == Some(key))
            {
                return Err(StoreError::Conflict(
                    "payment with this idempotency key already exists".into(),
                ));
            }
        }

        let now = Utc::now();
        let payment = Payment {
            id: data.id,
            org_id,
            invoice_id: data.invoice_id,
            charge_id: data.charge_id,
            contact_id: data.contact_id,
            amount: data.amount,
            method: data.method,
            payment_method_id: data.payment_method_id,
            status: PaymentStatus::Completed,
            processed_at: now,
            idempotency_key: data.idempotency_key,
            created_at: now,
        };
        staged.payments.push(payment.clone());

        if let Some(charge_id) = payment.charge_id {
            let settled = charge::settled_total(
                staged
                    .payments
                    .iter()
                    .filter(|p| p.org_id == org_id && p.charge_id == Some(charge_id)),
            );
            if let Some(current) = staged
                .charges
                .iter_mut()
                .find(|c| c.org_id == org_id && c.id == charge_id)
            {
                let status = charge::reconcile(current.status, current.amount, settled);
                if status != current.status {
                    debug!(charge_id = %current.id, status = status.as_str(), "Charge reconciled");
                    current.status = status;
                    current.updated_at = now;
                }
            }
        }

        staged.receipts.push(Receipt {
            id: Uuid::new_v4(),
            org_id,
            payment_id: payment.id,
            url: data.receipt_url,
            created_at: now,
        });

        let details = staged.payment_details(payment)?;
        *live = staged;

        info!(
            org_id = %org_id,
            payment_id = %details.payment.id,
            amount = %details.payment.amount,
            "Payment recorded"
        );

        Ok(details)
    }

    async fn find_payment_by_idempotency_key(
        &self,
        org_id: Uuid,
        key: &str,
    ) -> Result<Option<PaymentDetails>, StoreError> {
        let tables = self.tables.read().await;
        let payment = tables
            .payments
            .iter()
            .find(|p| p.org_id == org_id && p.idempotency_key.as_deref() == Some(key))
            .cloned();

        match payment {
            Some(payment) => Ok(Some(tables.payment_details(payment)?)),
            None => Ok(None),
        }
    }

    async fn list_payments(
        &self,
        org_id: Uuid,
        page: &PageRequest,
    ) -> Result<Page<Payment>, StoreError> {
        let tables = self.tables.read().await;
        let rows: Vec<Payment> = tables
            .payments
            .iter()
            .rev()
            .filter(|p| p.org_id == org_id)
            .cloned()
            .collect();

        Ok(paginate(rows, page))
    }

    async fn charge_payments(
        &self,
        org_id: Uuid,
        charge_id: Uuid,
    ) -> Result<Vec<Payment>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .iter()
            .filter(|p| p.org_id == org_id && p.charge_id == Some(charge_id))
            .cloned()
            .collect())
    }
}
