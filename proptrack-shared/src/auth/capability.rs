/// Capability strings
///
/// Each constant names one authorizable action. The seed migration installs
/// exactly [`ALL`] into the `permissions` table.

pub const ORGS_READ: &str = "orgs.read";
pub const ORGS_MANAGE: &str = "orgs.manage";
pub const MEMBERS_READ: &str = "members.read";
pub const MEMBERS_MANAGE: &str = "members.manage";
pub const ROLES_MANAGE: &str = "roles.manage";
pub const DOCUMENTS_READ: &str = "documents.read";
pub const DOCUMENTS_WRITE: &str = "documents.write";
pub const WORK_ORDERS_READ: &str = "work_orders.read";
pub const WORK_ORDERS_WRITE: &str = "work_orders.write";
pub const CONTACTS_READ: &str = "contacts.read";
pub const CONTACTS_WRITE: &str = "contacts.write";
pub const BILLING_READ: &str = "billing.read";
pub const BILLING_WRITE: &str = "billing.write";
pub const PAYMENTS_READ: &str = "payments.read";
pub const PAYMENTS_WRITE: &str = "payments.write";

/// The standard catalog
pub const ALL: &[&str] = &[
    ORGS_READ,
    ORGS_MANAGE,
    MEMBERS_READ,
    MEMBERS_MANAGE,
    ROLES_MANAGE,
    DOCUMENTS_READ,
    DOCUMENTS_WRITE,
    WORK_ORDERS_READ,
    WORK_ORDERS_WRITE,
    CONTACTS_READ,
    CONTACTS_WRITE,
    BILLING_READ,
    BILLING_WRITE,
    PAYMENTS_READ,
    PAYMENTS_WRITE,
];
