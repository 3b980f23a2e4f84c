/// Database models for PropTrack
///
/// Each model owns its row type, its input types and the SQL that reads and
/// writes it. Every query against a tenant-scoped table takes an `org_id`.
///
/// # Models
///
/// - `user`: User accounts
/// - `org`: Orgs (tenants) and plans
/// - `permission`: Capability catalog and org roles
/// - `membership`: User-org bindings through a role
/// - `document`: Stored document references
/// - `work_order`: Maintenance requests
/// - `contact`: Tenants, owners and vendors
/// - `invoice`: Invoices
/// - `charge`: Billable amounts and their reconciliation
/// - `payment`: Payments and receipts
///
/// # Example
///
/// ```no_run
/// use proptrack_shared::models::user::{CreateUser, User};
/// use proptrack_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let new_user = CreateUser {
///     email: "manager@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Pat Manager".to_string()),
/// };
///
/// let user = User::create(&pool, &new_user).await?;
/// # Ok(())
/// # }
/// ```

pub mod charge;
pub mod contact;
pub mod document;
pub mod invoice;
pub mod membership;
pub mod org;
pub mod payment;
pub mod permission;
pub mod user;
pub mod work_order;
