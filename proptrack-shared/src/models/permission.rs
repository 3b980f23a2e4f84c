/// Permission catalog and org roles
///
/// Permissions form a global catalog of capability strings such as
/// `"documents.write"`. Roles belong to one org and hold a set of
/// permissions through `role_permissions`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE permissions (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL UNIQUE,
///     description TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// CREATE TABLE roles (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
///     name VARCHAR(100) NOT NULL,
///     is_system BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (org_id, name)
/// );
///
/// CREATE TABLE role_permissions (
///     role_id UUID NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
///     permission_id UUID NOT NULL REFERENCES permissions(id) ON DELETE CASCADE,
///     PRIMARY KEY (role_id, permission_id)
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Name of the role every org gets at creation
pub const ADMIN_ROLE_NAME: &str = "Admin";

/// One entry of the global capability catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permission {
    pub id: Uuid,

    /// Capability string, e.g. `"payments.write"`
    pub name: String,

    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// Org-owned role
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,

    pub org_id: Uuid,

    pub name: String,

    /// Set for the auto-created Admin role
    pub is_system: bool,

    pub created_at: DateTime<Utc>,
}

/// Role together with the capability strings it grants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleWithCapabilities {
    #[serde(flatten)]
    pub role: Role,

    /// Sorted capability strings
    pub capabilities: Vec<String>,
}

/// Input for creating a role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRole {
    pub org_id: Uuid,
    pub name: String,
    pub is_system: bool,
}

const ROLE_COLUMNS: &str = "id, org_id, name, is_system, created_at";

impl Permission {
    /// Lists the whole catalog, ordered by name
    pub async fn list_all<'e, E: PgExecutor<'e>>(executor: E) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Permission>(
            "SELECT id, name, description, created_at FROM permissions ORDER BY name ASC",
        )
        .fetch_all(executor)
        .await
    }
}

impl Role {
    /// Creates a role in an org
    ///
    /// # Errors
    ///
    /// Unique violation on `roles_org_id_name_key` if the org already has a
    /// role with this name.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &CreateRole,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO roles (org_id, name, is_system) VALUES ($1, $2, $3) RETURNING {}",
            ROLE_COLUMNS
        );

        sqlx::query_as::<_, Role>(&query)
            .bind(data.org_id)
            .bind(&data.name)
            .bind(data.is_system)
            .fetch_one(executor)
            .await
    }

    /// Finds a role, scoped to its org
    pub async fn find_in_org<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        role_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM roles WHERE org_id = $1 AND id = $2",
            ROLE_COLUMNS
        );

        sqlx::query_as::<_, Role>(&query)
            .bind(org_id)
            .bind(role_id)
            .fetch_optional(executor)
            .await
    }

    /// Lists an org's roles, oldest first
    pub async fn list_by_org<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM roles WHERE org_id = $1 ORDER BY created_at ASC, name ASC",
            ROLE_COLUMNS
        );

        sqlx::query_as::<_, Role>(&query)
            .bind(org_id)
            .fetch_all(executor)
            .await
    }

    /// Binds permissions to a role, ignoring ones it already holds
    pub async fn grant<'e, E: PgExecutor<'e>>(
        executor: E,
        role_id: Uuid,
        permission_ids: &[Uuid],
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission_id)
            SELECT $1, UNNEST($2::uuid[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission_ids)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Capability strings held by one role of an org
    ///
    /// The org filter means a role ID from another org yields nothing.
    pub async fn capabilities<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        role_id: Uuid,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT p.name
            FROM role_permissions rp
            JOIN roles r ON r.id = rp.role_id
            JOIN permissions p ON p.id = rp.permission_id
            WHERE r.org_id = $1 AND r.id = $2
            ORDER BY p.name ASC
            "#,
        )
        .bind(org_id)
        .bind(role_id)
        .fetch_all(executor)
        .await
    }

    /// Union of capability strings across every role of an org
    pub async fn capabilities_for_org<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
    ) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT DISTINCT p.name
            FROM role_permissions rp
            JOIN roles r ON r.id = rp.role_id
            JOIN permissions p ON p.id = rp.permission_id
            WHERE r.org_id = $1
            ORDER BY p.name ASC
            "#,
        )
        .bind(org_id)
        .fetch_all(executor)
        .await
    }
}
