/// Contact model
///
/// Contacts are the people an org bills or pays: tenants, owners and
/// vendors. Payments, invoices and charges may point at one.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE contact_kind AS ENUM ('tenant', 'owner', 'vendor');
///
/// CREATE TABLE contacts (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     email TEXT,
///     phone VARCHAR(50),
///     kind contact_kind NOT NULL DEFAULT 'tenant',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "contact_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContactKind {
    Tenant,
    Owner,
    Vendor,
}

impl Default for ContactKind {
    fn default() -> Self {
        ContactKind::Tenant
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Contact {
    pub id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub kind: ContactKind,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateContact {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub kind: ContactKind,
}

const CONTACT_COLUMNS: &str = "id, org_id, name, email, phone, kind, created_at";

impl Contact {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        data: &CreateContact,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO contacts (org_id, name, email, phone, kind)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            CONTACT_COLUMNS
        );

        sqlx::query_as::<_, Contact>(&query)
            .bind(org_id)
            .bind(&data.name)
            .bind(&data.email)
            .bind(&data.phone)
            .bind(data.kind)
            .fetch_one(executor)
            .await
    }

    pub async fn find<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM contacts WHERE org_id = $1 AND id = $2",
            CONTACT_COLUMNS
        );

        sqlx::query_as::<_, Contact>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// One page of an org's contacts, alphabetical
    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM contacts
            WHERE org_id = $1
            ORDER BY name ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
            CONTACT_COLUMNS
        );

        sqlx::query_as::<_, Contact>(&query)
            .bind(org_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn count<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM contacts WHERE org_id = $1")
            .bind(org_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}
