/// Invoice model
///
/// # Schema
///
/// ```sql
/// CREATE TYPE invoice_status AS ENUM ('draft', 'sent', 'paid', 'void');
///
/// CREATE TABLE invoices (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
///     contact_id UUID REFERENCES contacts(id) ON DELETE SET NULL,
///     number VARCHAR(50) NOT NULL,
///     amount NUMERIC(14, 2) NOT NULL CHECK (amount >= 0),
///     due_date DATE,
///     status invoice_status NOT NULL DEFAULT 'draft',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     UNIQUE (org_id, number)
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Void,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invoice {
    pub id: Uuid,
    pub org_id: Uuid,
    pub contact_id: Option<Uuid>,

    /// Human-facing number, unique within the org
    pub number: String,

    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub contact_id: Option<Uuid>,
    pub number: String,
    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
}

const INVOICE_COLUMNS: &str = "id, org_id, contact_id, number, amount, due_date, status, created_at";

impl Invoice {
    /// Inserts a draft invoice
    ///
    /// The caller must have checked that `contact_id` belongs to `org_id`.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        data: &CreateInvoice,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO invoices (org_id, contact_id, number, amount, due_date, status)
            VALUES ($1, $2, $3, $4, $5, 'draft')
            RETURNING {}
            "#,
            INVOICE_COLUMNS
        );

        sqlx::query_as::<_, Invoice>(&query)
            .bind(org_id)
            .bind(data.contact_id)
            .bind(&data.number)
            .bind(data.amount)
            .bind(data.due_date)
            .fetch_one(executor)
            .await
    }

    pub async fn find<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM invoices WHERE org_id = $1 AND id = $2",
            INVOICE_COLUMNS
        );

        sqlx::query_as::<_, Invoice>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(executor)
            .await
    }
}
