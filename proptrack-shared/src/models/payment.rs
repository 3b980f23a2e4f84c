/// Payment and receipt models
///
/// Payments record settlement only. Gateway authorization happens before a
/// payment reaches this service, so every row is written as `completed` and
/// never changes afterwards. Each payment has exactly one receipt, created
/// in the same transaction.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE payment_method AS ENUM ('cash', 'check', 'card', 'ach', 'bank_transfer', 'other');
/// CREATE TYPE payment_status AS ENUM ('pending', 'completed', 'failed');
///
/// CREATE TABLE payments (
///     id UUID PRIMARY KEY,
///     org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
///     invoice_id UUID REFERENCES invoices(id),
///     charge_id UUID REFERENCES charges(id),
///     contact_id UUID REFERENCES contacts(id),
///     amount NUMERIC(14, 2) NOT NULL CHECK (amount > 0),
///     method payment_method NOT NULL,
///     payment_method_id VARCHAR(255),
///     status payment_status NOT NULL DEFAULT 'completed',
///     processed_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     idempotency_key VARCHAR(255),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// CREATE UNIQUE INDEX payments_idempotency_key
///     ON payments (org_id, idempotency_key) WHERE idempotency_key IS NOT NULL;
///
/// CREATE TABLE receipts (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
///     payment_id UUID NOT NULL UNIQUE REFERENCES payments(id) ON DELETE CASCADE,
///     url TEXT NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::charge::Charge;
use super::contact::Contact;
use super::invoice::Invoice;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Check,
    Card,
    Ach,
    BankTransfer,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub org_id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub charge_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: PaymentMethod,

    /// Gateway reference (card token, ACH transfer ID)
    pub payment_method_id: Option<String>,

    pub status: PaymentStatus,
    pub processed_at: DateTime<Utc>,

    /// Caller-supplied key that makes resubmission safe
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,

    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Receipt {
    pub id: Uuid,
    pub org_id: Uuid,
    pub payment_id: Uuid,

    /// Where the rendered receipt lives
    pub url: String,

    pub created_at: DateTime<Utc>,
}

/// Payment joined with everything it points at
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(flatten)]
    pub payment: Payment,
    pub contact: Option<Contact>,
    pub invoice: Option<Invoice>,
    pub charge: Option<Charge>,
    pub receipt: Receipt,
}

/// Fully resolved input for the ledger write
///
/// The payment ID is chosen before the write so the receipt URL can be
/// derived from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePayment {
    pub id: Uuid,
    pub invoice_id: Option<Uuid>,
    pub charge_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub payment_method_id: Option<String>,
    pub idempotency_key: Option<String>,
    pub receipt_url: String,
}

const PAYMENT_COLUMNS: &str = "id, org_id, invoice_id, charge_id, contact_id, amount, method, \
     payment_method_id, status, processed_at, idempotency_key, created_at";

const RECEIPT_COLUMNS: &str = "id, org_id, payment_id, url, created_at";

impl Payment {
    /// Inserts a completed payment processed now
    ///
    /// # Errors
    ///
    /// Unique violation on `payments_idempotency_key` if the key was already
    /// used in this org.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        data: &CreatePayment,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO payments
                (id, org_id, invoice_id, charge_id, contact_id, amount, method,
                 payment_method_id, status, processed_at, idempotency_key)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'completed', NOW(), $9)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );

        sqlx::query_as::<_, Payment>(&query)
            .bind(data.id)
            .bind(org_id)
            .bind(data.invoice_id)
            .bind(data.charge_id)
            .bind(data.contact_id)
            .bind(data.amount)
            .bind(data.method)
            .bind(&data.payment_method_id)
            .bind(&data.idempotency_key)
            .fetch_one(executor)
            .await
    }

    pub async fn find<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM payments WHERE org_id = $1 AND id = $2",
            PAYMENT_COLUMNS
        );

        sqlx::query_as::<_, Payment>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn find_by_idempotency_key<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        key: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM payments WHERE org_id = $1 AND idempotency_key = $2",
            PAYMENT_COLUMNS
        );

        sqlx::query_as::<_, Payment>(&query)
            .bind(org_id)
            .bind(key)
            .fetch_optional(executor)
            .await
    }

    /// Every payment recorded against a charge
    pub async fn list_for_charge<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        charge_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM payments
            WHERE org_id = $1 AND charge_id = $2
            ORDER BY processed_at ASC, id ASC
            "#,
            PAYMENT_COLUMNS
        );

        sqlx::query_as::<_, Payment>(&query)
            .bind(org_id)
            .bind(charge_id)
            .fetch_all(executor)
            .await
    }

    /// One page of an org's payments, newest first
    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM payments
            WHERE org_id = $1
            ORDER BY processed_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
            PAYMENT_COLUMNS
        );

        sqlx::query_as::<_, Payment>(&query)
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
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM payments WHERE org_id = $1")
            .bind(org_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}

impl Receipt {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        payment_id: Uuid,
        url: &str,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO receipts (org_id, payment_id, url) VALUES ($1, $2, $3) RETURNING {}",
            RECEIPT_COLUMNS
        );

        sqlx::query_as::<_, Receipt>(&query)
            .bind(org_id)
            .bind(payment_id)
            .bind(url)
            .fetch_one(executor)
            .await
    }

    pub async fn find_for_payment<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        payment_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM receipts WHERE org_id = $1 AND payment_id = $2",
            RECEIPT_COLUMNS
        );

        sqlx::query_as::<_, Receipt>(&query)
            .bind(org_id)
            .bind(payment_id)
            .fetch_optional(executor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_serialization() {
        assert_eq!(
            serde_json::to_value(PaymentMethod::BankTransfer).unwrap(),
            "bank_transfer"
        );
        let method: PaymentMethod = serde_json::from_str("\"ach\"").unwrap();
        assert_eq!(method, PaymentMethod::Ach);
    }

    #[test]
    fn test_amount_serializes_as_exact_string() {
        let now = Utc::now();
        let payment = Payment {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            invoice_id: None,
            charge_id: None,
            contact_id: None,
            amount: Decimal::new(4000, 2),
            method: PaymentMethod::Cash,
            payment_method_id: None,
            status: PaymentStatus::Completed,
            processed_at: now,
            idempotency_key: None,
            created_at: now,
        };

        let json = serde_json::to_value(&payment).unwrap();
        assert_eq!(json["amount"], "40.00");
        assert_eq!(json["status"], "completed");
        assert!(json.get("idempotency_key").is_none());
    }
}
