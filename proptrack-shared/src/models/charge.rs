/// Charge model and reconciliation
///
/// A charge is a billable amount that accumulates payments until settled.
/// Its status is only ever changed by the payment ledger: once the sum of
/// its completed payments reaches the charge amount it becomes `paid`.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE charge_status AS ENUM ('pending', 'paid');
///
/// CREATE TABLE charges (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
///     contact_id UUID REFERENCES contacts(id) ON DELETE SET NULL,
///     description TEXT NOT NULL,
///     amount NUMERIC(14, 2) NOT NULL CHECK (amount > 0),
///     due_date DATE,
///     status charge_status NOT NULL DEFAULT 'pending',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Reconciliation
///
/// [`settled_total`] and [`reconcile`] are pure so that every store computes
/// the same answer from the same payments. Sums use [`Decimal`], never
/// floating point.
///
/// ```
/// use proptrack_shared::models::charge::{reconcile, ChargeStatus};
/// use rust_decimal::Decimal;
///
/// let amount = Decimal::new(10000, 2); // 100.00
/// let settled = Decimal::new(6000, 2) + Decimal::new(4000, 2);
/// assert_eq!(reconcile(ChargeStatus::Pending, amount, settled), ChargeStatus::Paid);
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

use super::payment::{Payment, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "charge_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ChargeStatus {
    /// Still accepting payments
    Pending,

    /// Completed payments cover the amount
    Paid,
}

impl ChargeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Pending => "pending",
            ChargeStatus::Paid => "paid",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Charge {
    pub id: Uuid,
    pub org_id: Uuid,
    pub contact_id: Option<Uuid>,
    pub description: String,
    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub status: ChargeStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCharge {
    pub contact_id: Option<Uuid>,
    pub description: String,
    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChargeFilter {
    pub status: Option<ChargeStatus>,
}

/// Sum of the amounts of completed payments
pub fn settled_total<'a, I>(payments: I) -> Decimal
where
    I: IntoIterator<Item = &'a Payment>,
{
    payments
        .into_iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .map(|p| p.amount)
        .sum()
}

/// Status a charge should have given what has been settled against it
///
/// A paid charge stays paid, so running this again over the same payments
/// gives the same answer.
pub fn reconcile(current: ChargeStatus, amount: Decimal, settled: Decimal) -> ChargeStatus {
    if settled >= amount {
        ChargeStatus::Paid
    } else {
        current
    }
}

const CHARGE_COLUMNS: &str =
    "id, org_id, contact_id, description, amount, due_date, status, created_at, updated_at";

impl Charge {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        data: &CreateCharge,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO charges (org_id, contact_id, description, amount, due_date, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING {}
            "#,
            CHARGE_COLUMNS
        );

        sqlx::query_as::<_, Charge>(&query)
            .bind(org_id)
            .bind(data.contact_id)
            .bind(&data.description)
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
            "SELECT {} FROM charges WHERE org_id = $1 AND id = $2",
            CHARGE_COLUMNS
        );

        sqlx::query_as::<_, Charge>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Same as [`Charge::find`] but takes a row lock until the transaction ends
    ///
    /// Concurrent payments against one charge serialize on this lock, so
    /// each one reconciles against every payment committed before it.
    pub async fn find_for_update<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM charges WHERE org_id = $1 AND id = $2 FOR UPDATE",
            CHARGE_COLUMNS
        );

        sqlx::query_as::<_, Charge>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        filter: &ChargeFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM charges
            WHERE org_id = $1 AND ($2::charge_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            CHARGE_COLUMNS
        );

        sqlx::query_as::<_, Charge>(&query)
            .bind(org_id)
            .bind(filter.status)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn count<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        filter: &ChargeFilter,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM charges WHERE org_id = $1 AND ($2::charge_status IS NULL OR status = $2)",
        )
        .bind(org_id)
        .bind(filter.status)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    /// Writes a reconciled status back
    pub async fn set_status<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        id: Uuid,
        status: ChargeStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE charges
            SET status = $3, updated_at = NOW()
            WHERE org_id = $1 AND id = $2
            RETURNING {}
            "#,
            CHARGE_COLUMNS
        );

        sqlx::query_as::<_, Charge>(&query)
            .bind(org_id)
            .bind(id)
            .bind(status)
            .fetch_optional(executor)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::payment::PaymentMethod;

    fn payment(amount: Decimal, status: PaymentStatus) -> Payment {
        let now = Utc::now();
        Payment {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            invoice_id: None,
            charge_id: None,
            contact_id: None,
            amount,
            method: PaymentMethod::Card,
            payment_method_id: None,
            status,
            processed_at: now,
            idempotency_key: None,
            created_at: now,
        }
    }

    fn dec(cents: i64) -> Decimal {
        Decimal::new(cents, 2)
    }

    #[test]
    fn test_settled_total_counts_only_completed() {
        let payments = vec![
            payment(dec(6000), PaymentStatus::Completed),
            payment(dec(2500), PaymentStatus::Failed),
            payment(dec(4000), PaymentStatus::Completed),
        ];

        assert_eq!(settled_total(&payments), dec(10000));
    }

    #[test]
    fn test_settled_total_is_exact() {
        // 0.1 + 0.2 drifts in floating point
        let payments = vec![
            payment(dec(10), PaymentStatus::Completed),
            payment(dec(20), PaymentStatus::Completed),
        ];

        assert_eq!(settled_total(&payments), dec(30));
        assert_eq!(reconcile(ChargeStatus::Pending, dec(30), dec(30)), ChargeStatus::Paid);
    }

    #[test]
    fn test_reconcile_partial_payment_stays_pending() {
        assert_eq!(
            reconcile(ChargeStatus::Pending, dec(10000), dec(6000)),
            ChargeStatus::Pending
        );
    }

    #[test]
    fn test_reconcile_overpayment_is_paid() {
        assert_eq!(
            reconcile(ChargeStatus::Pending, dec(10000), dec(12000)),
            ChargeStatus::Paid
        );
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let payments = vec![
            payment(dec(6000), PaymentStatus::Completed),
            payment(dec(4000), PaymentStatus::Completed),
        ];
        let amount = dec(10000);

        let first = reconcile(ChargeStatus::Pending, amount, settled_total(&payments));
        let second = reconcile(first, amount, settled_total(&payments));

        assert_eq!(first, ChargeStatus::Paid);
        assert_eq!(second, first);

        let partial = &payments[..1];
        let first = reconcile(ChargeStatus::Pending, amount, settled_total(partial));
        let second = reconcile(first, amount, settled_total(partial));
        assert_eq!(first, ChargeStatus::Pending);
        assert_eq!(second, first);
    }

    #[test]
    fn test_paid_charge_stays_paid() {
        assert_eq!(
            reconcile(ChargeStatus::Paid, dec(10000), Decimal::ZERO),
            ChargeStatus::Paid
        );
    }
}
