/// Payment ledger transaction
///
/// Recording a payment is one all-or-nothing unit in the store:
///
/// 1. Check that the referenced invoice, charge and contact belong to the org
/// 2. Insert the payment with status `completed` and `processed_at = now`
/// 3. When a charge is referenced, sum its completed payments and mark it
///    `paid` once the sum reaches its amount
/// 4. Insert the receipt for the payment
///
/// If any step fails nothing is kept. Settlement with a card processor or
/// bank happens before this point; the ledger only records the outcome.
///
/// # Idempotency
///
/// A caller may send an `idempotency_key`. When a payment with the same key
/// already exists in the org, that payment is returned and nothing new is
/// written. Without a key, a resubmitted request records a second payment.
///
/// # Example
///
/// ```no_run
/// use proptrack_shared::models::payment::PaymentMethod;
/// use proptrack_shared::services::ledger::NewPayment;
/// use proptrack_shared::services::{RequestContext, Services};
/// use rust_decimal::Decimal;
///
/// # async fn example(services: Services, ctx: RequestContext, charge_id: uuid::Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let details = services
///     .ledger
///     .create_payment(
///         &ctx,
///         NewPayment::new(Decimal::new(4000, 2), PaymentMethod::Ach).for_charge(charge_id),
///     )
///     .await?;
///
/// println!("receipt at {}", details.receipt.url);
/// # Ok(())
/// # }
/// ```

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::billing::validate_amount;
use super::{RequestContext, ServiceError, ServiceResult};
use crate::auth::authorization::AuthorizationGuard;
use crate::auth::capability;
use crate::models::payment::{CreatePayment, Payment, PaymentDetails, PaymentMethod};
use crate::pagination::{Page, PageRequest};
use crate::store::{Store, StoreError};

/// Longest accepted idempotency key
pub const MAX_IDEMPOTENCY_KEY_LENGTH: usize = 255;

/// Produces the reference stored on a payment's receipt
#[async_trait]
pub trait ReceiptIssuer: Send + Sync {
    async fn issue(&self, org_id: Uuid, payment_id: Uuid) -> ServiceResult<String>;
}

/// Points receipts at `/receipts/{payment_id}` without rendering anything
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderReceipts;

#[async_trait]
impl ReceiptIssuer for PlaceholderReceipts {
    async fn issue(&self, _org_id: Uuid, payment_id: Uuid) -> ServiceResult<String> {
        Ok(format!("/receipts/{}", payment_id))
    }
}

/// Payment as submitted by a caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPayment {
    pub invoice_id: Option<Uuid>,
    pub charge_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: PaymentMethod,
    /// Processor-side reference, stored as given
    pub payment_method_id: Option<String>,
    pub idempotency_key: Option<String>,
}

impl NewPayment {
    /// A payment with no references
    pub fn new(amount: Decimal, method: PaymentMethod) -> Self {
        Self {
            invoice_id: None,
            charge_id: None,
            contact_id: None,
            amount,
            method,
            payment_method_id: None,
            idempotency_key: None,
        }
    }

    pub fn for_charge(mut self, charge_id: Uuid) -> Self {
        self.charge_id = Some(charge_id);
        self
    }

    pub fn for_invoice(mut self, invoice_id: Uuid) -> Self {
        self.invoice_id = Some(invoice_id);
        self
    }

    pub fn from_contact(mut self, contact_id: Uuid) -> Self {
        self.contact_id = Some(contact_id);
        self
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }
}

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn Store>,
    guard: AuthorizationGuard,
    receipts: Arc<dyn ReceiptIssuer>,
}

impl LedgerService {
    pub fn new(
        store: Arc<dyn Store>,
        guard: AuthorizationGuard,
        receipts: Arc<dyn ReceiptIssuer>,
    ) -> Self {
        Self {
            store,
            guard,
            receipts,
        }
    }

    pub async fn create_payment(
        &self,
        ctx: &RequestContext,
        input: NewPayment,
    ) -> ServiceResult<PaymentDetails> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::PAYMENTS_WRITE)
            .await?;

        validate_amount("amount", input.amount)?;
        let idempotency_key = normalize_key(input.idempotency_key)?;

        if let Some(key) = &idempotency_key {
            if let Some(existing) = self.store.find_payment_by_idempotency_key(org_id, key).await? {
                debug!(
                    org_id = %org_id,
                    payment_id = %existing.payment.id,
                    "Idempotency key replayed"
                );
                return Ok(existing);
            }
        }

        let payment_id = Uuid::new_v4();
        let receipt_url = self.receipts.issue(org_id, payment_id).await?;

        let result = self
            .store
            .record_payment(
                org_id,
                CreatePayment {
                    id: payment_id,
                    invoice_id: input.invoice_id,
                    charge_id: input.charge_id,
                    contact_id: input.contact_id,
                    amount: input.amount,
                    method: input.method,
                    payment_method_id: input.payment_method_id,
                    idempotency_key: idempotency_key.clone(),
                    receipt_url,
                },
            )
            .await;

        match (result, idempotency_key) {
            (Ok(details), _) => {
                info!(
                    org_id = %org_id,
                    payment_id = %details.payment.id,
                    charge_status = ?details.charge.as_ref().map(|c| c.status),
                    "Payment created"
                );
                Ok(details)
            }
            // A concurrent request with the same key committed first
            (Err(StoreError::Conflict(message)), Some(key)) => self
                .store
                .find_payment_by_idempotency_key(org_id, &key)
                .await?
                .ok_or(ServiceError::Conflict(message)),
            (Err(err), _) => Err(err.into()),
        }
    }

    /// Newest first
    pub async fn list_payments(
        &self,
        ctx: &RequestContext,
        page: &PageRequest,
    ) -> ServiceResult<Page<Payment>> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::PAYMENTS_READ)
            .await?;

        Ok(self.store.list_payments(org_id, page).await?)
    }
}

fn normalize_key(key: Option<String>) -> ServiceResult<Option<String>> {
    let Some(key) = key else {
        return Ok(None);
    };

    let key = key.trim();
    if key.is_empty() {
        return Err(ServiceError::validation("idempotency_key", "must not be empty"));
    }
    if key.len() > MAX_IDEMPOTENCY_KEY_LENGTH {
        return Err(ServiceError::validation(
            "idempotency_key",
            format!("must be at most {} characters", MAX_IDEMPOTENCY_KEY_LENGTH),
        ));
    }
    Ok(Some(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_placeholder_receipt_points_at_payment() {
        let payment_id = Uuid::new_v4();
        let url = PlaceholderReceipts.issue(Uuid::new_v4(), payment_id).await.unwrap();
        assert_eq!(url, format!("/receipts/{}", payment_id));
    }

    #[test]
    fn test_idempotency_key_rules() {
        assert_eq!(normalize_key(None).unwrap(), None);
        assert_eq!(
            normalize_key(Some("  retry-7 ".to_string())).unwrap(),
            Some("retry-7".to_string())
        );
        assert!(normalize_key(Some("   ".to_string())).is_err());
        assert!(normalize_key(Some("k".repeat(MAX_IDEMPOTENCY_KEY_LENGTH + 1))).is_err());
    }
}
