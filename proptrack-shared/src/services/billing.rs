/// Contacts, invoices and charges
///
/// Invoices and charges may reference a contact; the contact must belong to
/// the same org or the write fails with NotFound. A charge's status is never
/// set here: it starts `pending` and only the ledger moves it to `paid`.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{RequestContext, ServiceError, ServiceResult};
use crate::auth::authorization::AuthorizationGuard;
use crate::auth::capability;
use crate::models::charge::{self, Charge, ChargeFilter, CreateCharge};
use crate::models::contact::{Contact, CreateContact};
use crate::models::invoice::{CreateInvoice, Invoice};
use crate::pagination::{Page, PageRequest};
use crate::store::Store;

/// A charge with its settlement position
#[derive(Debug, Clone, Serialize)]
pub struct ChargeSummary {
    #[serde(flatten)]
    pub charge: Charge,

    /// Sum of completed payments
    pub settled: Decimal,

    /// What is still owed, never negative
    pub outstanding: Decimal,
}

impl ChargeSummary {
    pub fn new(charge: Charge, settled: Decimal) -> Self {
        let outstanding = (charge.amount - settled).max(Decimal::ZERO);
        Self {
            charge,
            settled,
            outstanding,
        }
    }
}

/// Largest amount a `NUMERIC(14, 2)` column holds, in cents
const MAX_AMOUNT_CENTS: i64 = 99_999_999_999_999;

/// Amounts must be positive, at most 999,999,999,999.99, with at most two
/// decimal places
pub fn validate_amount(field: &'static str, amount: Decimal) -> ServiceResult<()> {
    if amount <= Decimal::ZERO {
        return Err(ServiceError::validation(field, "must be greater than zero"));
    }
    if amount > Decimal::new(MAX_AMOUNT_CENTS, 2) {
        return Err(ServiceError::validation(field, "must not exceed 999999999999.99"));
    }
    if amount.normalize().scale() > 2 {
        return Err(ServiceError::validation(field, "must have at most two decimal places"));
    }
    Ok(())
}

#[derive(Clone)]
pub struct BillingService {
    store: Arc<dyn Store>,
    guard: AuthorizationGuard,
}

impl BillingService {
    pub fn new(store: Arc<dyn Store>, guard: AuthorizationGuard) -> Self {
        Self { store, guard }
    }

    pub async fn create_contact(&self, ctx: &RequestContext, data: CreateContact) -> ServiceResult<Contact> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::CONTACTS_WRITE)
            .await?;

        if data.name.trim().is_empty() {
            return Err(ServiceError::validation("name", "must not be empty"));
        }

        Ok(self.store.create_contact(org_id, data).await?)
    }

    pub async fn list_contacts(
        &self,
        ctx: &RequestContext,
        page: &PageRequest,
    ) -> ServiceResult<Page<Contact>> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::CONTACTS_READ)
            .await?;

        Ok(self.store.list_contacts(org_id, page).await?)
    }

    pub async fn create_invoice(&self, ctx: &RequestContext, data: CreateInvoice) -> ServiceResult<Invoice> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::BILLING_WRITE)
            .await?;

        if data.number.trim().is_empty() {
            return Err(ServiceError::validation("number", "must not be empty"));
        }
        validate_amount("amount", data.amount)?;
        self.ensure_contact(org_id, data.contact_id).await?;

        let invoice = self.store.create_invoice(org_id, data).await?;
        info!(org_id = %org_id, invoice_id = %invoice.id, number = %invoice.number, "Invoice created");
        Ok(invoice)
    }

    pub async fn get_invoice(&self, ctx: &RequestContext, id: Uuid) -> ServiceResult<Invoice> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::BILLING_READ)
            .await?;

        self.store
            .find_invoice(org_id, id)
            .await?
            .ok_or(ServiceError::NotFound("invoice"))
    }

    pub async fn create_charge(&self, ctx: &RequestContext, data: CreateCharge) -> ServiceResult<Charge> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::BILLING_WRITE)
            .await?;

        if data.description.trim().is_empty() {
            return Err(ServiceError::validation("description", "must not be empty"));
        }
        validate_amount("amount", data.amount)?;
        self.ensure_contact(org_id, data.contact_id).await?;

        let charge = self.store.create_charge(org_id, data).await?;
        info!(org_id = %org_id, charge_id = %charge.id, amount = %charge.amount, "Charge created");
        Ok(charge)
    }

    pub async fn get_charge(&self, ctx: &RequestContext, id: Uuid) -> ServiceResult<ChargeSummary> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::BILLING_READ)
            .await?;

        let charge = self
            .store
            .find_charge(org_id, id)
            .await?
            .ok_or(ServiceError::NotFound("charge"))?;
        let payments = self.store.charge_payments(org_id, id).await?;

        Ok(ChargeSummary::new(charge, charge::settled_total(&payments)))
    }

    pub async fn list_charges(
        &self,
        ctx: &RequestContext,
        filter: &ChargeFilter,
        page: &PageRequest,
    ) -> ServiceResult<Page<Charge>> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::BILLING_READ)
            .await?;

        Ok(self.store.list_charges(org_id, filter, page).await?)
    }

    async fn ensure_contact(&self, org_id: Uuid, contact_id: Option<Uuid>) -> ServiceResult<()> {
        let Some(contact_id) = contact_id else {
            return Ok(());
        };

        self.store
            .find_contact(org_id, contact_id)
            .await?
            .map(|_| ())
            .ok_or(ServiceError::NotFound("contact"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_amount_rules() {
        assert!(validate_amount("amount", dec("40.00")).is_ok());
        assert!(validate_amount("amount", dec("0.01")).is_ok());
        assert!(validate_amount("amount", dec("0")).is_err());
        assert!(validate_amount("amount", dec("-5")).is_err());
        assert!(validate_amount("amount", dec("1.005")).is_err());
        assert!(validate_amount("amount", dec("999999999999.99")).is_ok());
        assert!(validate_amount("amount", dec("1000000000000.00")).is_err());
        assert!(validate_amount("amount", dec("1000000000000000.00")).is_err());
        // Trailing zeros beyond two places are still a whole cent
        assert!(validate_amount("amount", dec("12.5000")).is_ok());
    }
}
