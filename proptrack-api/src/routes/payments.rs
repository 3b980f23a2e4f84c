/// Payment ledger endpoints
///
/// # Endpoints
///
/// - `GET /v1/payments?org_id=&page=&limit=` (`payments.read`)
/// - `POST /v1/payments` (`payments.write`)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult, ValidationErrorDetail},
    routes::{Caller, ListQuery, OrgQuery},
};
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use proptrack_shared::{
    models::payment::{Payment, PaymentDetails, PaymentMethod},
    pagination::Page,
    services::ledger::{NewPayment, MAX_IDEMPOTENCY_KEY_LENGTH},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub org_id: Option<Uuid>,
    pub invoice_id: Option<Uuid>,
    pub charge_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,
    pub amount: Decimal,
    pub method: PaymentMethod,

    /// Processor reference, e.g. a card token id
    #[validate(length(max = 255, message = "Payment method id must be at most 255 characters"))]
    pub payment_method_id: Option<String>,

    /// Also accepted as the `Idempotency-Key` header, which wins
    #[validate(length(min = 1, max = 255, message = "Idempotency key must be 1-255 characters"))]
    pub idempotency_key: Option<String>,
}

pub async fn list_payments(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Payment>>> {
    let page = state
        .services
        .ledger
        .list_payments(&caller.context(query.org_id, None), &query.page_request())
        .await?;
    Ok(Json(page))
}

/// Record a payment
///
/// In one transaction: the payment is stored as completed, the charge (if
/// any) is re-evaluated and flips to `paid` once completed payments cover
/// its amount, and exactly one receipt is written. Nothing is written if
/// any step fails.
///
/// Resubmitting with the same idempotency key returns the original payment
/// instead of recording a second one. Without a key every request records
/// a new payment.
///
/// # Endpoint
///
/// ```text
/// POST /v1/payments
/// Idempotency-Key: checkout-8812
///
/// {
///   "org_id": "uuid",
///   "charge_id": "uuid",
///   "amount": "40.00",
///   "method": "card"
/// }
/// ```
///
/// # Response (201)
///
/// The payment with its joined `contact`, `invoice`, `charge` (post-update
/// status) and `receipt`.
///
/// # Errors
///
/// - `403 Forbidden`: Not a member, or missing `payments.write`
/// - `404 Not Found`: Invoice, charge or contact isn't this org's
/// - `422 Unprocessable Entity`: Non-positive amount or more than two decimals
pub async fn create_payment(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<OrgQuery>,
    headers: HeaderMap,
    Json(req): Json<CreatePaymentRequest>,
) -> ApiResult<(StatusCode, Json<PaymentDetails>)> {
    req.validate()?;

    let idempotency_key = match header_key(&headers)? {
        Some(key) => Some(key),
        None => req.idempotency_key,
    };

    let ctx = caller.context(query.org_id, req.org_id);
    let details = state
        .services
        .ledger
        .create_payment(
            &ctx,
            NewPayment {
                invoice_id: req.invoice_id,
                charge_id: req.charge_id,
                contact_id: req.contact_id,
                amount: req.amount,
                method: req.method,
                payment_method_id: req.payment_method_id,
                idempotency_key,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(details)))
}

fn header_key(headers: &HeaderMap) -> ApiResult<Option<String>> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY_HEADER) else {
        return Ok(None);
    };

    let key = value
        .to_str()
        .map(str::trim)
        .ok()
        .filter(|k| !k.is_empty() && k.len() <= MAX_IDEMPOTENCY_KEY_LENGTH)
        .ok_or_else(|| {
            ApiError::ValidationError(vec![ValidationErrorDetail::new(
                "idempotency_key",
                "Idempotency-Key header must be 1-255 visible ASCII characters",
            )])
        })?;

    Ok(Some(key.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_header_key() {
        let mut headers = HeaderMap::new();
        assert_eq!(header_key(&headers).unwrap(), None);

        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static(" checkout-1 "));
        assert_eq!(header_key(&headers).unwrap(), Some("checkout-1".to_string()));

        headers.insert(IDEMPOTENCY_KEY_HEADER, HeaderValue::from_static("   "));
        assert!(header_key(&headers).is_err());
    }
}
