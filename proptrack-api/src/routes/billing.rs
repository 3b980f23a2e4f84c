/// Contacts, invoices and charges
///
/// # Endpoints
///
/// - `GET /v1/contacts` (`contacts.read`), `POST /v1/contacts` (`contacts.write`)
/// - `POST /v1/invoices` (`billing.write`), `GET /v1/invoices/:id` (`billing.read`)
/// - `GET /v1/charges?status=` (`billing.read`), `POST /v1/charges` (`billing.write`)
/// - `GET /v1/charges/:id` (`billing.read`), including `settled` and
///   `outstanding` totals
///
/// Amounts are decimal strings (`"1250.00"`), positive, at most two
/// decimal places.

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{Caller, ListQuery, OrgQuery},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use proptrack_shared::{
    models::{
        charge::{Charge, ChargeFilter, ChargeStatus, CreateCharge},
        contact::{Contact, ContactKind, CreateContact},
        invoice::{CreateInvoice, Invoice},
    },
    pagination::{Page, PageRequest},
    services::billing::ChargeSummary,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateContactRequest {
    pub org_id: Option<Uuid>,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 50, message = "Phone must be at most 50 characters"))]
    pub phone: Option<String>,

    #[serde(default)]
    pub kind: ContactKind,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub org_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,

    #[validate(length(min = 1, max = 50, message = "Number must be 1-50 characters"))]
    pub number: String,

    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChargeListQuery {
    pub org_id: Option<Uuid>,
    pub status: Option<ChargeStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateChargeRequest {
    pub org_id: Option<Uuid>,
    pub contact_id: Option<Uuid>,

    #[validate(length(min = 1, max = 500, message = "Description must be 1-500 characters"))]
    pub description: String,

    pub amount: Decimal,
    pub due_date: Option<NaiveDate>,
}

pub async fn list_contacts(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Contact>>> {
    let page = state
        .services
        .billing
        .list_contacts(&caller.context(query.org_id, None), &query.page_request())
        .await?;
    Ok(Json(page))
}

pub async fn create_contact(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<OrgQuery>,
    Json(req): Json<CreateContactRequest>,
) -> ApiResult<(StatusCode, Json<Contact>)> {
    req.validate()?;

    let ctx = caller.context(query.org_id, req.org_id);
    let contact = state
        .services
        .billing
        .create_contact(
            &ctx,
            CreateContact {
                name: req.name,
                email: req.email,
                phone: req.phone,
                kind: req.kind,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

/// Create an invoice
///
/// # Errors
///
/// - `404 Not Found`: `contact_id` isn't a contact of this org
/// - `409 Conflict`: Invoice number already used in this org
/// - `422 Unprocessable Entity`: Bad amount or number
pub async fn create_invoice(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<OrgQuery>,
    Json(req): Json<CreateInvoiceRequest>,
) -> ApiResult<(StatusCode, Json<Invoice>)> {
    req.validate()?;

    let ctx = caller.context(query.org_id, req.org_id);
    let invoice = state
        .services
        .billing
        .create_invoice(
            &ctx,
            CreateInvoice {
                contact_id: req.contact_id,
                number: req.number,
                amount: req.amount,
                due_date: req.due_date,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<OrgQuery>,
) -> ApiResult<Json<Invoice>> {
    let invoice = state
        .services
        .billing
        .get_invoice(&caller.context(query.org_id, None), id)
        .await?;
    Ok(Json(invoice))
}

pub async fn list_charges(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ChargeListQuery>,
) -> ApiResult<Json<Page<Charge>>> {
    let page = state
        .services
        .billing
        .list_charges(
            &caller.context(query.org_id, None),
            &ChargeFilter {
                status: query.status,
            },
            &PageRequest::new(query.page, query.limit),
        )
        .await?;
    Ok(Json(page))
}

pub async fn create_charge(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<OrgQuery>,
    Json(req): Json<CreateChargeRequest>,
) -> ApiResult<(StatusCode, Json<Charge>)> {
    req.validate()?;

    let ctx = caller.context(query.org_id, req.org_id);
    let charge = state
        .services
        .billing
        .create_charge(
            &ctx,
            CreateCharge {
                contact_id: req.contact_id,
                description: req.description,
                amount: req.amount,
                due_date: req.due_date,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(charge)))
}

pub async fn get_charge(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<OrgQuery>,
) -> ApiResult<Json<ChargeSummary>> {
    let summary = state
        .services
        .billing
        .get_charge(&caller.context(query.org_id, None), id)
        .await?;
    Ok(Json(summary))
}
