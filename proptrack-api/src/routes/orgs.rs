/// Org endpoints
///
/// # Endpoints
///
/// - `POST /v1/orgs` - Create an org; the caller becomes its Admin
/// - `GET /v1/orgs` - Orgs the caller belongs to
/// - `GET /v1/orgs/:org_id` - Org details (`orgs.read`)
/// - `PATCH /v1/orgs/:org_id` - Rename (`orgs.manage`)

use crate::{app::AppState, error::ApiResult, routes::Caller};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use proptrack_shared::{
    models::org::{Org, UpdateOrg, UserOrg},
    services::{
        orgs::{slugify, NewOrg},
        RequestContext,
    },
    store::OrgBootstrap,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrgRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    /// Derived from `name` when omitted
    pub slug: Option<String>,

    /// Starter plan when omitted
    pub plan_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrgRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
}

/// Create an org
///
/// Writes the org, its Admin role (granted every capability in the current
/// catalog) and the caller's membership as one unit.
///
/// # Endpoint
///
/// ```text
/// POST /v1/orgs
///
/// { "name": "Maple Court", "slug": "maple-court" }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: No caller
/// - `409 Conflict`: Slug taken
/// - `422 Unprocessable Entity`: Invalid name or slug
/// - `500 Internal Server Error`: No starter plan or empty permission catalog
pub async fn create_org(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<CreateOrgRequest>,
) -> ApiResult<(StatusCode, Json<OrgBootstrap>)> {
    req.validate()?;

    let slug = req.slug.unwrap_or_else(|| slugify(&req.name));
    let bootstrap = state
        .services
        .orgs
        .create_org(
            &RequestContext::new(caller, None),
            NewOrg {
                name: req.name,
                slug,
                plan_id: req.plan_id,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(bootstrap)))
}

pub async fn list_orgs(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<Vec<UserOrg>>> {
    let orgs = state
        .services
        .orgs
        .list_my_orgs(&RequestContext::new(caller, None))
        .await?;
    Ok(Json(orgs))
}

pub async fn get_org(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<Uuid>,
) -> ApiResult<Json<Org>> {
    Ok(Json(state.services.orgs.get_org(&caller.in_org(org_id)).await?))
}

pub async fn update_org(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<Uuid>,
    Json(req): Json<UpdateOrgRequest>,
) -> ApiResult<Json<Org>> {
    req.validate()?;

    let org = state
        .services
        .orgs
        .update_org(&caller.in_org(org_id), UpdateOrg { name: req.name })
        .await?;
    Ok(Json(org))
}
