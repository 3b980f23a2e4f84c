/// Org membership endpoints
///
/// - `GET /v1/orgs/:org_id/members?page=&limit=` (`members.read`)
/// - `POST /v1/orgs/:org_id/members` (`members.manage`)
/// - `DELETE /v1/orgs/:org_id/members/:id` (`members.manage`), which marks
///   the membership revoked and returns it

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{Caller, ListQuery},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use proptrack_shared::{
    models::membership::{MemberSummary, Membership},
    pagination::Page,
    services::members::NewMember,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AddMemberRequest {
    /// Must belong to an existing user
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// A role of this org
    pub role_id: Uuid,
}

pub async fn list_members(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<MemberSummary>>> {
    let page = state
        .services
        .members
        .list_members(&caller.in_org(org_id), &query.page_request())
        .await?;
    Ok(Json(page))
}

/// Add an existing user to the org
///
/// # Errors
///
/// - `404 Not Found`: No user with that email, or the role isn't this org's
/// - `409 Conflict`: The user is already an active member
pub async fn add_member(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<Membership>)> {
    req.validate()?;

    let membership = state
        .services
        .members
        .add_member(
            &caller.in_org(org_id),
            NewMember {
                email: req.email,
                role_id: req.role_id,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(membership)))
}

pub async fn revoke_member(
    State(state): State<AppState>,
    caller: Caller,
    Path((org_id, membership_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<Membership>> {
    let membership = state
        .services
        .members
        .revoke_member(&caller.in_org(org_id), membership_id)
        .await?;
    Ok(Json(membership))
}
