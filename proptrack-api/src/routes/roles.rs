/// Roles and capabilities within an org
///
/// # Endpoints
///
/// - `GET /v1/orgs/:org_id/roles` - Roles with their capabilities (`members.read`)
/// - `POST /v1/orgs/:org_id/roles` - Custom role (`roles.manage`)
/// - `POST /v1/orgs/:org_id/roles/:id/permissions` - Grant more (`roles.manage`)
/// - `GET /v1/orgs/:org_id/permissions` - Every capability any role here
///   grants (`members.read`)
///
/// Capability names must exist in the global catalog, otherwise 422.

use crate::{app::AppState, error::ApiResult, routes::Caller};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use proptrack_shared::models::permission::RoleWithCapabilities;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[serde(default)]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GrantPermissionRequest {
    #[validate(length(min = 1, message = "At least one capability is required"))]
    pub capabilities: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CapabilitiesResponse {
    pub capabilities: Vec<String>,
}

pub async fn list_roles(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<Uuid>,
) -> ApiResult<Json<Vec<RoleWithCapabilities>>> {
    let roles = state
        .services
        .permissions
        .list_roles(&caller.in_org(org_id))
        .await?;
    Ok(Json(roles))
}

pub async fn create_role(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<Uuid>,
    Json(req): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleWithCapabilities>)> {
    req.validate()?;

    let role = state
        .services
        .permissions
        .create_role(&caller.in_org(org_id), &req.name, &req.capabilities)
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// Grant additional capabilities to a role
///
/// This is how an existing Admin role picks up capabilities added to the
/// catalog after the org was created.
///
/// # Errors
///
/// - `404 Not Found`: Role isn't this org's
/// - `422 Unprocessable Entity`: Unknown capability name
pub async fn grant_permission(
    State(state): State<AppState>,
    caller: Caller,
    Path((org_id, role_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<GrantPermissionRequest>,
) -> ApiResult<Json<RoleWithCapabilities>> {
    req.validate()?;

    let role = state
        .services
        .permissions
        .grant_permission(&caller.in_org(org_id), role_id, &req.capabilities)
        .await?;
    Ok(Json(role))
}

pub async fn org_capabilities(
    State(state): State<AppState>,
    caller: Caller,
    Path(org_id): Path<Uuid>,
) -> ApiResult<Json<CapabilitiesResponse>> {
    let capabilities = state
        .services
        .permissions
        .capabilities_for_org(&caller.in_org(org_id))
        .await?;
    Ok(Json(CapabilitiesResponse { capabilities }))
}
