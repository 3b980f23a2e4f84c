/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Register a user, optionally with a first org
/// - `POST /v1/auth/login` - Login and get tokens
/// - `POST /v1/auth/refresh` - Exchange a refresh token for an access token

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, http::StatusCode, Json};
use proptrack_shared::{
    services::{
        orgs::{slugify, NewOrg, MAX_SLUG_LENGTH},
        users::{AccessToken, AuthSession, Registration},
        RequestContext, ServiceError, Services,
    },
    store::OrgBootstrap,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Strength rules are checked by the user service
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    /// Creates an org owned by the new user when present
    #[validate(length(min = 1, max = 100, message = "Org name must be 1-100 characters"))]
    pub org_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    #[serde(flatten)]
    pub session: AuthSession,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub org: Option<OrgBootstrap>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Register a new user
///
/// With `org_name`, the user also gets an org (slug derived from the name)
/// in which they are Admin. The two steps are separate writes: if the org
/// step fails the account still exists and the error is returned.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "email": "manager@example.com",
///   "password": "maple2024",
///   "name": "Dana Reyes",
///   "org_name": "Maple Court"
/// }
/// ```
///
/// # Response (201)
///
/// ```json
/// {
///   "user": { "id": "uuid", "email": "manager@example.com", ... },
///   "access_token": "eyJ...",
///   "refresh_token": "eyJ...",
///   "token_type": "Bearer",
///   "expires_in": 86400,
///   "org": { "org": {...}, "admin_role": {...}, "membership": {...} }
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Email already registered
/// - `422 Unprocessable Entity`: Validation failed
/// - `500 Internal Server Error`: No starter plan or empty permission catalog
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<RegisterResponse>)> {
    req.validate()?;

    let session = state
        .services
        .users
        .register(Registration {
            email: req.email,
            password: req.password,
            name: req.name,
        })
        .await?;

    let org = match req.org_name {
        Some(name) => Some(bootstrap_org(&state.services, session.user.id, name).await?),
        None => None,
    };

    Ok((StatusCode::CREATED, Json(RegisterResponse { session, org })))
}

/// Creates the registering user's first org, retrying once with a
/// user-specific suffix when the derived slug is taken
async fn bootstrap_org(
    services: &Services,
    user_id: Uuid,
    name: String,
) -> Result<OrgBootstrap, ApiError> {
    let ctx = RequestContext::user(user_id);
    let suffix = user_id.simple().to_string()[..8].to_string();

    let mut base = slugify(&name);
    if base.is_empty() {
        base = "org".to_string();
    }

    let first = NewOrg {
        name: name.clone(),
        slug: base.clone(),
        plan_id: None,
    };
    match services.orgs.create_org(&ctx, first).await {
        Err(ServiceError::Conflict(_)) => {
            base.truncate(MAX_SLUG_LENGTH - suffix.len() - 1);
            let retry = NewOrg {
                name,
                slug: format!("{}-{}", base.trim_end_matches('-'), suffix),
                plan_id: None,
            };
            Ok(services.orgs.create_org(&ctx, retry).await?)
        }
        other => Ok(other?),
    }
}

/// Login
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/login
///
/// { "email": "manager@example.com", "password": "maple2024" }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Unknown email or wrong password (same message)
/// - `422 Unprocessable Entity`: Malformed email
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthSession>> {
    req.validate()?;

    let session = state.services.users.login(&req.email, &req.password).await?;
    Ok(Json(session))
}

/// Exchange a refresh token for a new access token
///
/// # Errors
///
/// - `401 Unauthorized`: Token invalid, expired, or an access token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<AccessToken>> {
    let token = state.services.users.refresh(&req.refresh_token)?;
    Ok(Json(token))
}
