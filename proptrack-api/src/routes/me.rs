/// The caller's own profile
///
/// - `GET /v1/me`
/// - `PATCH /v1/me` with `{ "email"?: string, "name"?: string }`; an empty
///   `name` clears it
///
/// Both return 401 without a valid bearer token.

use crate::{app::AppState, error::ApiResult, routes::Caller};
use axum::{extract::State, Json};
use proptrack_shared::models::user::{UpdateUser, User};
use proptrack_shared::services::RequestContext;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,
}

impl From<UpdateProfileRequest> for UpdateUser {
    fn from(req: UpdateProfileRequest) -> Self {
        UpdateUser {
            email: req.email,
            name: req
                .name
                .map(|n| if n.trim().is_empty() { None } else { Some(n) }),
        }
    }
}

pub async fn get_profile(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> ApiResult<Json<User>> {
    let ctx = RequestContext::new(caller, None);
    Ok(Json(state.services.users.profile(&ctx).await?))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    let ctx = RequestContext::new(caller, None);
    let user = state.services.users.update_profile(&ctx, req.into()).await?;
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_name_clears() {
        let update: UpdateUser = UpdateProfileRequest {
            email: None,
            name: Some("  ".to_string()),
        }
        .into();
        assert_eq!(update.name, Some(None));

        let update: UpdateUser = UpdateProfileRequest {
            email: None,
            name: None,
        }
        .into();
        assert_eq!(update.name, None);
    }
}
