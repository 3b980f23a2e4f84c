/// Caller identity middleware for Axum
///
/// Reads `Authorization: Bearer <token>` and, when the access token is
/// valid, inserts an [`AuthContext`] into the request extensions.
///
/// A request without the header passes through anonymously; deciding
/// whether an anonymous caller may proceed is the authorization guard's
/// job. A request that presents a header which fails validation is rejected
/// with 401 straight away.
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::get, Extension, Router};
/// use proptrack_shared::auth::middleware::{create_jwt_middleware, AuthContext};
///
/// async fn whoami(auth: Option<Extension<AuthContext>>) -> String {
///     match auth {
///         Some(Extension(auth)) => auth.user_id.to_string(),
///         None => "anonymous".to_string(),
///     }
/// }
///
/// let app: Router = Router::new()
///     .route("/whoami", get(whoami))
///     .layer(middleware::from_fn(create_jwt_middleware("secret")));
/// ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use super::jwt::{validate_access_token, JwtError};

/// Authenticated caller, added to request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
}

impl AuthContext {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}

#[derive(Debug)]
pub enum AuthError {
    /// Header present but not `Bearer <token>`
    InvalidFormat,

    InvalidToken(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::InvalidFormat => "Expected Bearer token".to_string(),
            AuthError::InvalidToken(message) => message,
        };

        let body = Json(json!({
            "error": "unauthorized",
            "message": message,
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// Validates the bearer token when one is presented
pub async fn jwt_auth_middleware(
    secret: Arc<str>,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return Ok(next.run(req).await);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(AuthError::InvalidFormat)?;

    let claims = validate_access_token(token, &secret).map_err(|e| {
        debug!(error = %e, "Rejected bearer token");
        match e {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            other => AuthError::InvalidToken(other.to_string()),
        }
    })?;

    req.extensions_mut().insert(AuthContext::new(claims.sub));

    Ok(next.run(req).await)
}

type MiddlewareFuture = Pin<Box<dyn Future<Output = Result<Response, AuthError>> + Send>>;

/// Captures the secret for use with `axum::middleware::from_fn`
pub fn create_jwt_middleware(
    secret: impl Into<String>,
) -> impl Fn(Request, Next) -> MiddlewareFuture + Clone {
    let secret: Arc<str> = Arc::from(secret.into());
    move |req, next| Box::pin(jwt_auth_middleware(secret.clone(), req, next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_context_new() {
        let user_id = Uuid::new_v4();
        assert_eq!(AuthContext::new(user_id).user_id, user_id);
    }

    #[test]
    fn test_auth_error_is_unauthorized() {
        assert_eq!(
            AuthError::InvalidFormat.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidToken("bad".to_string())
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
