/// Registration, login, token refresh and the caller's own profile
///
/// Tokens identify the user only. Registering does not grant access to any
/// org; access comes from memberships, starting with the org a user creates.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::{RequestContext, ServiceError, ServiceResult};
use crate::auth::jwt::{self, Claims, JwtError, TokenType};
use crate::auth::password::{self, PasswordError};
use crate::models::user::{normalize_email, CreateUser, UpdateUser, User};
use crate::store::Store;

/// Same message for unknown email and wrong password
const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Issued tokens plus the user they belong to
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    /// Seconds until the access token expires
    pub expires_in: i64,
}

/// A freshly issued access token
#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

impl From<PasswordError> for ServiceError {
    fn from(err: PasswordError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl From<JwtError> for ServiceError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(message) => ServiceError::Internal(message),
            other => ServiceError::Unauthenticated(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    jwt_secret: Arc<str>,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, jwt_secret: &str) -> Self {
        Self {
            store,
            jwt_secret: Arc::from(jwt_secret),
        }
    }

    pub async fn register(&self, input: Registration) -> ServiceResult<AuthSession> {
        let email = normalize_email(&input.email);
        if email.is_empty() || !email.contains('@') {
            return Err(ServiceError::validation("email", "Invalid email format"));
        }
        password::validate_password_strength(&input.password)
            .map_err(|message| ServiceError::validation("password", message))?;

        let password_hash = password::hash_password(&input.password)?;
        let user = self
            .store
            .create_user(CreateUser {
                email,
                password_hash,
                name: input.name.filter(|n| !n.trim().is_empty()),
            })
            .await?;

        info!(user_id = %user.id, "User registered");
        self.session(user)
    }

    pub async fn login(&self, email: &str, password_input: &str) -> ServiceResult<AuthSession> {
        let Some(user) = self.store.find_user_by_email(&normalize_email(email)).await? else {
            return Err(ServiceError::Unauthenticated(INVALID_CREDENTIALS.to_string()));
        };

        if !password::verify_password(password_input, &user.password_hash)? {
            warn!(user_id = %user.id, "Failed login attempt");
            return Err(ServiceError::Unauthenticated(INVALID_CREDENTIALS.to_string()));
        }

        self.store.touch_last_login(user.id).await?;
        info!(user_id = %user.id, "User logged in");
        self.session(user)
    }

    /// Exchanges a refresh token for a new access token
    pub fn refresh(&self, refresh_token: &str) -> ServiceResult<AccessToken> {
        let (access_token, claims) = jwt::refresh_access_token(refresh_token, &self.jwt_secret)?;

        Ok(AccessToken {
            access_token,
            token_type: "Bearer",
            expires_in: claims.expires_in(),
        })
    }

    pub async fn profile(&self, ctx: &RequestContext) -> ServiceResult<User> {
        let user_id = ctx.caller()?;
        self.store
            .find_user(user_id)
            .await?
            .ok_or(ServiceError::NotFound("user"))
    }

    pub async fn update_profile(&self, ctx: &RequestContext, mut data: UpdateUser) -> ServiceResult<User> {
        let user_id = ctx.caller()?;

        if let Some(email) = data.email.take() {
            let email = normalize_email(&email);
            if email.is_empty() || !email.contains('@') {
                return Err(ServiceError::validation("email", "Invalid email format"));
            }
            data.email = Some(email);
        }

        self.store
            .update_user(user_id, data)
            .await?
            .ok_or(ServiceError::NotFound("user"))
    }

    fn session(&self, user: User) -> ServiceResult<AuthSession> {
        let access = Claims::new(user.id, TokenType::Access);
        let refresh = Claims::new(user.id, TokenType::Refresh);

        Ok(AuthSession {
            access_token: jwt::create_token(&access, &self.jwt_secret)?,
            refresh_token: jwt::create_token(&refresh, &self.jwt_secret)?,
            token_type: "Bearer",
            expires_in: access.expires_in(),
            user,
        })
    }
}
