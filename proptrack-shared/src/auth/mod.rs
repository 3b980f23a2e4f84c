/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing
/// - [`jwt`]: Access and refresh tokens
/// - [`middleware`]: Axum middleware that attaches the caller identity
/// - [`capability`]: The capability catalog
/// - [`authorization`]: The guard that decides allow or deny per org
///
/// Authentication answers "who is calling"; it never implies access to any
/// org. Access is decided per request by [`authorization::AuthorizationGuard`]
/// from the caller's active membership in the org the request names.

pub mod authorization;
pub mod capability;
pub mod jwt;
pub mod middleware;
pub mod password;
