/// User model and database operations
///
/// Users are global identities. They reach org-scoped data only through an
/// active [`Membership`](super::membership::Membership).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     email TEXT NOT NULL,
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(255),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// CREATE UNIQUE INDEX users_email_key ON users (email);
/// ```
///
/// Emails are normalized to lowercase before they reach the database, so the
/// plain unique index is enough for case-insensitive uniqueness.
///
/// # Example
///
/// ```no_run
/// use proptrack_shared::models::user::{User, CreateUser};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, &CreateUser {
///     email: "manager@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Pat Manager".to_string()),
/// }).await?;
///
/// let found = User::find_by_email(&pool, "Manager@Example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    /// Unique user ID
    pub id: Uuid,

    /// Lowercased email address, unique across all users
    pub email: String,

    /// Argon2id password hash, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Optional display name
    pub name: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// When the user last logged in (None if never)
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a new user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUser {
    /// Email address (normalized on insert)
    pub email: String,

    /// Argon2id password hash (NOT the plaintext password)
    pub password_hash: String,

    /// Optional display name
    pub name: Option<String>,
}

/// Profile fields a user may change
///
/// Only non-None fields are updated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateUser {
    /// New email address
    pub email: Option<String>,

    /// New display name (`Some(None)` clears it)
    pub name: Option<Option<String>>,
}

/// Lowercases and trims an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

const USER_COLUMNS: &str = "id, email, password_hash, name, created_at, updated_at, last_login_at";

impl User {
    /// Creates a new user
    ///
    /// # Errors
    ///
    /// Returns an error if the email already exists (unique violation on
    /// `users_email_key`) or the database is unreachable.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &CreateUser,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO users (email, password_hash, name) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(&data.email))
            .bind(&data.password_hash)
            .bind(&data.name)
            .fetch_one(executor)
            .await
    }

    /// Finds a user by ID
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds a user by email (case-insensitive)
    pub async fn find_by_email<'e, E: PgExecutor<'e>>(
        executor: E,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(normalize_email(email))
            .fetch_optional(executor)
            .await
    }

    /// Updates profile fields
    ///
    /// Returns None if the user doesn't exist.
    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        data: &UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        // $2 and $4 say whether the field is being set
        let query = format!(
            r#"
            UPDATE users
            SET email = CASE WHEN $2 THEN $3 ELSE email END,
                name = CASE WHEN $4 THEN $5 ELSE name END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        );

        let email = data.email.as_deref().map(normalize_email);
        let name = data.name.clone().flatten();

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(email.is_some())
            .bind(email)
            .bind(data.name.is_some())
            .bind(name)
            .fetch_optional(executor)
            .await
    }

    /// Stamps `last_login_at` with the current time
    pub async fn update_last_login<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
