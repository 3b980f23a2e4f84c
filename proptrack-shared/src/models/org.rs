/// Org and plan models
///
/// An org is the tenant boundary: every scoped row carries its `org_id`.
/// Each org is on exactly one plan. One plan in the catalog may be flagged as
/// the starter plan, which new orgs get when they don't name one.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE plans (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL UNIQUE,
///     is_starter BOOLEAN NOT NULL DEFAULT FALSE,
///     max_members INTEGER,
///     features JSONB NOT NULL DEFAULT '{}',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// CREATE UNIQUE INDEX plans_single_starter ON plans (is_starter) WHERE is_starter;
///
/// CREATE TABLE orgs (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     slug VARCHAR(100) NOT NULL UNIQUE,
///     plan_id UUID NOT NULL REFERENCES plans(id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::PgExecutor;
use uuid::Uuid;

/// Quota and feature-flag bundle
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Plan {
    pub id: Uuid,

    pub name: String,

    /// Whether this is the plan new orgs default to
    pub is_starter: bool,

    /// Member cap (None = unlimited)
    pub max_members: Option<i32>,

    /// Feature flags, e.g. `{"accounting": true}`
    pub features: JsonValue,

    pub created_at: DateTime<Utc>,
}

/// Tenant boundary
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Org {
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// URL-safe unique handle
    pub slug: String,

    pub plan_id: Uuid,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Input for creating an org row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrg {
    pub name: String,
    pub slug: String,
    pub plan_id: Uuid,
}

/// Fields an org manager may change
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOrg {
    pub name: Option<String>,
}

/// An org as seen by one of its members
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserOrg {
    pub org_id: Uuid,
    pub name: String,
    pub slug: String,
    pub role_id: Uuid,
    pub role_name: String,
    pub joined_at: DateTime<Utc>,
}

const PLAN_COLUMNS: &str = "id, name, is_starter, max_members, features, created_at";
const ORG_COLUMNS: &str = "id, name, slug, plan_id, created_at, updated_at";

impl Plan {
    /// Finds a plan by ID
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM plans WHERE id = $1", PLAN_COLUMNS);

        sqlx::query_as::<_, Plan>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds the designated starter plan, if one is configured
    pub async fn find_starter<'e, E: PgExecutor<'e>>(
        executor: E,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM plans WHERE is_starter LIMIT 1", PLAN_COLUMNS);

        sqlx::query_as::<_, Plan>(&query)
            .fetch_optional(executor)
            .await
    }
}

impl Org {
    /// Inserts an org row
    ///
    /// Only the org-creation workflow should call this, inside the same
    /// transaction that creates the admin role and the creator's membership.
    ///
    /// # Errors
    ///
    /// Unique violation on `orgs_slug_key` if the slug is taken.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &CreateOrg,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            "INSERT INTO orgs (name, slug, plan_id) VALUES ($1, $2, $3) RETURNING {}",
            ORG_COLUMNS
        );

        sqlx::query_as::<_, Org>(&query)
            .bind(&data.name)
            .bind(&data.slug)
            .bind(data.plan_id)
            .fetch_one(executor)
            .await
    }

    /// Finds an org by ID
    pub async fn find_by_id<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM orgs WHERE id = $1", ORG_COLUMNS);

        sqlx::query_as::<_, Org>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Finds an org and locks its row until the transaction ends
    ///
    /// Membership changes that check org-wide counts (member cap, last
    /// admin) take this lock first so concurrent changes are serialized.
    pub async fn lock<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!("SELECT {} FROM orgs WHERE id = $1 FOR UPDATE", ORG_COLUMNS);

        sqlx::query_as::<_, Org>(&query)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// Updates an org's mutable fields
    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        id: Uuid,
        data: &UpdateOrg,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE orgs
            SET name = COALESCE($2, name),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ORG_COLUMNS
        );

        sqlx::query_as::<_, Org>(&query)
            .bind(id)
            .bind(&data.name)
            .fetch_optional(executor)
            .await
    }

    /// Lists the orgs a user actively belongs to, oldest membership first
    pub async fn list_for_user<'e, E: PgExecutor<'e>>(
        executor: E,
        user_id: Uuid,
    ) -> Result<Vec<UserOrg>, sqlx::Error> {
        sqlx::query_as::<_, UserOrg>(
            r#"
            SELECT o.id AS org_id, o.name, o.slug, r.id AS role_id, r.name AS role_name,
                   m.created_at AS joined_at
            FROM memberships m
            JOIN orgs o ON o.id = m.org_id
            JOIN roles r ON r.id = m.role_id
            WHERE m.user_id = $1 AND m.status = 'active'
            ORDER BY m.created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(executor)
        .await
    }
}
