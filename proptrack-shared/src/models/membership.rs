/// Membership model and database operations
///
/// A membership binds a user to an org through one of the org's roles.
/// Memberships are never physically deleted: revocation flips the status to
/// `revoked` and stamps `revoked_at`, which keeps the audit trail intact.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE membership_status AS ENUM ('active', 'revoked');
///
/// CREATE TABLE memberships (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role_id UUID NOT NULL REFERENCES roles(id),
///     status membership_status NOT NULL DEFAULT 'active',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     revoked_at TIMESTAMPTZ
/// );
///
/// -- At most one active membership per (org, user)
/// CREATE UNIQUE INDEX memberships_active_key
///     ON memberships (org_id, user_id) WHERE status = 'active';
/// ```
///
/// # Example
///
/// ```no_run
/// use proptrack_shared::models::membership::{CreateMembership, Membership};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, org_id: Uuid, user_id: Uuid, role_id: Uuid) -> Result<(), sqlx::Error> {
/// Membership::create(&pool, &CreateMembership { org_id, user_id, role_id }).await?;
///
/// let active = Membership::find_active(&pool, org_id, user_id).await?;
/// assert!(active.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

/// Lifecycle of a membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    /// Grants the role's permissions
    Active,

    /// Kept for audit only, grants nothing
    Revoked,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Revoked => "revoked",
        }
    }
}

/// User-org binding through a role
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    pub id: Uuid,

    pub org_id: Uuid,

    pub user_id: Uuid,

    /// Role within the org
    pub role_id: Uuid,

    pub status: MembershipStatus,

    pub created_at: DateTime<Utc>,

    /// Set exactly when `status` is `Revoked`
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Membership {
    /// Whether this membership currently authorizes anything
    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }
}

/// Input for creating a membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMembership {
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub role_id: Uuid,
}

/// Membership row joined with the user and role it points at
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemberSummary {
    pub membership_id: Uuid,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role_id: Uuid,
    pub role_name: String,
    pub status: MembershipStatus,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

const MEMBERSHIP_COLUMNS: &str = "id, org_id, user_id, role_id, status, created_at, revoked_at";

impl Membership {
    /// Creates an active membership
    ///
    /// # Errors
    ///
    /// Unique violation on `memberships_active_key` if the user already has
    /// an active membership in the org.
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &CreateMembership,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO memberships (org_id, user_id, role_id, status)
            VALUES ($1, $2, $3, 'active')
            RETURNING {}
            "#,
            MEMBERSHIP_COLUMNS
        );

        sqlx::query_as::<_, Membership>(&query)
            .bind(data.org_id)
            .bind(data.user_id)
            .bind(data.role_id)
            .fetch_one(executor)
            .await
    }

    /// Finds the user's active membership in an org
    ///
    /// Revoked memberships are never returned.
    pub async fn find_active<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM memberships
            WHERE org_id = $1 AND user_id = $2 AND status = 'active'
            "#,
            MEMBERSHIP_COLUMNS
        );

        sqlx::query_as::<_, Membership>(&query)
            .bind(org_id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }

    /// Revokes a membership of an org
    ///
    /// Returns None if no active membership with this ID exists in the org.
    pub async fn revoke<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        membership_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE memberships
            SET status = 'revoked', revoked_at = NOW()
            WHERE org_id = $1 AND id = $2 AND status = 'active'
            RETURNING {}
            "#,
            MEMBERSHIP_COLUMNS
        );

        sqlx::query_as::<_, Membership>(&query)
            .bind(org_id)
            .bind(membership_id)
            .fetch_optional(executor)
            .await
    }

    /// Lists one page of an org's members, oldest first
    pub async fn list_by_org<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MemberSummary>, sqlx::Error> {
        sqlx::query_as::<_, MemberSummary>(
            r#"
            SELECT m.id AS membership_id, m.org_id, m.user_id, u.email, u.name,
                   m.role_id, r.name AS role_name, m.status, m.created_at, m.revoked_at
            FROM memberships m
            JOIN users u ON u.id = m.user_id
            JOIN roles r ON r.id = m.role_id
            WHERE m.org_id = $1
            ORDER BY m.created_at ASC, m.id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(org_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    /// Counts an org's active memberships
    pub async fn count_active<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM memberships WHERE org_id = $1 AND status = 'active'",
        )
        .bind(org_id)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    /// Counts an org's active memberships on its system (Admin) role
    pub async fn count_active_admins<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM memberships m
            JOIN roles r ON r.id = m.role_id AND r.org_id = m.org_id
            WHERE m.org_id = $1 AND m.status = 'active' AND r.is_system
            "#,
        )
        .bind(org_id)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    /// Whether an active membership holds the org's system role
    ///
    /// Returns None if no active membership with this ID exists in the org.
    pub async fn holds_system_role<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        membership_id: Uuid,
    ) -> Result<Option<bool>, sqlx::Error> {
        let row: Option<(bool,)> = sqlx::query_as(
            r#"
            SELECT r.is_system
            FROM memberships m
            JOIN roles r ON r.id = m.role_id AND r.org_id = m.org_id
            WHERE m.org_id = $1 AND m.id = $2 AND m.status = 'active'
            "#,
        )
        .bind(org_id)
        .bind(membership_id)
        .fetch_optional(executor)
        .await?;

        Ok(row.map(|(is_system,)| is_system))
    }

    /// Counts an org's memberships (active and revoked)
    pub async fn count_by_org<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM memberships WHERE org_id = $1")
            .bind(org_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_membership_status_as_str() {
        assert_eq!(MembershipStatus::Active.as_str(), "active");
        assert_eq!(MembershipStatus::Revoked.as_str(), "revoked");
    }

    #[test]
    fn test_is_active() {
        let mut membership = Membership {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role_id: Uuid::new_v4(),
            status: MembershipStatus::Active,
            created_at: Utc::now(),
            revoked_at: None,
        };
        assert!(membership.is_active());

        membership.status = MembershipStatus::Revoked;
        membership.revoked_at = Some(Utc::now());
        assert!(!membership.is_active());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_value(MembershipStatus::Revoked).unwrap();
        assert_eq!(json, "revoked");
    }
}
