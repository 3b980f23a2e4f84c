/// Document model
///
/// Documents are org-scoped references to stored files (leases, inspection
/// reports, notices). Upload mechanics live outside this service; a document
/// row only records where the file is.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE documents (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     category VARCHAR(100) NOT NULL,
///     url TEXT NOT NULL,
///     property_ref VARCHAR(255),
///     uploaded_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// CREATE INDEX idx_documents_org ON documents (org_id, created_at DESC);
/// ```
///
/// Every query below takes `org_id` and filters on it; there is no unscoped
/// lookup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    pub id: Uuid,
    pub org_id: Uuid,
    pub title: String,
    pub category: String,
    pub url: String,
    pub property_ref: Option<String>,
    pub uploaded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a document (org comes from the authorized request)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDocument {
    pub title: String,
    pub category: String,
    pub url: String,
    pub property_ref: Option<String>,
    pub uploaded_by: Option<Uuid>,
}

/// Only non-None fields are updated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDocument {
    pub title: Option<String>,
    pub category: Option<String>,
    pub url: Option<String>,
    pub property_ref: Option<String>,
}

/// Optional list filters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentFilter {
    pub category: Option<String>,
}

const DOCUMENT_COLUMNS: &str =
    "id, org_id, title, category, url, property_ref, uploaded_by, created_at, updated_at";

impl Document {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        data: &CreateDocument,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO documents (org_id, title, category, url, property_ref, uploaded_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        );

        sqlx::query_as::<_, Document>(&query)
            .bind(org_id)
            .bind(&data.title)
            .bind(&data.category)
            .bind(&data.url)
            .bind(&data.property_ref)
            .bind(data.uploaded_by)
            .fetch_one(executor)
            .await
    }

    pub async fn find<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM documents WHERE org_id = $1 AND id = $2",
            DOCUMENT_COLUMNS
        );

        sqlx::query_as::<_, Document>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// One page of an org's documents, newest first
    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        filter: &DocumentFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM documents
            WHERE org_id = $1 AND ($2::text IS NULL OR category = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            DOCUMENT_COLUMNS
        );

        sqlx::query_as::<_, Document>(&query)
            .bind(org_id)
            .bind(&filter.category)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn count<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        filter: &DocumentFilter,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM documents WHERE org_id = $1 AND ($2::text IS NULL OR category = $2)",
        )
        .bind(org_id)
        .bind(&filter.category)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        id: Uuid,
        data: &UpdateDocument,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE documents
            SET title = COALESCE($3, title),
                category = COALESCE($4, category),
                url = COALESCE($5, url),
                property_ref = COALESCE($6, property_ref),
                updated_at = NOW()
            WHERE org_id = $1 AND id = $2
            RETURNING {}
            "#,
            DOCUMENT_COLUMNS
        );

        sqlx::query_as::<_, Document>(&query)
            .bind(org_id)
            .bind(id)
            .bind(&data.title)
            .bind(&data.category)
            .bind(&data.url)
            .bind(&data.property_ref)
            .fetch_optional(executor)
            .await
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM documents WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
