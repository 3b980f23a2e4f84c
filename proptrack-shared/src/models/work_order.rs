/// Work order model
///
/// Maintenance requests raised against a property. Moving a work order to
/// `completed` stamps `completed_at`; moving it anywhere else clears it.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE work_order_priority AS ENUM ('low', 'medium', 'high', 'urgent');
/// CREATE TYPE work_order_status AS ENUM ('open', 'in_progress', 'completed', 'cancelled');
///
/// CREATE TABLE work_orders (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     org_id UUID NOT NULL REFERENCES orgs(id) ON DELETE CASCADE,
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     priority work_order_priority NOT NULL DEFAULT 'medium',
///     status work_order_status NOT NULL DEFAULT 'open',
///     property_ref VARCHAR(255),
///     assigned_to UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     due_date DATE,
///     completed_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "work_order_priority", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for WorkOrderPriority {
    fn default() -> Self {
        WorkOrderPriority::Medium
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "work_order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WorkOrderStatus {
    Open,
    InProgress,
    Completed,
    Cancelled,
}

impl WorkOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkOrderStatus::Open => "open",
            WorkOrderStatus::InProgress => "in_progress",
            WorkOrderStatus::Completed => "completed",
            WorkOrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct WorkOrder {
    pub id: Uuid,
    pub org_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub priority: WorkOrderPriority,
    pub status: WorkOrderStatus,
    pub property_ref: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkOrder {
    /// Applies an update in memory, following the same rules as [`WorkOrder::update`]
    pub fn apply(&mut self, data: &UpdateWorkOrder, now: DateTime<Utc>) {
        if let Some(title) = &data.title {
            self.title = title.clone();
        }
        if let Some(description) = &data.description {
            self.description = Some(description.clone());
        }
        if let Some(priority) = data.priority {
            self.priority = priority;
        }
        if let Some(assigned_to) = data.assigned_to {
            self.assigned_to = Some(assigned_to);
        }
        if let Some(due_date) = data.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(status) = data.status {
            if status == WorkOrderStatus::Completed {
                if self.status != WorkOrderStatus::Completed {
                    self.completed_at = Some(now);
                }
            } else {
                self.completed_at = None;
            }
            self.status = status;
        }
        self.updated_at = now;
    }
}

/// Input for creating a work order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWorkOrder {
    pub title: String,
    pub description: Option<String>,
    pub priority: WorkOrderPriority,
    pub property_ref: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

/// Only non-None fields are updated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateWorkOrder {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<WorkOrderPriority>,
    pub status: Option<WorkOrderStatus>,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkOrderFilter {
    pub status: Option<WorkOrderStatus>,
}

const WORK_ORDER_COLUMNS: &str = "id, org_id, title, description, priority, status, property_ref, \
     assigned_to, created_by, due_date, completed_at, created_at, updated_at";

impl WorkOrder {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        data: &CreateWorkOrder,
    ) -> Result<Self, sqlx::Error> {
        let query = format!(
            r#"
            INSERT INTO work_orders
                (org_id, title, description, priority, status, property_ref, assigned_to, created_by, due_date)
            VALUES ($1, $2, $3, $4, 'open', $5, $6, $7, $8)
            RETURNING {}
            "#,
            WORK_ORDER_COLUMNS
        );

        sqlx::query_as::<_, WorkOrder>(&query)
            .bind(org_id)
            .bind(&data.title)
            .bind(&data.description)
            .bind(data.priority)
            .bind(&data.property_ref)
            .bind(data.assigned_to)
            .bind(data.created_by)
            .bind(data.due_date)
            .fetch_one(executor)
            .await
    }

    pub async fn find<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM work_orders WHERE org_id = $1 AND id = $2",
            WORK_ORDER_COLUMNS
        );

        sqlx::query_as::<_, WorkOrder>(&query)
            .bind(org_id)
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// One page of an org's work orders, newest first
    pub async fn list<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        filter: &WorkOrderFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let query = format!(
            r#"
            SELECT {}
            FROM work_orders
            WHERE org_id = $1 AND ($2::work_order_status IS NULL OR status = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
            WORK_ORDER_COLUMNS
        );

        sqlx::query_as::<_, WorkOrder>(&query)
            .bind(org_id)
            .bind(filter.status)
            .bind(limit)
            .bind(offset)
            .fetch_all(executor)
            .await
    }

    pub async fn count<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        filter: &WorkOrderFilter,
    ) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM work_orders
            WHERE org_id = $1 AND ($2::work_order_status IS NULL OR status = $2)
            "#,
        )
        .bind(org_id)
        .bind(filter.status)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    pub async fn update<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        id: Uuid,
        data: &UpdateWorkOrder,
    ) -> Result<Option<Self>, sqlx::Error> {
        let query = format!(
            r#"
            UPDATE work_orders
            SET title = COALESCE($3, title),
                description = COALESCE($4, description),
                priority = COALESCE($5, priority),
                assigned_to = COALESCE($7, assigned_to),
                due_date = COALESCE($8, due_date),
                completed_at = CASE
                    WHEN $6::work_order_status IS NULL THEN completed_at
                    WHEN $6 = 'completed' THEN COALESCE(completed_at, NOW())
                    ELSE NULL
                END,
                status = COALESCE($6, status),
                updated_at = NOW()
            WHERE org_id = $1 AND id = $2
            RETURNING {}
            "#,
            WORK_ORDER_COLUMNS
        );

        sqlx::query_as::<_, WorkOrder>(&query)
            .bind(org_id)
            .bind(id)
            .bind(&data.title)
            .bind(&data.description)
            .bind(data.priority)
            .bind(data.status)
            .bind(data.assigned_to)
            .bind(data.due_date)
            .fetch_optional(executor)
            .await
    }

    pub async fn delete<'e, E: PgExecutor<'e>>(
        executor: E,
        org_id: Uuid,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM work_orders WHERE org_id = $1 AND id = $2")
            .bind(org_id)
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> WorkOrder {
        let now = Utc::now();
        WorkOrder {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            title: "Leaking faucet".to_string(),
            description: None,
            priority: WorkOrderPriority::Medium,
            status: WorkOrderStatus::Open,
            property_ref: Some("Unit 4B".to_string()),
            assigned_to: None,
            created_by: None,
            due_date: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_completing_stamps_completed_at() {
        let mut order = sample();
        let now = Utc::now();

        order.apply(
            &UpdateWorkOrder {
                status: Some(WorkOrderStatus::Completed),
                ..Default::default()
            },
            now,
        );

        assert_eq!(order.status, WorkOrderStatus::Completed);
        assert_eq!(order.completed_at, Some(now));
    }

    #[test]
    fn test_completing_twice_keeps_first_timestamp() {
        let mut order = sample();
        let first = Utc::now();
        let update = UpdateWorkOrder {
            status: Some(WorkOrderStatus::Completed),
            ..Default::default()
        };

        order.apply(&update, first);
        order.apply(&update, first + chrono::Duration::hours(1));

        assert_eq!(order.completed_at, Some(first));
    }

    #[test]
    fn test_reopening_clears_completed_at() {
        let mut order = sample();
        order.apply(
            &UpdateWorkOrder {
                status: Some(WorkOrderStatus::Completed),
                ..Default::default()
            },
            Utc::now(),
        );
        order.apply(
            &UpdateWorkOrder {
                status: Some(WorkOrderStatus::InProgress),
                ..Default::default()
            },
            Utc::now(),
        );

        assert_eq!(order.status, WorkOrderStatus::InProgress);
        assert!(order.completed_at.is_none());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_value(WorkOrderStatus::InProgress).unwrap(),
            "in_progress"
        );
        assert_eq!(WorkOrderPriority::default(), WorkOrderPriority::Medium);
    }
}
