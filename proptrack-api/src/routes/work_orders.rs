/// Work order endpoints
///
/// - `GET /v1/work-orders?org_id=&status=&page=&limit=` (`work_orders.read`)
/// - `POST /v1/work-orders` (`work_orders.write`)
/// - `GET /v1/work-orders/:id` (`work_orders.read`)
/// - `PATCH /v1/work-orders/:id` (`work_orders.write`)
/// - `DELETE /v1/work-orders/:id` (`work_orders.write`)
///
/// Moving to `completed` stamps `completed_at`; moving away clears it.
/// An assignee must be an active member of the org, otherwise 404.

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{Caller, OrgQuery},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use proptrack_shared::{
    models::work_order::{
        CreateWorkOrder, UpdateWorkOrder, WorkOrder, WorkOrderFilter, WorkOrderPriority,
        WorkOrderStatus,
    },
    pagination::{Page, PageRequest},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct WorkOrderListQuery {
    pub org_id: Option<Uuid>,
    pub status: Option<WorkOrderStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateWorkOrderRequest {
    pub org_id: Option<Uuid>,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    #[serde(default)]
    pub priority: WorkOrderPriority,

    pub property_ref: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateWorkOrderRequest {
    pub org_id: Option<Uuid>,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[validate(length(max = 5000, message = "Description must be at most 5000 characters"))]
    pub description: Option<String>,

    pub priority: Option<WorkOrderPriority>,
    pub status: Option<WorkOrderStatus>,
    pub assigned_to: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

impl From<UpdateWorkOrderRequest> for UpdateWorkOrder {
    fn from(req: UpdateWorkOrderRequest) -> Self {
        UpdateWorkOrder {
            title: req.title,
            description: req.description,
            priority: req.priority,
            status: req.status,
            assigned_to: req.assigned_to,
            due_date: req.due_date,
        }
    }
}

pub async fn list_work_orders(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<WorkOrderListQuery>,
) -> ApiResult<Json<Page<WorkOrder>>> {
    let page = state
        .services
        .work_orders
        .list(
            &caller.context(query.org_id, None),
            &WorkOrderFilter {
                status: query.status,
            },
            &PageRequest::new(query.page, query.limit),
        )
        .await?;
    Ok(Json(page))
}

pub async fn create_work_order(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<OrgQuery>,
    Json(req): Json<CreateWorkOrderRequest>,
) -> ApiResult<(StatusCode, Json<WorkOrder>)> {
    req.validate()?;

    let ctx = caller.context(query.org_id, req.org_id);
    let order = state
        .services
        .work_orders
        .create(
            &ctx,
            CreateWorkOrder {
                title: req.title,
                description: req.description,
                priority: req.priority,
                property_ref: req.property_ref,
                assigned_to: req.assigned_to,
                created_by: None,
                due_date: req.due_date,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn get_work_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<OrgQuery>,
) -> ApiResult<Json<WorkOrder>> {
    let order = state
        .services
        .work_orders
        .get(&caller.context(query.org_id, None), id)
        .await?;
    Ok(Json(order))
}

pub async fn update_work_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<OrgQuery>,
    Json(req): Json<UpdateWorkOrderRequest>,
) -> ApiResult<Json<WorkOrder>> {
    req.validate()?;

    let ctx = caller.context(query.org_id, req.org_id);
    let order = state
        .services
        .work_orders
        .update(&ctx, id, req.into())
        .await?;
    Ok(Json(order))
}

pub async fn delete_work_order(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<OrgQuery>,
) -> ApiResult<StatusCode> {
    state
        .services
        .work_orders
        .delete(&caller.context(query.org_id, None), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
