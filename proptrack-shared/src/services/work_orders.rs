/// Work orders
///
/// An assignee must hold an active membership in the work order's org.
/// Moving a work order to `completed` stamps `completed_at`; moving it to
/// any other status clears it.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::{RequestContext, ServiceError, ServiceResult};
use crate::auth::authorization::AuthorizationGuard;
use crate::auth::capability;
use crate::models::work_order::{CreateWorkOrder, UpdateWorkOrder, WorkOrder, WorkOrderFilter};
use crate::pagination::{Page, PageRequest};
use crate::store::Store;

#[derive(Clone)]
pub struct WorkOrderService {
    store: Arc<dyn Store>,
    guard: AuthorizationGuard,
}

impl WorkOrderService {
    pub fn new(store: Arc<dyn Store>, guard: AuthorizationGuard) -> Self {
        Self { store, guard }
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        filter: &WorkOrderFilter,
        page: &PageRequest,
    ) -> ServiceResult<Page<WorkOrder>> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::WORK_ORDERS_READ)
            .await?;

        Ok(self.store.list_work_orders(org_id, filter, page).await?)
    }

    pub async fn get(&self, ctx: &RequestContext, id: Uuid) -> ServiceResult<WorkOrder> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::WORK_ORDERS_READ)
            .await?;

        self.store
            .find_work_order(org_id, id)
            .await?
            .ok_or(ServiceError::NotFound("work order"))
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        mut data: CreateWorkOrder,
    ) -> ServiceResult<WorkOrder> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::WORK_ORDERS_WRITE)
            .await?;

        if data.title.trim().is_empty() {
            return Err(ServiceError::validation("title", "must not be empty"));
        }
        if let Some(assignee) = data.assigned_to {
            self.ensure_member(org_id, assignee).await?;
        }
        data.created_by = ctx.caller;

        let work_order = self.store.create_work_order(org_id, data).await?;
        info!(
            org_id = %org_id,
            work_order_id = %work_order.id,
            priority = ?work_order.priority,
            "Work order created"
        );
        Ok(work_order)
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        data: UpdateWorkOrder,
    ) -> ServiceResult<WorkOrder> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::WORK_ORDERS_WRITE)
            .await?;

        if matches!(&data.title, Some(title) if title.trim().is_empty()) {
            return Err(ServiceError::validation("title", "must not be empty"));
        }
        if let Some(assignee) = data.assigned_to {
            self.ensure_member(org_id, assignee).await?;
        }

        let work_order = self
            .store
            .update_work_order(org_id, id, data)
            .await?
            .ok_or(ServiceError::NotFound("work order"))?;

        info!(
            org_id = %org_id,
            work_order_id = %id,
            status = work_order.status.as_str(),
            "Work order updated"
        );
        Ok(work_order)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> ServiceResult<()> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::WORK_ORDERS_WRITE)
            .await?;

        if !self.store.delete_work_order(org_id, id).await? {
            return Err(ServiceError::NotFound("work order"));
        }
        Ok(())
    }

    async fn ensure_member(&self, org_id: Uuid, user_id: Uuid) -> ServiceResult<()> {
        self.store
            .find_active_membership(org_id, user_id)
            .await?
            .map(|_| ())
            .ok_or(ServiceError::NotFound("assignee"))
    }
}
