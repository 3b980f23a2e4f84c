/// Documents
///
/// Documents are references (a URL plus metadata); the file itself lives
/// wherever the URL points.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use super::{RequestContext, ServiceError, ServiceResult};
use crate::auth::authorization::AuthorizationGuard;
use crate::auth::capability;
use crate::models::document::{CreateDocument, Document, DocumentFilter, UpdateDocument};
use crate::pagination::{Page, PageRequest};
use crate::store::Store;

#[derive(Clone)]
pub struct DocumentService {
    store: Arc<dyn Store>,
    guard: AuthorizationGuard,
}

impl DocumentService {
    pub fn new(store: Arc<dyn Store>, guard: AuthorizationGuard) -> Self {
        Self { store, guard }
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        filter: &DocumentFilter,
        page: &PageRequest,
    ) -> ServiceResult<Page<Document>> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::DOCUMENTS_READ)
            .await?;

        Ok(self.store.list_documents(org_id, filter, page).await?)
    }

    pub async fn get(&self, ctx: &RequestContext, id: Uuid) -> ServiceResult<Document> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::DOCUMENTS_READ)
            .await?;

        self.store
            .find_document(org_id, id)
            .await?
            .ok_or(ServiceError::NotFound("document"))
    }

    /// Stamps the caller as uploader
    pub async fn create(&self, ctx: &RequestContext, mut data: CreateDocument) -> ServiceResult<Document> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::DOCUMENTS_WRITE)
            .await?;

        require("title", &data.title)?;
        require("category", &data.category)?;
        require("url", &data.url)?;
        data.uploaded_by = ctx.caller;

        let document = self.store.create_document(org_id, data).await?;
        info!(org_id = %org_id, document_id = %document.id, "Document created");
        Ok(document)
    }

    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        data: UpdateDocument,
    ) -> ServiceResult<Document> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::DOCUMENTS_WRITE)
            .await?;

        if let Some(title) = &data.title {
            require("title", title)?;
        }
        if let Some(url) = &data.url {
            require("url", url)?;
        }

        self.store
            .update_document(org_id, id, data)
            .await?
            .ok_or(ServiceError::NotFound("document"))
    }

    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> ServiceResult<()> {
        let org_id = self
            .guard
            .authorize(ctx.caller, ctx.org_id, capability::DOCUMENTS_WRITE)
            .await?;

        if !self.store.delete_document(org_id, id).await? {
            return Err(ServiceError::NotFound("document"));
        }

        info!(org_id = %org_id, document_id = %id, "Document deleted");
        Ok(())
    }
}

fn require(field: &'static str, value: &str) -> ServiceResult<()> {
    if value.trim().is_empty() {
        return Err(ServiceError::validation(field, "must not be empty"));
    }
    Ok(())
}
