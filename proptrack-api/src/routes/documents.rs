/// Document endpoints
///
/// # Endpoints
///
/// - `GET /v1/documents?org_id=&category=&page=&limit=` (`documents.read`)
/// - `POST /v1/documents` (`documents.write`)
/// - `GET /v1/documents/:id?org_id=` (`documents.read`)
/// - `PATCH /v1/documents/:id` (`documents.write`)
/// - `DELETE /v1/documents/:id?org_id=` (`documents.write`)
///
/// The org comes from the `org_id` query parameter or the body. A document
/// of another org answers 404, the same as one that doesn't exist.

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
use proptrack_shared::{
    models::document::{CreateDocument, Document, DocumentFilter, UpdateDocument},
    pagination::{Page, PageRequest},
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct DocumentListQuery {
    pub org_id: Option<Uuid>,
    pub category: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDocumentRequest {
    pub org_id: Option<Uuid>,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[validate(length(min = 1, max = 50, message = "Category must be 1-50 characters"))]
    pub category: String,

    #[validate(length(min = 1, max = 2048, message = "URL must be 1-2048 characters"))]
    pub url: String,

    pub property_ref: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateDocumentRequest {
    pub org_id: Option<Uuid>,

    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: Option<String>,

    #[validate(length(min = 1, max = 50, message = "Category must be 1-50 characters"))]
    pub category: Option<String>,

    #[validate(length(min = 1, max = 2048, message = "URL must be 1-2048 characters"))]
    pub url: Option<String>,

    pub property_ref: Option<String>,
}

pub async fn list_documents(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<DocumentListQuery>,
) -> ApiResult<Json<Page<Document>>> {
    let filter = DocumentFilter {
        category: query.category,
    };
    let page = state
        .services
        .documents
        .list(
            &caller.context(query.org_id, None),
            &filter,
            &PageRequest::new(query.page, query.limit),
        )
        .await?;
    Ok(Json(page))
}

pub async fn create_document(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<OrgQuery>,
    Json(req): Json<CreateDocumentRequest>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    req.validate()?;

    let ctx = caller.context(query.org_id, req.org_id);
    let document = state
        .services
        .documents
        .create(
            &ctx,
            CreateDocument {
                title: req.title,
                category: req.category,
                url: req.url,
                property_ref: req.property_ref,
                uploaded_by: None,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(document)))
}

pub async fn get_document(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<OrgQuery>,
) -> ApiResult<Json<Document>> {
    let document = state
        .services
        .documents
        .get(&caller.context(query.org_id, None), id)
        .await?;
    Ok(Json(document))
}

pub async fn update_document(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<OrgQuery>,
    Json(req): Json<UpdateDocumentRequest>,
) -> ApiResult<Json<Document>> {
    req.validate()?;

    let ctx = caller.context(query.org_id, req.org_id);
    let document = state
        .services
        .documents
        .update(
            &ctx,
            id,
            UpdateDocument {
                title: req.title,
                category: req.category,
                url: req.url,
                property_ref: req.property_ref,
            },
        )
        .await?;
    Ok(Json(document))
}

pub async fn delete_document(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<Uuid>,
    Query(query): Query<OrgQuery>,
) -> ApiResult<StatusCode> {
    state
        .services
        .documents
        .delete(&caller.context(query.org_id, None), id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
