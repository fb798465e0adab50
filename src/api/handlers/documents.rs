// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::routes::{ApiResponse, PaginationParams};
use crate::api::AppContext;
use crate::error::PlatformError;
use crate::models::document::{Document, DocumentKind, NewDocument};
use crate::schema::documents;

#[derive(Debug, Deserialize)]
pub struct DocumentListQuery {
    pub surrogate_id: Option<String>,
    pub parent_id: Option<String>,
    pub kind: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List document records, optionally narrowed by case side and kind.
pub async fn list_documents(
    State(ctx): State<AppContext>,
    Query(query): Query<DocumentListQuery>,
) -> Result<Json<ApiResponse<Vec<Document>>>, PlatformError> {
    if let Some(kind) = &query.kind {
        kind.parse::<DocumentKind>()
            .map_err(PlatformError::validation)?;
    }
    let page = PaginationParams {
        limit: query.limit,
        offset: query.offset,
    };

    let mut conn = ctx.db.connection().await?;
    let mut items = documents::table.into_boxed();
    if let Some(surrogate_id) = &query.surrogate_id {
        items = items.filter(documents::surrogate_id.eq(surrogate_id.clone()));
    }
    if let Some(parent_id) = &query.parent_id {
        items = items.filter(documents::parent_id.eq(parent_id.clone()));
    }
    if let Some(kind) = &query.kind {
        items = items.filter(documents::kind.eq(kind.clone()));
    }
    let rows = items
        .order(documents::uploaded_at.desc())
        .limit(page.limit())
        .offset(page.offset())
        .load::<Document>(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[derive(Debug, Deserialize)]
pub struct CreateDocument {
    pub kind: String,
    pub surrogate_id: Option<String>,
    pub parent_id: Option<String>,
    /// Where the already-uploaded bytes live in the object store.
    pub storage_path: String,
    pub uploaded_by: String,
}

/// Record an uploaded document. The file itself never passes through this
/// service; only the storage path does.
pub async fn create_document(
    State(ctx): State<AppContext>,
    Json(body): Json<CreateDocument>,
) -> Result<Json<ApiResponse<Document>>, PlatformError> {
    let kind = body
        .kind
        .parse::<DocumentKind>()
        .map_err(PlatformError::validation)?;
    if body.surrogate_id.is_none() && body.parent_id.is_none() {
        return Err(PlatformError::validation(
            "a document needs a surrogate_id or a parent_id",
        ));
    }
    if body.storage_path.trim().is_empty() {
        return Err(PlatformError::validation("storage_path is required"));
    }

    let record = NewDocument {
        id: Uuid::new_v4().to_string(),
        kind: kind.as_str().to_string(),
        surrogate_id: body.surrogate_id,
        parent_id: body.parent_id,
        storage_path: body.storage_path,
        uploaded_by: body.uploaded_by,
        uploaded_at: Utc::now(),
    };

    let mut conn = ctx.db.connection().await?;
    let row = diesel::insert_into(documents::table)
        .values(&record)
        .get_result::<Document>(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(row)))
}
