// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::api::routes::{ApiResponse, PaginationParams};
use crate::api::AppContext;
use crate::error::PlatformError;
use crate::models::application::{Application, NewApplication};
use crate::schema::applications;

#[derive(Debug, Deserialize)]
pub struct ApplicationListQuery {
    pub surrogate_id: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list_applications(
    State(ctx): State<AppContext>,
    Query(query): Query<ApplicationListQuery>,
) -> Result<Json<ApiResponse<Vec<Application>>>, PlatformError> {
    let page = PaginationParams {
        limit: query.limit,
        offset: query.offset,
    };
    let mut conn = ctx.db.connection().await?;
    let rows = applications::table
        .filter(applications::surrogate_id.eq(&query.surrogate_id))
        .order(applications::submitted_at.desc())
        .limit(page.limit())
        .offset(page.offset())
        .load::<Application>(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[derive(Debug, Deserialize)]
pub struct CreateApplication {
    pub surrogate_id: String,
    /// The raw intake form. Kept as-is; the filter engine canonicalizes
    /// the fields it needs at read time.
    pub form_data: Value,
}

pub async fn create_application(
    State(ctx): State<AppContext>,
    Json(body): Json<CreateApplication>,
) -> Result<Json<ApiResponse<Application>>, PlatformError> {
    if body.surrogate_id.trim().is_empty() {
        return Err(PlatformError::validation("surrogate_id is required"));
    }
    if !body.form_data.is_object() {
        return Err(PlatformError::validation("form_data must be a JSON object"));
    }

    let record = NewApplication {
        id: Uuid::new_v4().to_string(),
        surrogate_id: body.surrogate_id,
        form_data: body.form_data,
        submitted_at: Utc::now(),
    };

    let mut conn = ctx.db.connection().await?;
    let row = diesel::insert_into(applications::table)
        .values(&record)
        .get_result::<Application>(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(row)))
}
