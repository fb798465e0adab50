// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, Query, State};
use axum::headers::Cookie;
use axum::{Json, TypedHeader};
use chrono::Utc;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::api::auth::require_admin;
use crate::api::routes::{ApiResponse, PaginationParams};
use crate::api::AppContext;
use crate::dates;
use crate::error::PlatformError;
use crate::models::medical::{MedicalReport, NewMedicalReport, ReportStage};
use crate::schema::medical_reports;

#[derive(Debug, Deserialize)]
pub struct ReportListQuery {
    pub surrogate_id: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Reports for one surrogate, newest exam first.
pub async fn list_reports(
    State(ctx): State<AppContext>,
    Query(query): Query<ReportListQuery>,
) -> Result<Json<ApiResponse<Vec<MedicalReport>>>, PlatformError> {
    let page = PaginationParams {
        limit: query.limit,
        offset: query.offset,
    };
    let mut conn = ctx.db.connection().await?;
    let rows = medical_reports::table
        .filter(medical_reports::surrogate_id.eq(&query.surrogate_id))
        .order(medical_reports::exam_date.desc())
        .limit(page.limit())
        .offset(page.offset())
        .load::<MedicalReport>(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

#[derive(Debug, Deserialize)]
pub struct CreateReport {
    pub surrogate_id: String,
    pub report_stage: String,
    /// MM/DD/YY as the legacy forms send it, or ISO `YYYY-MM-DD`.
    pub exam_date: String,
    pub report_data: Value,
    pub proof_image: Option<String>,
}

/// File a stage-tagged medical report.
pub async fn create_report(
    State(ctx): State<AppContext>,
    Json(body): Json<CreateReport>,
) -> Result<Json<ApiResponse<MedicalReport>>, PlatformError> {
    let stage = body
        .report_stage
        .parse::<ReportStage>()
        .map_err(PlatformError::validation)?;
    let exam_date = dates::parse_flexible(&body.exam_date)?;
    if body.surrogate_id.trim().is_empty() {
        return Err(PlatformError::validation("surrogate_id is required"));
    }

    let record = NewMedicalReport {
        id: Uuid::new_v4().to_string(),
        surrogate_id: body.surrogate_id,
        report_stage: stage.as_str().to_string(),
        exam_date,
        report_data: body.report_data,
        proof_image: body.proof_image,
        created_at: Utc::now(),
    };

    let mut conn = ctx.db.connection().await?;
    let row = diesel::insert_into(medical_reports::table)
        .values(&record)
        .get_result::<MedicalReport>(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(row)))
}

/// Remove a report. Admin only; surrogates cannot retract filed records.
pub async fn delete_report(
    State(ctx): State<AppContext>,
    cookies: Option<TypedHeader<Cookie>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Value>>, PlatformError> {
    let admin = require_admin(&ctx, cookies.as_ref()).await?;

    let mut conn = ctx.db.connection().await?;
    let deleted = diesel::delete(medical_reports::table.find(&id))
        .execute(&mut conn)
        .await?;
    if deleted == 0 {
        return Err(PlatformError::NotFound(format!("medical report {id}")));
    }
    info!(report_id = %id, admin_id = %admin.id, "medical report deleted");
    Ok(Json(ApiResponse::success(serde_json::json!({
        "deleted": id
    }))))
}
