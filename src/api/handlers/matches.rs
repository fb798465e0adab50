// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::routes::{ApiResponse, PaginationParams};
use crate::api::AppContext;
use crate::error::PlatformError;
use crate::models::matches::{MatchStatus, NewSurrogateMatch, SurrogateMatch, UpdateSurrogateMatch};
use crate::models::profile::ROLE_SURROGATE;
use crate::schema::{profiles, surrogate_matches};

#[derive(Debug, Deserialize)]
pub struct MatchListQuery {
    pub status: Option<String>,
    pub surrogate_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List matches, optionally narrowed by status or surrogate.
pub async fn list_matches(
    State(ctx): State<AppContext>,
    Query(query): Query<MatchListQuery>,
) -> Result<Json<ApiResponse<Vec<SurrogateMatch>>>, PlatformError> {
    if let Some(status) = &query.status {
        status
            .parse::<MatchStatus>()
            .map_err(PlatformError::validation)?;
    }
    let page = PaginationParams {
        limit: query.limit,
        offset: query.offset,
    };

    let mut conn = ctx.db.connection().await?;
    let mut items = surrogate_matches::table.into_boxed();
    if let Some(status) = &query.status {
        items = items.filter(surrogate_matches::status.eq(status.clone()));
    }
    if let Some(surrogate_id) = &query.surrogate_id {
        items = items.filter(surrogate_matches::surrogate_id.eq(surrogate_id.clone()));
    }
    let rows = items
        .order(surrogate_matches::created_at.desc())
        .limit(page.limit())
        .offset(page.offset())
        .load::<SurrogateMatch>(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

pub async fn get_match(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SurrogateMatch>>, PlatformError> {
    let mut conn = ctx.db.connection().await?;
    let row = surrogate_matches::table
        .find(&id)
        .first::<SurrogateMatch>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| PlatformError::NotFound(format!("match {id}")))?;
    Ok(Json(ApiResponse::success(row)))
}

#[derive(Debug, Deserialize)]
pub struct CreateMatch {
    pub surrogate_id: String,
    pub parent_id: Option<String>,
    pub secondary_parent_id: Option<String>,
    pub sign_date: Option<NaiveDate>,
}

/// Create a match. Exactly one surrogate, referenced by id; the surrogate
/// profile must exist and carry the surrogate role.
pub async fn create_match(
    State(ctx): State<AppContext>,
    Json(body): Json<CreateMatch>,
) -> Result<Json<ApiResponse<SurrogateMatch>>, PlatformError> {
    if body.surrogate_id.trim().is_empty() {
        return Err(PlatformError::validation("surrogate_id is required"));
    }

    let mut conn = ctx.db.connection().await?;
    let surrogate_role = profiles::table
        .find(&body.surrogate_id)
        .select(profiles::role)
        .first::<String>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| {
            PlatformError::validation(format!("surrogate {} does not exist", body.surrogate_id))
        })?;
    if surrogate_role != ROLE_SURROGATE {
        return Err(PlatformError::validation(format!(
            "profile {} is not a surrogate",
            body.surrogate_id
        )));
    }

    let now = Utc::now();
    let record = NewSurrogateMatch {
        id: Uuid::new_v4().to_string(),
        surrogate_id: body.surrogate_id,
        parent_id: body.parent_id,
        secondary_parent_id: body.secondary_parent_id,
        status: MatchStatus::Active.as_str().to_string(),
        sign_date: body.sign_date,
        created_at: now,
        updated_at: now,
    };

    let row = diesel::insert_into(surrogate_matches::table)
        .values(&record)
        .get_result::<SurrogateMatch>(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(row)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateMatchBody {
    pub parent_id: Option<String>,
    pub secondary_parent_id: Option<String>,
    pub status: Option<String>,
    pub sign_date: Option<NaiveDate>,
    pub transfer_date: Option<NaiveDate>,
    pub beta_confirm_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub legal_clearance_date: Option<NaiveDate>,
    pub medication_start_date: Option<NaiveDate>,
    pub pregnancy_test_date: Option<NaiveDate>,
    pub second_pregnancy_test_date: Option<NaiveDate>,
}

/// Patch milestones or status. Matches are never deleted, only cancelled.
pub async fn update_match(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateMatchBody>,
) -> Result<Json<ApiResponse<SurrogateMatch>>, PlatformError> {
    if let Some(status) = &body.status {
        status
            .parse::<MatchStatus>()
            .map_err(PlatformError::validation)?;
    }

    let changes = UpdateSurrogateMatch {
        parent_id: body.parent_id,
        secondary_parent_id: body.secondary_parent_id,
        status: body.status,
        sign_date: body.sign_date,
        transfer_date: body.transfer_date,
        beta_confirm_date: body.beta_confirm_date,
        due_date: body.due_date,
        legal_clearance_date: body.legal_clearance_date,
        medication_start_date: body.medication_start_date,
        pregnancy_test_date: body.pregnancy_test_date,
        second_pregnancy_test_date: body.second_pregnancy_test_date,
        updated_at: Some(Utc::now()),
    };

    let mut conn = ctx.db.connection().await?;
    let row = diesel::update(surrogate_matches::table.find(&id))
        .set(&changes)
        .get_result::<SurrogateMatch>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| PlatformError::NotFound(format!("match {id}")))?;
    Ok(Json(ApiResponse::success(row)))
}
