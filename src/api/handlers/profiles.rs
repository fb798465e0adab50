// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::routes::{ApiResponse, PaginationParams};
use crate::api::AppContext;
use crate::error::PlatformError;
use crate::metrics::STAGE_CHANGES;
use crate::models::profile::{
    NewProfile, Profile, UpdateProfile, ROLE_ADMIN, ROLE_PARENT, ROLE_SURROGATE,
};
use crate::realtime::StageChange;
use crate::schema::profiles;
use crate::stage::gestation::EmbryoDay;
use crate::stage::{ProgressStage, StageUpdater, UnknownStage};

#[derive(Debug, Deserialize)]
pub struct ProfileListQuery {
    pub role: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// List profiles, optionally narrowed to one role.
pub async fn list_profiles(
    State(ctx): State<AppContext>,
    Query(query): Query<ProfileListQuery>,
) -> Result<Json<ApiResponse<Vec<Profile>>>, PlatformError> {
    let page = PaginationParams {
        limit: query.limit,
        offset: query.offset,
    };
    let mut conn = ctx.db.connection().await?;

    let mut items = profiles::table.into_boxed();
    if let Some(role) = &query.role {
        items = items.filter(profiles::role.eq(role.clone()));
    }
    let rows = items
        .order(profiles::created_at.desc())
        .limit(page.limit())
        .offset(page.offset())
        .load::<Profile>(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

pub async fn get_profile(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Profile>>, PlatformError> {
    let mut conn = ctx.db.connection().await?;
    let profile = profiles::table
        .find(&id)
        .first::<Profile>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| PlatformError::NotFound(format!("profile {id}")))?;
    Ok(Json(ApiResponse::success(profile)))
}

#[derive(Debug, Deserialize)]
pub struct CreateProfile {
    pub role: String,
    pub display_name: String,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub location: Option<String>,
    pub race: Option<String>,
}

/// Create a profile. New profiles always start at the initial stage.
pub async fn create_profile(
    State(ctx): State<AppContext>,
    Json(body): Json<CreateProfile>,
) -> Result<Json<ApiResponse<Profile>>, PlatformError> {
    let role = body.role.trim();
    if role != ROLE_SURROGATE && role != ROLE_PARENT && role != ROLE_ADMIN {
        return Err(PlatformError::validation(format!("unknown role {role:?}")));
    }
    if body.display_name.trim().is_empty() {
        return Err(PlatformError::validation("display_name is required"));
    }

    let now = Utc::now();
    let record = NewProfile {
        id: Uuid::new_v4().to_string(),
        role: role.to_string(),
        display_name: body.display_name.trim().to_string(),
        email: body.email,
        date_of_birth: body.date_of_birth,
        location: body.location,
        race: body.race,
        progress_stage: ProgressStage::Pre.as_str().to_string(),
        created_at: now,
        updated_at: now,
    };

    let mut conn = ctx.db.connection().await?;
    let profile = diesel::insert_into(profiles::table)
        .values(&record)
        .get_result::<Profile>(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(profile)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileBody {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub location: Option<String>,
    pub race: Option<String>,
    pub transfer_date: Option<NaiveDate>,
    pub transfer_embryo_day: Option<i32>,
}

/// Patch demographics and transfer details. Stage changes go through the
/// dedicated stage route, never through here.
pub async fn update_profile(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateProfileBody>,
) -> Result<Json<ApiResponse<Profile>>, PlatformError> {
    if let Some(day) = body.transfer_embryo_day {
        if EmbryoDay::from_i32(day).is_none() {
            return Err(PlatformError::validation(format!(
                "transfer_embryo_day must be 3 or 5, got {day}"
            )));
        }
    }

    let changes = UpdateProfile {
        display_name: body.display_name,
        email: body.email,
        date_of_birth: body.date_of_birth,
        location: body.location,
        race: body.race,
        transfer_date: body.transfer_date,
        transfer_embryo_day: body.transfer_embryo_day,
        updated_at: Some(Utc::now()),
    };

    let mut conn = ctx.db.connection().await?;
    let profile = diesel::update(profiles::table.find(&id))
        .set(&changes)
        .get_result::<Profile>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| PlatformError::NotFound(format!("profile {id}")))?;
    Ok(Json(ApiResponse::success(profile)))
}

#[derive(Debug, Deserialize)]
pub struct StageWrite {
    pub stage: String,
    pub updated_by: String,
}

/// Write a profile's stage with provenance, then publish the change to the
/// hub so watchers hear it without waiting for a poll. Backward moves are
/// allowed but logged.
pub async fn set_stage(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Json(body): Json<StageWrite>,
) -> Result<Json<ApiResponse<Profile>>, PlatformError> {
    let stage: ProgressStage = body
        .stage
        .parse()
        .map_err(|err: UnknownStage| PlatformError::validation(err.to_string()))?;
    let updated_by: StageUpdater = body
        .updated_by
        .parse()
        .map_err(|err: UnknownStage| PlatformError::validation(err.to_string()))?;

    let mut conn = ctx.db.connection().await?;
    let current = profiles::table
        .find(&id)
        .first::<Profile>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| PlatformError::NotFound(format!("profile {id}")))?;

    if let Some(prev) = current.stage() {
        if prev.is_regression_to(stage) {
            warn!(
                profile_id = %id,
                from = prev.as_str(),
                to = stage.as_str(),
                "stage moving backwards"
            );
        }
    }

    let now = Utc::now();
    let profile = diesel::update(profiles::table.find(&id))
        .set((
            profiles::progress_stage.eq(stage.as_str()),
            profiles::stage_updated_by.eq(updated_by.as_str()),
            profiles::stage_updated_at.eq(now),
            profiles::updated_at.eq(now),
        ))
        .get_result::<Profile>(&mut conn)
        .await?;

    STAGE_CHANGES.inc();
    ctx.hub.publish(StageChange {
        profile_id: id.clone(),
        stage,
        updated_by: Some(updated_by),
        changed_at: now,
    });
    info!(
        profile_id = %id,
        stage = stage.as_str(),
        updated_by = updated_by.as_str(),
        "stage updated"
    );

    Ok(Json(ApiResponse::success(profile)))
}
