// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use axum::extract::{Path, Query, State};
use axum::Json;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use serde::Deserialize;

use crate::api::routes::{ApiResponse, PaginationParams};
use crate::api::AppContext;
use crate::error::PlatformError;
use crate::models::notification::Notification;
use crate::schema::notifications;

#[derive(Debug, Deserialize)]
pub struct NotificationListQuery {
    pub recipient_id: String,
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// A recipient's notifications, newest first.
pub async fn list_notifications(
    State(ctx): State<AppContext>,
    Query(query): Query<NotificationListQuery>,
) -> Result<Json<ApiResponse<Vec<Notification>>>, PlatformError> {
    let page = PaginationParams {
        limit: query.limit,
        offset: query.offset,
    };
    let mut conn = ctx.db.connection().await?;
    let mut items = notifications::table
        .filter(notifications::recipient_id.eq(query.recipient_id.clone()))
        .into_boxed();
    if query.unread_only.unwrap_or(false) {
        items = items.filter(notifications::read.eq(false));
    }
    let rows = items
        .order(notifications::created_at.desc())
        .limit(page.limit())
        .offset(page.offset())
        .load::<Notification>(&mut conn)
        .await?;
    Ok(Json(ApiResponse::success(rows)))
}

/// Mark one notification read. Marking an already-read row again is a
/// no-op, not an error.
pub async fn mark_read(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Notification>>, PlatformError> {
    let mut conn = ctx.db.connection().await?;
    let row = diesel::update(notifications::table.find(&id))
        .set(notifications::read.eq(true))
        .get_result::<Notification>(&mut conn)
        .await
        .optional()?
        .ok_or_else(|| PlatformError::NotFound(format!("notification {id}")))?;
    Ok(Json(ApiResponse::success(row)))
}
