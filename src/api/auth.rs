// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Admin session check for dashboard-only endpoints. The cookie carries an
//! admin user id; the id must exist in `admin_users`.

use axum::headers::Cookie;
use axum::TypedHeader;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use super::AppContext;
use crate::error::PlatformError;
use crate::models::admin::AdminUser;
use crate::schema::admin_users;

pub const ADMIN_COOKIE: &str = "admin_user_id";

/// Resolve the admin session or fail with `Unauthorized`. A present cookie
/// naming an unknown id is treated the same as no cookie at all.
pub async fn require_admin(
    ctx: &AppContext,
    cookies: Option<&TypedHeader<Cookie>>,
) -> Result<AdminUser, PlatformError> {
    let admin_id = cookies
        .and_then(|TypedHeader(cookie)| cookie.get(ADMIN_COOKIE))
        .map(str::to_string)
        .ok_or(PlatformError::Unauthorized)?;

    let mut conn = ctx.db.connection().await?;
    let admin = admin_users::table
        .find(&admin_id)
        .first::<AdminUser>(&mut conn)
        .await
        .optional()?;
    admin.ok_or(PlatformError::Unauthorized)
}
