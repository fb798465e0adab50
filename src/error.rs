// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Platform-wide error taxonomy.
///
/// Two families matter to callers: `Remote` (a backend call failed; the
/// request aborts and any optimistic local change is reverted) and
/// `Validation` (rejected before any write happens). `NotFound` and
/// `Unauthorized` exist for the HTTP surface.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("remote call failed: {0}")]
    Remote(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("admin session required")]
    Unauthorized,
}

impl PlatformError {
    pub fn remote(err: impl std::fmt::Display) -> Self {
        Self::Remote(err.to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Remote(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<diesel::result::Error> for PlatformError {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => Self::NotFound("record not found".to_string()),
            other => Self::Remote(other.to_string()),
        }
    }
}

impl IntoResponse for PlatformError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(serde_json::json!({
            "error": self.to_string()
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let err = PlatformError::validation("bad date");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "validation failed: bad date");
    }

    #[test]
    fn diesel_not_found_maps_to_not_found() {
        let err: PlatformError = diesel::result::Error::NotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn remote_maps_to_internal_error() {
        let err = PlatformError::remote("connection reset");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
