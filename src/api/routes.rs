// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// Standard API response wrapper for list and mutation endpoints. The
/// statistics endpoint returns its fixed shape unwrapped.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Pagination parameters shared by list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationParams {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10).clamp(1, 100)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_caps() {
        let params = PaginationParams::default();
        assert_eq!(params.limit(), 10);
        assert_eq!(params.offset(), 0);

        let params = PaginationParams {
            limit: Some(5000),
            offset: Some(-3),
        };
        assert_eq!(params.limit(), 100);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn envelope_shapes() {
        let ok = ApiResponse::success(7);
        assert!(ok.success);
        assert_eq!(ok.data, Some(7));

        let err: ApiResponse<i32> = ApiResponse::error("nope");
        assert!(!err.success);
        assert_eq!(err.error.as_deref(), Some("nope"));
    }
}
