// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

use crate::error::PlatformError;
use crate::metrics;

/// Prometheus text exposition.
pub async fn get_metrics() -> Result<String, PlatformError> {
    metrics::render()
}
