// Copyright (c) CareMatch Team
// SPDX-License-Identifier: Apache-2.0

//! Process counters exposed at `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

use crate::error::PlatformError;

pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// Stage writes applied to profiles, regardless of author.
pub static STAGE_CHANGES: Lazy<IntCounter> = Lazy::new(|| {
    register(IntCounter::new(
        "carematch_stage_changes_total",
        "Stage writes applied to profiles",
    ))
});

/// Business-statistics requests served, including filtered ones.
pub static STATISTICS_REQUESTS: Lazy<IntCounter> = Lazy::new(|| {
    register(IntCounter::new(
        "carematch_statistics_requests_total",
        "Business statistics requests served",
    ))
});

/// Notification rows written by the stage watcher fan-out.
pub static NOTIFICATIONS_EMITTED: Lazy<IntCounter> = Lazy::new(|| {
    register(IntCounter::new(
        "carematch_notifications_emitted_total",
        "Stage change notifications emitted",
    ))
});

fn register(counter: Result<IntCounter, prometheus::Error>) -> IntCounter {
    let counter = counter.expect("counter options are static and valid");
    REGISTRY
        .register(Box::new(counter.clone()))
        .expect("metric name registered once");
    counter
}

/// Render the registry in the text exposition format.
pub fn render() -> Result<String, PlatformError> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&REGISTRY.gather(), &mut buffer)
        .map_err(PlatformError::remote)?;
    String::from_utf8(buffer).map_err(PlatformError::remote)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_render_in_text_format() {
        STAGE_CHANGES.inc();
        STATISTICS_REQUESTS.inc();
        NOTIFICATIONS_EMITTED.inc();
        let body = render().unwrap();
        assert!(body.contains("carematch_stage_changes_total"));
        assert!(body.contains("carematch_statistics_requests_total"));
        assert!(body.contains("carematch_notifications_emitted_total"));
    }
}
