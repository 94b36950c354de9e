//! The root!
//!
//! Stand-in workload, optionally slow so a drain can be watched

use std::time::Duration;

use axum::extract::Query;
use serde::Deserialize;

/// Longest delay a request can ask for
const MAX_DELAY_MS: u64 = 5 * 60 * 1000;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootParams {
    /// Sleep this long before answering
    delay_ms: Option<u64>,
}

/// The root!
///
/// Answers after the requested delay, capped to [`MAX_DELAY_MS`]
pub async fn root(Query(params): Query<RootParams>) -> &'static str {
    if let Some(delay_ms) = params.delay_ms {
        let delay = Duration::from_millis(delay_ms.min(MAX_DELAY_MS));

        tracing::debug!("Delaying response for {delay:?}");

        tokio::time::sleep(delay).await;
    }

    "Hello, world!\n"
}
