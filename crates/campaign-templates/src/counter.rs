//! Live response counter
//!
//! `GET {api_url}/get-count` answers `{"count": N}`. The count is cosmetic, so
//! any failure degrades to a fallback value instead of aborting the run.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// How long to wait for the counter before giving up
pub const COUNTER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct CountResponse {
    count: Option<u64>,
}

/// Fetch the current response count, or `fallback` on any failure
pub async fn fetch_response_count(api_url: &str, fallback: u64) -> u64 {
    match try_fetch(api_url).await {
        Ok(Some(count)) => {
            debug!(count, "Fetched live response count");
            count
        }
        Ok(None) => {
            warn!(fallback, "Counter response had no count, using fallback");
            fallback
        }
        Err(e) => {
            warn!(error = %e, fallback, "Could not fetch live response count, using fallback");
            fallback
        }
    }
}

async fn try_fetch(api_url: &str) -> Result<Option<u64>, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(COUNTER_TIMEOUT).build()?;
    let url = format!("{}/get-count", api_url.trim_end_matches('/'));
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.json::<CountResponse>().await?.count)
}
