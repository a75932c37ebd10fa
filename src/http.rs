//! Shared HTTP client construction

use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use std::time::Duration;

use crate::Result;

pub const USER_AGENT: &str = concat!("SkyAtlas/", env!("CARGO_PKG_VERSION"));

/// Plain client with a hard timeout. Forecast tiers use this one: a failed
/// tier hands over to the next tier instead of retrying.
pub fn plain_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()?;
    Ok(client)
}

/// Client for auxiliary lookups (geocoding, elevation) that retries
/// transient failures with exponential backoff.
pub fn retrying_client(timeout: Duration, max_retries: u32) -> Result<ClientWithMiddleware> {
    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
    let client = ClientBuilder::new(plain_client(timeout)?)
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build();
    Ok(client)
}

/// Strip the API key from a URL before it is logged
#[must_use]
pub fn redact(url: &str) -> &str {
    url.split("appid=").next().unwrap_or(url)
}
