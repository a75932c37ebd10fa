//! Ordered fallback over lazily evaluated async providers.
//!
//! Tiers run strictly one after another. A tier whose result is rejected by
//! the acceptance predicate, or whose fetch fails, hands over to the next one.
//! A fetch failure on the final tier ends the chain as a hard failure.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::{Result, SkyAtlasError};

type Attempt<'a, T> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T>> + Send + 'a>;

/// Prioritized list of providers for one kind of value
pub struct FallbackChain<'a, K, T> {
    tiers: Vec<(K, Attempt<'a, T>)>,
}

impl<K, T> Default for FallbackChain<'_, K, T> {
    fn default() -> Self {
        Self { tiers: Vec::new() }
    }
}

impl<'a, K, T> FallbackChain<'a, K, T>
where
    K: Copy + Display,
    T: Send + 'a,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tier. `attempt` is only called when every earlier tier gave up.
    #[must_use]
    pub fn tier<F, Fut>(mut self, key: K, attempt: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T>> + Send + 'a,
    {
        self.tiers.push((key, Box::new(move || attempt().boxed())));
        self
    }

    /// Run tiers in order and return the first accepted value with its tier.
    pub async fn resolve<P>(self, accept: P) -> Result<(K, T)>
    where
        P: Fn(&T) -> bool,
    {
        let last = self.tiers.len().saturating_sub(1);

        for (index, (key, attempt)) in self.tiers.into_iter().enumerate() {
            match attempt().await {
                Ok(value) if accept(&value) => {
                    info!(tier = %key, "Tier produced usable data");
                    return Ok((key, value));
                }
                Ok(_) => {
                    debug!(tier = %key, "Tier yielded nothing usable");
                }
                Err(e) if index == last => {
                    warn!(tier = %key, error = %e, "Final tier failed");
                    return Err(SkyAtlasError::ForecastUnavailable {
                        last_error: Some(e.to_string()),
                    });
                }
                Err(e) => {
                    warn!(tier = %key, error = %e, "Tier unavailable, trying next");
                }
            }
        }

        Err(SkyAtlasError::ForecastUnavailable { last_error: None })
    }
}
