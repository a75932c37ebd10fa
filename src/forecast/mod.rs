//! Forecast resolution across the three forecast tiers.
//!
//! One Call 3.0 is tried first, then One Call 2.5, then the 5 day / 3 hour
//! series. The first tier that yields at least one entry wins; the coarse
//! series is aggregated into days or passed through as pseudo-hourly steps.

pub mod aggregate;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use crate::Result;
use crate::fallback::FallbackChain;
use crate::models::{
    Coordinate, DailyForecastEntry, ForecastTier, HourlyForecastEntry, ResolvedForecast,
};

/// Upper bound for requested forecast days
pub const MAX_FORECAST_DAYS: usize = 10;
/// Hourly forecasts are always this long at most
pub const HOURLY_LIMIT: usize = 24;
/// Three-hour steps used when only the coarse series is available (27 hours)
pub const THREE_HOURLY_STEPS: usize = 9;

/// One Call API generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OneCallVersion {
    V3,
    V25,
}

impl OneCallVersion {
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            OneCallVersion::V3 => "data/3.0/onecall",
            OneCallVersion::V25 => "data/2.5/onecall",
        }
    }
}

/// Remote forecast data, already normalized into entry shapes.
///
/// A payload without the requested section yields an empty list, not an error.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    async fn daily(
        &self,
        version: OneCallVersion,
        coordinate: Coordinate,
    ) -> Result<Vec<DailyForecastEntry>>;

    async fn hourly(
        &self,
        version: OneCallVersion,
        coordinate: Coordinate,
    ) -> Result<Vec<HourlyForecastEntry>>;

    /// Three-hour samples, oldest first
    async fn three_hourly(&self, coordinate: Coordinate) -> Result<Vec<HourlyForecastEntry>>;
}

#[async_trait]
impl<S: ForecastSource + ?Sized> ForecastSource for Arc<S> {
    async fn daily(
        &self,
        version: OneCallVersion,
        coordinate: Coordinate,
    ) -> Result<Vec<DailyForecastEntry>> {
        (**self).daily(version, coordinate).await
    }

    async fn hourly(
        &self,
        version: OneCallVersion,
        coordinate: Coordinate,
    ) -> Result<Vec<HourlyForecastEntry>> {
        (**self).hourly(version, coordinate).await
    }

    async fn three_hourly(&self, coordinate: Coordinate) -> Result<Vec<HourlyForecastEntry>> {
        (**self).three_hourly(coordinate).await
    }
}

/// Clamp a requested day count into `1..=MAX_FORECAST_DAYS`
#[must_use]
pub fn clamp_days(count: usize) -> usize {
    count.clamp(1, MAX_FORECAST_DAYS)
}

/// Resolves daily and hourly forecasts over a [`ForecastSource`]
pub struct ForecastResolver<S> {
    source: S,
}

impl<S: ForecastSource> ForecastResolver<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Up to `count` forecast days (clamped to 1..=10), oldest first.
    #[instrument(skip(self), fields(lat = coordinate.lat, lon = coordinate.lon))]
    pub async fn forecast_days(
        &self,
        coordinate: Coordinate,
        count: usize,
    ) -> Result<ResolvedForecast<DailyForecastEntry>> {
        let count = clamp_days(count);
        let source = &self.source;

        let (tier, mut entries) = FallbackChain::new()
            .tier(ForecastTier::OneCall3, move || {
                source.daily(OneCallVersion::V3, coordinate)
            })
            .tier(ForecastTier::OneCall25, move || {
                source.daily(OneCallVersion::V25, coordinate)
            })
            .tier(ForecastTier::ThreeHourly, move || {
                synthesized_days(source, coordinate)
            })
            .resolve(|entries: &Vec<DailyForecastEntry>| !entries.is_empty())
            .await?;

        entries.truncate(count);
        Ok(ResolvedForecast { tier, entries })
    }

    /// Up to 24 hourly entries; the coarse tier yields three-hour steps.
    #[instrument(skip(self), fields(lat = coordinate.lat, lon = coordinate.lon))]
    pub async fn hourly_24(
        &self,
        coordinate: Coordinate,
    ) -> Result<ResolvedForecast<HourlyForecastEntry>> {
        let source = &self.source;

        let (tier, mut entries) = FallbackChain::new()
            .tier(ForecastTier::OneCall3, move || {
                source.hourly(OneCallVersion::V3, coordinate)
            })
            .tier(ForecastTier::OneCall25, move || {
                source.hourly(OneCallVersion::V25, coordinate)
            })
            .tier(ForecastTier::ThreeHourly, move || {
                three_hour_steps(source, coordinate)
            })
            .resolve(|entries: &Vec<HourlyForecastEntry>| !entries.is_empty())
            .await?;

        entries.truncate(HOURLY_LIMIT);
        Ok(ResolvedForecast { tier, entries })
    }
}

async fn synthesized_days<S: ForecastSource>(
    source: &S,
    coordinate: Coordinate,
) -> Result<Vec<DailyForecastEntry>> {
    let samples = source.three_hourly(coordinate).await?;
    Ok(aggregate::daily_from_samples(&samples))
}

async fn three_hour_steps<S: ForecastSource>(
    source: &S,
    coordinate: Coordinate,
) -> Result<Vec<HourlyForecastEntry>> {
    let mut samples = source.three_hourly(coordinate).await?;
    samples.truncate(THREE_HOURLY_STEPS);
    Ok(samples)
}
