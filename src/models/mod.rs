//! Data models for `SkyAtlas`
//!
//! - Location: coordinates and geocoded places
//! - Forecast: normalized daily/hourly entries and the tier that produced them
//! - Weather: current conditions

pub mod forecast;
pub mod location;
pub mod weather;

pub use forecast::{
    Condition, DailyForecastEntry, ForecastTier, HourlyForecastEntry, ResolvedForecast,
    TemperatureRange,
};
pub use location::{Coordinate, Place};
pub use weather::CurrentConditions;
