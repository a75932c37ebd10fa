//! Normalized forecast entries shared by every forecast tier

use serde::{Deserialize, Serialize};
use std::fmt;

/// Daily temperature range in Celsius
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct TemperatureRange {
    pub min: f64,
    pub max: f64,
}

/// Icon code and text for a weather condition
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct Condition {
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub description: String,
}

/// One forecast day.
///
/// Deserializes straight from a One Call `daily[]` element; unknown fields are
/// ignored so the richer tiers pass through unmodified.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DailyForecastEntry {
    /// Seconds since the Unix epoch
    pub dt: i64,
    pub temp: TemperatureRange,
    #[serde(default)]
    pub weather: Vec<Condition>,
}

/// One forecast hour (or three-hour step on the coarsest tier)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct HourlyForecastEntry {
    pub dt: i64,
    /// Temperature in Celsius
    pub temp: f64,
    pub icon: String,
    pub description: String,
}

/// Forecast data sources, richest first
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForecastTier {
    /// One Call 3.0
    #[serde(rename = "one-call-3.0")]
    OneCall3,
    /// One Call 2.5
    #[serde(rename = "one-call-2.5")]
    OneCall25,
    /// 5 day / 3 hour forecast
    #[serde(rename = "three-hourly")]
    ThreeHourly,
}

impl ForecastTier {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ForecastTier::OneCall3 => "one-call-3.0",
            ForecastTier::OneCall25 => "one-call-2.5",
            ForecastTier::ThreeHourly => "three-hourly",
        }
    }
}

impl fmt::Display for ForecastTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Forecast entries plus the tier that produced them
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResolvedForecast<T> {
    pub tier: ForecastTier,
    pub entries: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_entry_from_one_call_payload() {
        let entry: DailyForecastEntry = serde_json::from_value(serde_json::json!({
            "dt": 1_700_000_000,
            "sunrise": 1_699_980_000,
            "temp": { "day": 12.3, "min": 8.1, "max": 14.9, "night": 9.0 },
            "weather": [{ "id": 500, "main": "Rain", "description": "light rain", "icon": "10d" }],
            "pop": 0.4
        }))
        .unwrap();

        assert_eq!(entry.dt, 1_700_000_000);
        assert_eq!(entry.temp, TemperatureRange { min: 8.1, max: 14.9 });
        assert_eq!(entry.weather[0].icon, "10d");
        assert_eq!(entry.weather[0].description, "light rain");
    }

    #[test]
    fn test_tier_serialization_matches_display() {
        for tier in [ForecastTier::OneCall3, ForecastTier::OneCall25, ForecastTier::ThreeHourly] {
            let json = serde_json::to_value(tier).unwrap();
            assert_eq!(json, serde_json::Value::String(tier.to_string()));
        }
    }
}
