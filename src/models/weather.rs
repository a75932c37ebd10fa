//! Current weather conditions

use serde::{Deserialize, Serialize};

/// Current conditions at a coordinate
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CurrentConditions {
    /// Observation time, seconds since the Unix epoch
    pub dt: i64,
    /// Temperature in Celsius
    pub temp: f64,
    pub feels_like: f64,
    /// Relative humidity in percent
    pub humidity: u8,
    /// Atmospheric pressure in hPa
    pub pressure: f64,
    /// Wind speed in m/s
    pub wind_speed: f64,
    pub icon: String,
    pub description: String,
    /// UV index, when the one-call endpoint provided it
    pub uv_index: Option<f64>,
}

impl CurrentConditions {
    /// Format temperature with unit
    #[must_use]
    pub fn format_temperature(&self) -> String {
        format!("{:.1}°C", self.temp)
    }

    /// UV index for display; "–" when unknown
    #[must_use]
    pub fn format_uv_index(&self) -> String {
        self.uv_index
            .map_or_else(|| "–".to_string(), |uvi| format!("{uvi:.1}"))
    }
}
