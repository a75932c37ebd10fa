//! Weather data providers

pub mod openweather;

pub use openweather::{OpenWeatherClient, PointForecast};
