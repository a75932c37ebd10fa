//! `SkyAtlas` - weather, forecast and climate lookups for a map front end
//!
//! This library provides the forecast fallback resolver, the Köppen raster
//! classifier and the HTTP API that serves them.

pub mod api;
pub mod climate;
pub mod config;
pub mod elevation;
pub mod error;
pub mod fallback;
pub mod forecast;
pub mod http;
pub mod location_resolver;
pub mod logging;
pub mod models;
pub mod report;
pub mod session;
pub mod weather;
pub mod web;

// Re-export core types for public API
pub use climate::{ClimateClassification, RasterGrid, classify};
pub use config::AppConfig;
pub use error::SkyAtlasError;
pub use forecast::{ForecastResolver, ForecastSource};
pub use location_resolver::LocationResolver;
pub use models::{Coordinate, ForecastTier, Place, ResolvedForecast};
pub use report::{AppServices, LocationReport, build_report};
pub use session::{SelectionSession, SessionRegistry};
pub use weather::OpenWeatherClient;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, SkyAtlasError>;
