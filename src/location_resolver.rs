//! Location Resolution Module
//!
//! Direct geocoding for the search box and reverse geocoding for the name of
//! a selected point, both against the OpenWeather geocoding API.

use reqwest_middleware::ClientWithMiddleware;
use tracing::{debug, instrument, warn};

use crate::config::WeatherConfig;
use crate::http::redact;
use crate::models::{Coordinate, Place};
use crate::{Result, SkyAtlasError};

/// Upper bound for suggestions in one search
pub const MAX_GEOCODE_RESULTS: usize = 10;

/// Placeholder when a point cannot be named
pub const UNKNOWN_PLACE: &str = "Unknown";

/// Service for resolving place names and coordinates
#[derive(Debug, Clone)]
pub struct LocationResolver {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
}

impl LocationResolver {
    pub fn new(client: ClientWithMiddleware, config: &WeatherConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str, query: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SkyAtlasError::config("OpenWeather API key is not configured"))?;
        Ok(format!(
            "{}/geo/1.0/{}?{}&appid={}",
            self.base_url,
            path,
            query,
            urlencoding::encode(api_key)
        ))
    }

    async fn fetch_places(&self, url: &str) -> Result<Vec<Place>> {
        debug!("Geocoding request: {}", redact(url));

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SkyAtlasError::api_status(
                status.as_u16(),
                format!("Geocoding returned {status}"),
            ));
        }

        response
            .json::<Vec<Place>>()
            .await
            .map_err(|e| SkyAtlasError::parse(format!("Invalid geocoding payload: {e}")))
    }

    /// Suggestions for a free-text query, best match first
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Place>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let limit = limit.clamp(1, MAX_GEOCODE_RESULTS);
        let url = self.url(
            "direct",
            &format!("q={}&limit={}", urlencoding::encode(query), limit),
        )?;

        let mut places = self.fetch_places(&url).await?;
        places.truncate(limit);
        debug!("Found {} places for '{}'", places.len(), query);
        Ok(places)
    }

    /// Nearest named place for a coordinate
    #[instrument(skip(self), fields(lat = coordinate.lat, lon = coordinate.lon))]
    pub async fn reverse(&self, coordinate: Coordinate) -> Result<Option<Place>> {
        let url = self.url(
            "reverse",
            &format!("lat={}&lon={}&limit=1", coordinate.lat, coordinate.lon),
        )?;
        Ok(self.fetch_places(&url).await?.into_iter().next())
    }

    /// Display name for a selected point; never fails
    pub async fn place_name(&self, coordinate: Coordinate) -> String {
        match self.reverse(coordinate).await {
            Ok(Some(place)) => place.short_name(),
            Ok(None) => {
                debug!("No place found at {}", coordinate.format_coordinates());
                UNKNOWN_PLACE.to_string()
            }
            Err(e) => {
                warn!("Reverse geocoding failed: {}", e);
                UNKNOWN_PLACE.to_string()
            }
        }
    }
}
