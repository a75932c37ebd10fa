//! Ground elevation from the Open-Meteo elevation API

use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::ElevationConfig;
use crate::models::Coordinate;
use crate::{Result, SkyAtlasError};

#[derive(Debug, Deserialize)]
struct ElevationResponse {
    #[serde(default)]
    elevation: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct ElevationClient {
    client: ClientWithMiddleware,
    base_url: String,
}

impl ElevationClient {
    pub fn new(client: ClientWithMiddleware, config: &ElevationConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Elevation in meters, or an error when the lookup fails
    pub async fn try_elevation(&self, coordinate: Coordinate) -> Result<Option<f64>> {
        let url = format!(
            "{}/v1/elevation?latitude={}&longitude={}",
            self.base_url, coordinate.lat, coordinate.lon
        );
        debug!("Elevation request: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(SkyAtlasError::api_status(
                status.as_u16(),
                format!("Elevation API returned {status}"),
            ));
        }

        let payload: ElevationResponse = response
            .json()
            .await
            .map_err(|e| SkyAtlasError::parse(format!("Invalid elevation payload: {e}")))?;
        Ok(payload.elevation.first().copied().filter(|m| m.is_finite()))
    }

    /// Elevation in meters; `None` when unavailable
    #[instrument(skip(self), fields(lat = coordinate.lat, lon = coordinate.lon))]
    pub async fn elevation(&self, coordinate: Coordinate) -> Option<f64> {
        match self.try_elevation(coordinate).await {
            Ok(meters) => meters,
            Err(e) => {
                warn!("Elevation lookup failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::retrying_client;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ElevationClient {
        let config = ElevationConfig {
            base_url: server.uri(),
        };
        ElevationClient::new(retrying_client(Duration::from_secs(5), 0).unwrap(), &config)
    }

    #[tokio::test]
    async fn test_elevation_reads_first_value() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/elevation"))
            .and(query_param("latitude", "45.9"))
            .and(query_param("longitude", "6.87"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "elevation": [1035.0] })))
            .mount(&server)
            .await;

        let meters = client(&server).elevation(Coordinate::new(45.9, 6.87)).await;
        assert_eq!(meters, Some(1035.0));
    }

    #[tokio::test]
    async fn test_empty_elevation_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/elevation"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "elevation": [] })))
            .mount(&server)
            .await;

        assert_eq!(client(&server).elevation(Coordinate::new(0.0, 0.0)).await, None);
    }

    #[tokio::test]
    async fn test_failure_degrades_to_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/elevation"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = client(&server);
        let at = Coordinate::new(0.0, 0.0);
        assert!(matches!(
            client.try_elevation(at).await,
            Err(SkyAtlasError::Api { status: Some(400), .. })
        ));
        assert_eq!(client.elevation(at).await, None);
    }
}
