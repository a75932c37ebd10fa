//! Full lookup for one selected point
//!
//! Forecasts, climate, elevation, place name and current conditions are
//! independent, so they are fetched concurrently. The forecast tiers inside
//! the resolver still run one after another. Daily, hourly and UV lookups
//! share one [`PointForecast`], so each upstream endpoint is hit at most once
//! per report.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::climate::{ClimateClassification, RasterGrid, classify};
use crate::config::{AppConfig, DefaultsConfig};
use crate::elevation::ElevationClient;
use crate::forecast::ForecastResolver;
use crate::http::retrying_client;
use crate::location_resolver::LocationResolver;
use crate::models::{
    Coordinate, CurrentConditions, DailyForecastEntry, HourlyForecastEntry, ResolvedForecast,
};
use crate::session::{SelectionSession, SessionRegistry};
use crate::weather::{OpenWeatherClient, PointForecast};
use crate::{Result, SkyAtlasError};

/// Everything a request handler needs, cheap to clone
#[derive(Clone)]
pub struct AppServices {
    pub weather: Arc<OpenWeatherClient>,
    pub forecasts: Arc<ForecastResolver<Arc<OpenWeatherClient>>>,
    pub locations: Arc<LocationResolver>,
    pub elevation: Arc<ElevationClient>,
    pub climate: Option<Arc<RasterGrid>>,
    pub sessions: Arc<SessionRegistry>,
    pub defaults: DefaultsConfig,
}

impl AppServices {
    /// Wire up the HTTP clients. `climate` is the raster loaded at startup.
    pub fn from_config(config: &AppConfig, climate: Option<Arc<RasterGrid>>) -> Result<Self> {
        let weather = Arc::new(OpenWeatherClient::new(&config.weather)?);
        let auxiliary = retrying_client(config.weather.timeout(), config.weather.max_retries)?;

        Ok(Self {
            forecasts: Arc::new(ForecastResolver::new(Arc::clone(&weather))),
            weather,
            locations: Arc::new(LocationResolver::new(auxiliary.clone(), &config.weather)),
            elevation: Arc::new(ElevationClient::new(auxiliary, &config.elevation)),
            climate,
            sessions: Arc::new(SessionRegistry::new()),
            defaults: config.defaults.clone(),
        })
    }

    pub fn classify(&self, coordinate: Coordinate) -> ClimateClassification {
        classify(coordinate, self.climate.as_deref())
    }
}

/// A forecast section of the report
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForecastPanel<T> {
    Available(ResolvedForecast<T>),
    Unavailable { message: String },
}

impl<T> From<Result<ResolvedForecast<T>>> for ForecastPanel<T> {
    fn from(result: Result<ResolvedForecast<T>>) -> Self {
        match result {
            Ok(forecast) => ForecastPanel::Available(forecast),
            Err(e) => ForecastPanel::Unavailable {
                message: e.to_string(),
            },
        }
    }
}

/// Current conditions plus the labels the front end shows verbatim
#[derive(Debug, Clone, Serialize)]
pub struct CurrentView {
    #[serde(flatten)]
    pub conditions: CurrentConditions,
    pub temperature_label: String,
    pub uv_label: String,
}

impl From<CurrentConditions> for CurrentView {
    fn from(conditions: CurrentConditions) -> Self {
        Self {
            temperature_label: conditions.format_temperature(),
            uv_label: conditions.format_uv_index(),
            conditions,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LocationReport {
    pub coordinate: Coordinate,
    pub generation: u64,
    pub place: String,
    pub elevation: Option<f64>,
    pub climate: ClimateClassification,
    pub current: Option<CurrentView>,
    pub daily: ForecastPanel<DailyForecastEntry>,
    pub hourly: ForecastPanel<HourlyForecastEntry>,
}

/// Select `coordinate` in `session` and gather everything shown for it.
///
/// Fails with [`SkyAtlasError::Superseded`] when the same session made another
/// selection before the lookups finished.
#[instrument(skip(services, session), fields(lat = coordinate.lat, lon = coordinate.lon))]
pub async fn build_report(
    services: &AppServices,
    session: &SelectionSession,
    coordinate: Coordinate,
) -> Result<LocationReport> {
    let selection = session.select(coordinate);
    let point = ForecastResolver::new(PointForecast::new(
        Arc::clone(&services.weather),
        coordinate,
    ));

    let (daily, hourly, place, elevation, current, uv_index) = tokio::join!(
        point.forecast_days(coordinate, services.defaults.forecast_days),
        point.hourly_24(coordinate),
        services.locations.place_name(coordinate),
        services.elevation.elevation(coordinate),
        services.weather.current_conditions(coordinate),
        point.source().uv_index(),
    );

    if !session.is_current(&selection) {
        info!(
            "Discarding report for generation {}; now at {}",
            selection.generation,
            session.generation()
        );
        return Err(SkyAtlasError::Superseded);
    }

    let current = current
        .inspect_err(|e| warn!("Current conditions unavailable: {}", e))
        .ok()
        .map(|mut conditions| {
            conditions.uv_index = uv_index;
            CurrentView::from(conditions)
        });

    Ok(LocationReport {
        coordinate,
        generation: selection.generation,
        place,
        elevation,
        climate: services.classify(coordinate),
        current,
        daily: daily.into(),
        hourly: hourly.into(),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub fn config_for(server: &MockServer) -> AppConfig {
        let mut config = AppConfig::default();
        config.weather.api_key = Some("test-key".to_string());
        config.weather.base_url = server.uri();
        config.weather.max_retries = 0;
        config.elevation.base_url = server.uri();
        config.defaults.forecast_days = 3;
        config
    }

    pub fn services_for(server: &MockServer, climate: Option<Arc<RasterGrid>>) -> AppServices {
        AppServices::from_config(&config_for(server), climate).unwrap()
    }

    /// Mount a healthy upstream for every endpoint except elevation
    pub async fn mount_weather(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/data/3.0/onecall"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "current": { "uvi": 5.2 },
                "daily": [
                    {
                        "dt": 1_700_000_000,
                        "temp": { "min": 8.0, "max": 15.0 },
                        "weather": [{ "icon": "01d", "description": "clear sky" }]
                    },
                    {
                        "dt": 1_700_086_400,
                        "temp": { "min": 7.0, "max": 12.0 },
                        "weather": [{ "icon": "10d", "description": "light rain" }]
                    }
                ],
                "hourly": [
                    {
                        "dt": 1_700_000_000,
                        "temp": 11.5,
                        "weather": [{ "icon": "01d", "description": "clear sky" }]
                    }
                ]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "dt": 1_700_000_000,
                "main": { "temp": 12.0, "feels_like": 11.1, "humidity": 70, "pressure": 1018 },
                "wind": { "speed": 2.5 },
                "weather": [{ "icon": "01d", "description": "clear sky" }]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/geo/1.0/reverse"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                { "name": "Annecy", "lat": 45.9, "lon": 6.12, "country": "FR" }
            ])))
            .mount(server)
            .await;
    }

    pub fn elevation_response(meters: f64) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({ "elevation": [meters] }))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::climate::GridGeometry;
    use crate::models::ForecastTier;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alpine_grid() -> Arc<RasterGrid> {
        // one cell per 90 degrees; Europe lands in the north-east quadrant
        let grid = RasterGrid::new(GridGeometry::global(4, 2), vec![1, 2, 15, 4, 5, 6, 7, 8]);
        Arc::new(grid.unwrap())
    }

    #[tokio::test]
    async fn test_report_collects_every_section() {
        let server = MockServer::start().await;
        mount_weather(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/elevation"))
            .respond_with(elevation_response(448.0))
            .mount(&server)
            .await;

        let services = services_for(&server, Some(alpine_grid()));
        let session = SelectionSession::new();
        let report = build_report(&services, &session, Coordinate::new(45.9, 6.12))
            .await
            .unwrap();

        assert_eq!(report.place, "Annecy, FR");
        assert_eq!(report.elevation, Some(448.0));
        assert_eq!(report.climate.code, Some(15));
        assert_eq!(report.generation, 1);

        let current = report.current.unwrap();
        assert_eq!(current.conditions.uv_index, Some(5.2));
        assert_eq!(current.temperature_label, "12.0°C");
        assert_eq!(current.uv_label, "5.2");

        match report.daily {
            ForecastPanel::Available(forecast) => {
                assert_eq!(forecast.tier, ForecastTier::OneCall3);
                assert_eq!(forecast.entries.len(), 2);
            }
            ForecastPanel::Unavailable { message } => panic!("unexpected: {message}"),
        }
        assert!(matches!(report.hourly, ForecastPanel::Available(_)));
        assert_eq!(session.last(), Some(Coordinate::new(45.9, 6.12)));

        let one_call_requests = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|request| request.url.path() == "/data/3.0/onecall")
            .count();
        assert_eq!(one_call_requests, 1);
    }

    #[tokio::test]
    async fn test_report_degrades_when_upstream_is_down() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let services = services_for(&server, None);
        let session = SelectionSession::new();
        let report = build_report(&services, &session, Coordinate::new(0.0, -150.0))
            .await
            .unwrap();

        assert_eq!(report.place, "Unknown");
        assert_eq!(report.elevation, None);
        assert!(report.current.is_none());
        assert_eq!(report.climate, ClimateClassification::unknown());
        match report.daily {
            ForecastPanel::Unavailable { message } => {
                assert_eq!(message, "no forecast data available");
            }
            ForecastPanel::Available(_) => panic!("forecast should be unavailable"),
        }
        assert!(matches!(report.hourly, ForecastPanel::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_newer_selection_supersedes_report() {
        let server = MockServer::start().await;
        mount_weather(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/elevation"))
            .respond_with(elevation_response(448.0).set_delay(Duration::from_millis(400)))
            .mount(&server)
            .await;

        let services = services_for(&server, None);
        let session = services.sessions.session("tab-1");
        let background = services.clone();
        let background_session = Arc::clone(&session);
        let pending = tokio::spawn(async move {
            build_report(&background, &background_session, Coordinate::new(45.9, 6.12)).await
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        session.select(Coordinate::new(48.8, 2.35));

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(SkyAtlasError::Superseded)));
        assert_eq!(session.last(), Some(Coordinate::new(48.8, 2.35)));
    }

    #[tokio::test]
    async fn test_concurrent_sessions_do_not_supersede_each_other() {
        let server = MockServer::start().await;
        mount_weather(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/elevation"))
            .respond_with(elevation_response(448.0).set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;

        let services = services_for(&server, None);
        let first = services.sessions.session("client-a");
        let second = services.sessions.session("client-b");

        let (annecy, paris) = tokio::join!(
            build_report(&services, &first, Coordinate::new(45.9, 6.12)),
            build_report(&services, &second, Coordinate::new(48.8, 2.35)),
        );

        let annecy = annecy.unwrap();
        let paris = paris.unwrap();
        assert_eq!(annecy.coordinate, Coordinate::new(45.9, 6.12));
        assert_eq!(paris.coordinate, Coordinate::new(48.8, 2.35));
        assert_eq!(annecy.generation, 1);
        assert_eq!(paris.generation, 1);
        assert_eq!(first.last(), Some(Coordinate::new(45.9, 6.12)));
        assert_eq!(second.last(), Some(Coordinate::new(48.8, 2.35)));
    }

    #[test]
    fn test_current_view_labels() {
        let conditions = CurrentConditions {
            dt: 1_700_000_000,
            temp: 3.04,
            feels_like: 0.5,
            humidity: 80,
            pressure: 1002.0,
            wind_speed: 6.1,
            icon: "13d".to_string(),
            description: "snow".to_string(),
            uv_index: None,
        };
        let value = serde_json::to_value(CurrentView::from(conditions)).unwrap();
        assert_eq!(value["temp"], 3.04);
        assert_eq!(value["temperature_label"], "3.0°C");
        assert_eq!(value["uv_label"], "–");
    }

    #[test]
    fn test_panel_serialization() {
        let panel: ForecastPanel<HourlyForecastEntry> =
            Err(SkyAtlasError::ForecastUnavailable { last_error: None }).into();
        let value = serde_json::to_value(&panel).unwrap();
        assert_eq!(value["status"], "unavailable");
        assert_eq!(value["message"], "no forecast data available");

        let panel: ForecastPanel<HourlyForecastEntry> = Ok(ResolvedForecast {
            tier: ForecastTier::ThreeHourly,
            entries: Vec::new(),
        })
        .into();
        let value = serde_json::to_value(&panel).unwrap();
        assert_eq!(value["status"], "available");
        assert_eq!(value["tier"], "three-hourly");
    }
}
