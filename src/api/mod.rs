//! JSON API consumed by the map front end

use axum::{
    Router,
    extract::{Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

use crate::climate::ClimateClassification;
use crate::models::{
    Coordinate, CurrentConditions, DailyForecastEntry, HourlyForecastEntry, Place,
    ResolvedForecast,
};
use crate::report::{AppServices, LocationReport, build_report};
use crate::session::{SESSION_HEADER, SelectionSession, is_valid_session_id};
use crate::SkyAtlasError;

/// Error rendered as `{ "error": message }`
#[derive(Debug)]
pub struct ApiError(pub SkyAtlasError);

impl From<SkyAtlasError> for ApiError {
    fn from(err: SkyAtlasError) -> Self {
        Self(err)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self(SkyAtlasError::validation(rejection.body_text()))
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SkyAtlasError::Validation { .. } => StatusCode::BAD_REQUEST,
            SkyAtlasError::ForecastUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            SkyAtlasError::Superseded => StatusCode::CONFLICT,
            SkyAtlasError::Api { .. } | SkyAtlasError::Parse { .. } => StatusCode::BAD_GATEWAY,
            SkyAtlasError::Config { .. } | SkyAtlasError::Raster { .. } | SkyAtlasError::Io { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let message = match &self.0 {
            SkyAtlasError::Validation { .. }
            | SkyAtlasError::ForecastUnavailable { .. }
            | SkyAtlasError::Superseded => self.0.to_string(),
            other => {
                error!("Request failed: {}", other);
                other.user_message()
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct CoordinateQuery {
    pub lat: f64,
    pub lon: f64,
}

impl CoordinateQuery {
    fn coordinate(&self) -> Result<Coordinate, ApiError> {
        Ok(Coordinate::validated(self.lat, self.lon)?)
    }
}

/// Client session named by the session header; `None` when absent
fn session_id(headers: &HeaderMap) -> Result<Option<&str>, ApiError> {
    let Some(value) = headers.get(SESSION_HEADER) else {
        return Ok(None);
    };
    let id = value
        .to_str()
        .ok()
        .filter(|id| is_valid_session_id(id))
        .ok_or_else(|| SkyAtlasError::validation(format!("invalid {SESSION_HEADER} header")))?;
    Ok(Some(id))
}

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    pub lat: f64,
    pub lon: f64,
    pub count: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct GeocodeQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ElevationBody {
    pub elevation: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PlaceNameBody {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct SessionBody {
    pub last: Option<Coordinate>,
    pub generation: u64,
}

#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub climate_loaded: bool,
}

pub fn router() -> Router<AppServices> {
    Router::new()
        .route("/forecast/daily", get(get_daily_forecast))
        .route("/forecast/hourly", get(get_hourly_forecast))
        .route("/climate", get(get_climate))
        .route("/current", get(get_current))
        .route("/elevation", get(get_elevation))
        .route("/geocode", get(get_geocode))
        .route("/reverse", get(get_reverse))
        .route("/report", get(get_report))
        .route("/session", get(get_session))
        .route("/health", get(get_health))
}

async fn get_daily_forecast(
    State(services): State<AppServices>,
    query: Result<Query<DailyQuery>, QueryRejection>,
) -> ApiResult<ResolvedForecast<DailyForecastEntry>> {
    let Query(query) = query?;
    let coordinate = Coordinate::validated(query.lat, query.lon)?;
    let count = query.count.unwrap_or(services.defaults.forecast_days);
    Ok(Json(services.forecasts.forecast_days(coordinate, count).await?))
}

async fn get_hourly_forecast(
    State(services): State<AppServices>,
    query: Result<Query<CoordinateQuery>, QueryRejection>,
) -> ApiResult<ResolvedForecast<HourlyForecastEntry>> {
    let coordinate = query?.coordinate()?;
    Ok(Json(services.forecasts.hourly_24(coordinate).await?))
}

async fn get_climate(
    State(services): State<AppServices>,
    query: Result<Query<CoordinateQuery>, QueryRejection>,
) -> ApiResult<ClimateClassification> {
    let coordinate = query?.coordinate()?;
    Ok(Json(services.classify(coordinate)))
}

async fn get_current(
    State(services): State<AppServices>,
    query: Result<Query<CoordinateQuery>, QueryRejection>,
) -> ApiResult<CurrentConditions> {
    let coordinate = query?.coordinate()?;
    Ok(Json(services.weather.current(coordinate).await?))
}

async fn get_elevation(
    State(services): State<AppServices>,
    query: Result<Query<CoordinateQuery>, QueryRejection>,
) -> ApiResult<ElevationBody> {
    let coordinate = query?.coordinate()?;
    let elevation = services.elevation.elevation(coordinate).await;
    Ok(Json(ElevationBody { elevation }))
}

async fn get_geocode(
    State(services): State<AppServices>,
    query: Result<Query<GeocodeQuery>, QueryRejection>,
) -> ApiResult<Vec<Place>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(services.defaults.geocode_limit);
    Ok(Json(services.locations.search(&query.q, limit).await?))
}

async fn get_reverse(
    State(services): State<AppServices>,
    query: Result<Query<CoordinateQuery>, QueryRejection>,
) -> ApiResult<PlaceNameBody> {
    let coordinate = query?.coordinate()?;
    let name = services.locations.place_name(coordinate).await;
    Ok(Json(PlaceNameBody { name }))
}

/// Requests without a session header get a one-off session that nothing
/// else can supersede.
async fn get_report(
    State(services): State<AppServices>,
    headers: HeaderMap,
    query: Result<Query<CoordinateQuery>, QueryRejection>,
) -> ApiResult<LocationReport> {
    let coordinate = query?.coordinate()?;
    let session = match session_id(&headers)? {
        Some(id) => services.sessions.session(id),
        None => Arc::new(SelectionSession::new()),
    };
    Ok(Json(build_report(&services, &session, coordinate).await?))
}

async fn get_session(
    State(services): State<AppServices>,
    headers: HeaderMap,
) -> ApiResult<SessionBody> {
    let session = session_id(&headers)?.and_then(|id| services.sessions.get(id));
    Ok(Json(SessionBody {
        last: session.as_ref().and_then(|s| s.last()),
        generation: session.map_or(0, |s| s.generation()),
    }))
}

async fn get_health(State(services): State<AppServices>) -> Json<HealthBody> {
    Json(HealthBody {
        status: "ok",
        climate_loaded: services.climate.is_some(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::test_support::{elevation_response, mount_weather, services_for};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn get_as(app: Router, uri: &str, session: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .uri(uri)
            .header(SESSION_HEADER, session)
            .body(Body::empty())
            .unwrap();
        send(app, request).await
    }

    fn app(services: AppServices) -> Router {
        router().with_state(services)
    }

    #[tokio::test]
    async fn test_health_without_raster() {
        let server = MockServer::start().await;
        let (status, body) = get_json(app(services_for(&server, None)), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["climate_loaded"], false);
    }

    #[tokio::test]
    async fn test_daily_forecast_respects_count() {
        let server = MockServer::start().await;
        mount_weather(&server).await;

        let (status, body) = get_json(
            app(services_for(&server, None)),
            "/forecast/daily?lat=45.9&lon=6.12&count=1",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["tier"], "one-call-3.0");
        assert_eq!(body["entries"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_forecast_is_503() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (status, body) = get_json(
            app(services_for(&server, None)),
            "/forecast/hourly?lat=45.9&lon=6.12",
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "no forecast data available");
    }

    #[tokio::test]
    async fn test_current_upstream_failure_is_502() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (status, body) =
            get_json(app(services_for(&server, None)), "/current?lat=1&lon=2").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_invalid_coordinates_are_400() {
        let server = MockServer::start().await;
        for uri in [
            "/climate?lat=91&lon=0",
            "/climate?lat=0&lon=-180.5",
            "/climate?lat=abc&lon=0",
            "/climate?lat=1",
        ] {
            let (status, body) = get_json(app(services_for(&server, None)), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert!(body["error"].is_string(), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_climate_without_raster_is_unknown() {
        let server = MockServer::start().await;
        let (status, body) =
            get_json(app(services_for(&server, None)), "/climate?lat=10&lon=20").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["code"], Value::Null);
        assert_eq!(body["name"], "Unknown");
    }

    #[tokio::test]
    async fn test_elevation_and_reverse() {
        let server = MockServer::start().await;
        mount_weather(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/elevation"))
            .respond_with(elevation_response(448.0))
            .mount(&server)
            .await;
        let services = services_for(&server, None);

        let (_, body) = get_json(app(services.clone()), "/elevation?lat=45.9&lon=6.12").await;
        assert_eq!(body["elevation"], 448.0);

        let (_, body) = get_json(app(services), "/reverse?lat=45.9&lon=6.12").await;
        assert_eq!(body["name"], "Annecy, FR");
    }

    #[tokio::test]
    async fn test_empty_geocode_query() {
        let server = MockServer::start().await;
        let (status, body) = get_json(app(services_for(&server, None)), "/geocode?q=").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn test_report_updates_session() {
        let server = MockServer::start().await;
        mount_weather(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/elevation"))
            .respond_with(elevation_response(448.0))
            .mount(&server)
            .await;
        let services = services_for(&server, None);

        let (status, body) =
            get_as(app(services.clone()), "/report?lat=45.9&lon=6.12", "tab-1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["place"], "Annecy, FR");
        assert_eq!(body["daily"]["status"], "available");
        assert_eq!(body["current"]["uv_label"], "5.2");

        let (_, body) = get_as(app(services.clone()), "/session", "tab-1").await;
        assert_eq!(body["generation"], 1);
        assert_eq!(body["last"]["lat"], 45.9);

        let (_, body) = get_as(app(services.clone()), "/session", "tab-2").await;
        assert_eq!(body["generation"], 0);
        assert_eq!(body["last"], Value::Null);

        let (_, body) = get_json(app(services), "/session").await;
        assert_eq!(body["generation"], 0);
    }

    #[tokio::test]
    async fn test_reports_for_different_sessions_both_succeed() {
        let server = MockServer::start().await;
        mount_weather(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1/elevation"))
            .respond_with(elevation_response(448.0).set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;
        let services = services_for(&server, None);

        let ((first, _), (second, _), (anonymous, _)) = tokio::join!(
            get_as(app(services.clone()), "/report?lat=45.9&lon=6.12", "client-a"),
            get_as(app(services.clone()), "/report?lat=48.8&lon=2.35", "client-b"),
            get_json(app(services.clone()), "/report?lat=46.2&lon=6.15"),
        );
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);
        assert_eq!(anonymous, StatusCode::OK);
        assert_eq!(services.sessions.len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_session_header_is_400() {
        let server = MockServer::start().await;
        let (status, body) = get_as(
            app(services_for(&server, None)),
            "/report?lat=45.9&lon=6.12",
            "not a valid id",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid input: invalid x-session-id header");
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (SkyAtlasError::validation("bad"), StatusCode::BAD_REQUEST),
            (SkyAtlasError::Superseded, StatusCode::CONFLICT),
            (SkyAtlasError::api("down"), StatusCode::BAD_GATEWAY),
            (SkyAtlasError::config("no key"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError(err).into_response().status(), expected);
        }
    }
}
