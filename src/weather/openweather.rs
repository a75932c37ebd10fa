//! OpenWeather API client
//!
//! Serves every forecast tier (One Call 3.0, One Call 2.5, 5 day / 3 hour)
//! plus current conditions. Payloads are normalized into the shared forecast
//! models here so the resolver only ever sees entry lists.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

use crate::config::WeatherConfig;
use crate::forecast::{ForecastSource, OneCallVersion};
use crate::http::{plain_client, redact};
use crate::models::{
    Condition, Coordinate, CurrentConditions, DailyForecastEntry, HourlyForecastEntry,
};
use crate::{Result, SkyAtlasError};

/// Sections dropped from a One Call request that only needs daily data
const EXCLUDE_FOR_DAILY: &str = "current,minutely,hourly,alerts";
/// Sections dropped from a One Call request that only needs hourly data
const EXCLUDE_FOR_HOURLY: &str = "current,minutely,daily,alerts";
/// Sections dropped when only the current UV index is wanted
const EXCLUDE_FOR_CURRENT: &str = "minutely,hourly,daily,alerts";
/// Sections dropped when one response feeds daily, hourly and UV together
const EXCLUDE_FOR_POINT: &str = "minutely,alerts";

/// One Call response; every section is optional
#[derive(Debug, Clone, Deserialize)]
pub struct OneCallResponse {
    #[serde(default)]
    pub current: Option<OneCallCurrent>,
    #[serde(default)]
    pub daily: Option<Vec<DailyForecastEntry>>,
    #[serde(default)]
    pub hourly: Option<Vec<OneCallHour>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OneCallCurrent {
    #[serde(default)]
    pub uvi: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OneCallHour {
    pub dt: i64,
    pub temp: f64,
    #[serde(default)]
    pub weather: Vec<Condition>,
}

/// 5 day / 3 hour forecast response
#[derive(Debug, Deserialize)]
pub struct ThreeHourlyResponse {
    #[serde(default)]
    pub list: Vec<ThreeHourlySample>,
}

#[derive(Debug, Deserialize)]
pub struct ThreeHourlySample {
    pub dt: i64,
    pub main: SampleMain,
    #[serde(default)]
    pub weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
pub struct SampleMain {
    pub temp: f64,
}

/// Current weather response
#[derive(Debug, Deserialize)]
pub struct CurrentWeatherResponse {
    pub dt: i64,
    pub main: CurrentMain,
    #[serde(default)]
    pub wind: Option<CurrentWind>,
    #[serde(default)]
    pub weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
pub struct CurrentMain {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: u8,
    pub pressure: f64,
}

#[derive(Debug, Deserialize)]
pub struct CurrentWind {
    pub speed: f64,
}

fn hourly_entry(dt: i64, temp: f64, weather: Vec<Condition>) -> HourlyForecastEntry {
    let condition = weather.into_iter().next().unwrap_or_default();
    HourlyForecastEntry {
        dt,
        temp,
        icon: condition.icon,
        description: condition.description,
    }
}

impl From<OneCallHour> for HourlyForecastEntry {
    fn from(hour: OneCallHour) -> Self {
        hourly_entry(hour.dt, hour.temp, hour.weather)
    }
}

impl From<ThreeHourlySample> for HourlyForecastEntry {
    fn from(sample: ThreeHourlySample) -> Self {
        hourly_entry(sample.dt, sample.main.temp, sample.weather)
    }
}

impl From<CurrentWeatherResponse> for CurrentConditions {
    fn from(response: CurrentWeatherResponse) -> Self {
        let condition = response.weather.into_iter().next().unwrap_or_default();
        Self {
            dt: response.dt,
            temp: response.main.temp,
            feels_like: response.main.feels_like,
            humidity: response.main.humidity,
            pressure: response.main.pressure,
            wind_speed: response.wind.map_or(0.0, |w| w.speed),
            icon: condition.icon,
            description: condition.description,
            uv_index: None,
        }
    }
}

/// OpenWeather HTTP client
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl OpenWeatherClient {
    /// Create a client from configuration
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        if config.api_key.is_none() {
            warn!("No OpenWeather API key configured; forecast and geocoding requests will fail");
        }
        Ok(Self {
            client: plain_client(config.timeout())?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Create a client against an explicit base URL
    pub fn with_base_url(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let config = WeatherConfig {
            api_key,
            base_url: base_url.to_string(),
            ..WeatherConfig::default()
        };
        Self::new(&config)
    }

    fn url(&self, path: &str, query: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SkyAtlasError::config("OpenWeather API key is not configured"))?;
        Ok(format!(
            "{}/{}?{}&appid={}",
            self.base_url,
            path,
            query,
            urlencoding::encode(api_key)
        ))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let start = Instant::now();
        debug!("OpenWeather request: {}", redact(url));

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SkyAtlasError::api_status(
                status.as_u16(),
                format!("OpenWeather returned {status}: {body}"),
            ));
        }

        let payload = response
            .json::<T>()
            .await
            .map_err(|e| SkyAtlasError::parse(format!("Invalid OpenWeather payload: {e}")))?;

        debug!(
            "OpenWeather response for {} in {:.3}s",
            redact(url),
            start.elapsed().as_secs_f64()
        );
        Ok(payload)
    }

    async fn one_call(
        &self,
        version: OneCallVersion,
        coordinate: Coordinate,
        exclude: &str,
    ) -> Result<OneCallResponse> {
        let url = self.url(
            version.path(),
            &format!(
                "lat={}&lon={}&units=metric&exclude={}",
                coordinate.lat, coordinate.lon, exclude
            ),
        )?;
        self.get_json(&url).await
    }

    /// Current conditions from the weather endpoint alone, without UV index
    pub async fn current_conditions(&self, coordinate: Coordinate) -> Result<CurrentConditions> {
        let url = self.url(
            "data/2.5/weather",
            &format!("lat={}&lon={}&units=metric", coordinate.lat, coordinate.lon),
        )?;
        let response: CurrentWeatherResponse = self.get_json(&url).await?;
        Ok(CurrentConditions::from(response))
    }

    /// Current conditions with the UV index attached when available
    #[instrument(skip(self), fields(lat = coordinate.lat, lon = coordinate.lon))]
    pub async fn current(&self, coordinate: Coordinate) -> Result<CurrentConditions> {
        let mut current = self.current_conditions(coordinate).await?;
        current.uv_index = self.uv_index(coordinate).await;

        info!(
            "Current conditions: {} {}",
            current.format_temperature(),
            current.description
        );
        Ok(current)
    }

    /// UV index from One Call 3.0, then 2.5; `None` when neither answers
    pub async fn uv_index(&self, coordinate: Coordinate) -> Option<f64> {
        for version in [OneCallVersion::V3, OneCallVersion::V25] {
            match self.one_call(version, coordinate, EXCLUDE_FOR_CURRENT).await {
                Ok(response) => {
                    if let Some(uvi) = response.current.and_then(|c| c.uvi) {
                        return Some(uvi);
                    }
                }
                Err(e) => debug!("UV index lookup via {:?} failed: {}", version, e),
            }
        }
        None
    }
}

#[async_trait]
impl ForecastSource for OpenWeatherClient {
    async fn daily(
        &self,
        version: OneCallVersion,
        coordinate: Coordinate,
    ) -> Result<Vec<DailyForecastEntry>> {
        let response = self.one_call(version, coordinate, EXCLUDE_FOR_DAILY).await?;
        Ok(response.daily.unwrap_or_default())
    }

    async fn hourly(
        &self,
        version: OneCallVersion,
        coordinate: Coordinate,
    ) -> Result<Vec<HourlyForecastEntry>> {
        let response = self.one_call(version, coordinate, EXCLUDE_FOR_HOURLY).await?;
        Ok(response
            .hourly
            .unwrap_or_default()
            .into_iter()
            .map(HourlyForecastEntry::from)
            .collect())
    }

    async fn three_hourly(&self, coordinate: Coordinate) -> Result<Vec<HourlyForecastEntry>> {
        let url = self.url(
            "data/2.5/forecast",
            &format!("lat={}&lon={}&units=metric", coordinate.lat, coordinate.lon),
        )?;
        let response: ThreeHourlyResponse = self.get_json(&url).await?;
        Ok(response
            .list
            .into_iter()
            .map(HourlyForecastEntry::from)
            .collect())
    }
}

/// Forecast data for one point where every endpoint is fetched at most once.
///
/// Daily, hourly and UV lookups for the same point share a single One Call
/// response per version, and both fallbacks share one 5 day / 3 hour response.
/// Requests for any other coordinate go straight to the client.
pub struct PointForecast {
    client: Arc<OpenWeatherClient>,
    coordinate: Coordinate,
    one_call_v3: OnceCell<Result<Arc<OneCallResponse>>>,
    one_call_v25: OnceCell<Result<Arc<OneCallResponse>>>,
    three_hourly: OnceCell<Result<Arc<Vec<HourlyForecastEntry>>>>,
}

impl PointForecast {
    pub fn new(client: Arc<OpenWeatherClient>, coordinate: Coordinate) -> Self {
        Self {
            client,
            coordinate,
            one_call_v3: OnceCell::new(),
            one_call_v25: OnceCell::new(),
            three_hourly: OnceCell::new(),
        }
    }

    async fn one_call(&self, version: OneCallVersion) -> Result<Arc<OneCallResponse>> {
        let cell = match version {
            OneCallVersion::V3 => &self.one_call_v3,
            OneCallVersion::V25 => &self.one_call_v25,
        };
        cell.get_or_init(|| async move {
            self.client
                .one_call(version, self.coordinate, EXCLUDE_FOR_POINT)
                .await
                .map(Arc::new)
        })
        .await
        .as_ref()
        .map(Arc::clone)
        .map_err(replay)
    }

    /// UV index from One Call 3.0, then 2.5; `None` when neither answers
    pub async fn uv_index(&self) -> Option<f64> {
        for version in [OneCallVersion::V3, OneCallVersion::V25] {
            match self.one_call(version).await {
                Ok(response) => {
                    if let Some(uvi) = response.current.as_ref().and_then(|c| c.uvi) {
                        return Some(uvi);
                    }
                }
                Err(e) => debug!("UV index lookup via {:?} failed: {}", version, e),
            }
        }
        None
    }
}

/// Copy of a memoized error for another caller
fn replay(err: &SkyAtlasError) -> SkyAtlasError {
    match err {
        SkyAtlasError::Api { status, message } => SkyAtlasError::Api {
            status: *status,
            message: message.clone(),
        },
        SkyAtlasError::Parse { message } => SkyAtlasError::parse(message.clone()),
        SkyAtlasError::Config { message } => SkyAtlasError::config(message.clone()),
        other => SkyAtlasError::api(other.to_string()),
    }
}

#[async_trait]
impl ForecastSource for PointForecast {
    async fn daily(
        &self,
        version: OneCallVersion,
        coordinate: Coordinate,
    ) -> Result<Vec<DailyForecastEntry>> {
        if coordinate != self.coordinate {
            return self.client.daily(version, coordinate).await;
        }
        Ok(self.one_call(version).await?.daily.clone().unwrap_or_default())
    }

    async fn hourly(
        &self,
        version: OneCallVersion,
        coordinate: Coordinate,
    ) -> Result<Vec<HourlyForecastEntry>> {
        if coordinate != self.coordinate {
            return self.client.hourly(version, coordinate).await;
        }
        let response = self.one_call(version).await?;
        Ok(response
            .hourly
            .iter()
            .flatten()
            .cloned()
            .map(HourlyForecastEntry::from)
            .collect())
    }

    async fn three_hourly(&self, coordinate: Coordinate) -> Result<Vec<HourlyForecastEntry>> {
        if coordinate != self.coordinate {
            return self.client.three_hourly(coordinate).await;
        }
        self.three_hourly
            .get_or_init(|| async move {
                self.client.three_hourly(self.coordinate).await.map(Arc::new)
            })
            .await
            .as_ref()
            .map(|samples| Vec::clone(samples))
            .map_err(replay)
    }
}
