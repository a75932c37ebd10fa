//! Error types and handling for `SkyAtlas`

use thiserror::Error;

/// Main error type for the `SkyAtlas` service
#[derive(Error, Debug)]
pub enum SkyAtlasError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Upstream API communication errors (network, non-success status)
    #[error("API error: {message}")]
    Api {
        status: Option<u16>,
        message: String,
    },

    /// Upstream payload could not be decoded
    #[error("Parse error: {message}")]
    Parse { message: String },

    /// Climate raster could not be read or decoded
    #[error("Raster error: {message}")]
    Raster { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Every forecast tier failed or came back empty
    #[error("no forecast data available")]
    ForecastUnavailable { last_error: Option<String> },

    /// A newer location selection replaced the one this lookup was started for
    #[error("selection superseded by a newer request")]
    Superseded,

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl SkyAtlasError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new API error without a status code
    pub fn api<S: Into<String>>(message: S) -> Self {
        Self::Api {
            status: None,
            message: message.into(),
        }
    }

    /// Create a new API error for a non-success HTTP status
    pub fn api_status<S: Into<String>>(status: u16, message: S) -> Self {
        Self::Api {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Create a new parse error
    pub fn parse<S: Into<String>>(message: S) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }

    /// Create a new raster error
    pub fn raster<S: Into<String>>(message: S) -> Self {
        Self::Raster {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            SkyAtlasError::Config { .. } => {
                "Configuration error. Please check your config file and API keys.".to_string()
            }
            SkyAtlasError::Api { .. } | SkyAtlasError::Parse { .. } => {
                "Unable to reach the weather service. Please try again later.".to_string()
            }
            SkyAtlasError::Raster { .. } => "No climate data available.".to_string(),
            SkyAtlasError::Validation { message } => format!("Invalid input: {message}"),
            SkyAtlasError::ForecastUnavailable { .. } => "Forecast unavailable.".to_string(),
            SkyAtlasError::Superseded => {
                "A newer location was selected; this result was discarded.".to_string()
            }
            SkyAtlasError::Io { .. } => {
                "File operation failed. Please check file permissions.".to_string()
            }
        }
    }
}

// The request URL carries the API key, so it never reaches the message.
impl From<reqwest::Error> for SkyAtlasError {
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_decode() {
            return Self::parse(err.to_string());
        }
        Self::Api {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<reqwest_middleware::Error> for SkyAtlasError {
    fn from(err: reqwest_middleware::Error) -> Self {
        match err {
            reqwest_middleware::Error::Reqwest(e) => e.into(),
            reqwest_middleware::Error::Middleware(e) => {
                Self::api(crate::http::redact(&format!("{e:#}")))
            }
        }
    }
}

impl From<tiff::TiffError> for SkyAtlasError {
    fn from(err: tiff::TiffError) -> Self {
        Self::raster(err.to_string())
    }
}
