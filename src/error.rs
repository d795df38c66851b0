//! Error types and handling for `GeoWeather`

use thiserror::Error;

/// Main error type for the `GeoWeather` application
#[derive(Error, Debug)]
pub enum GeoWeatherError {
    /// A resolution strategy (or the whole chain) produced no coordinate
    #[error("Location unavailable: {message}")]
    LocationUnavailable { message: String },

    /// Non-2xx, transport failure or malformed body from an external service
    #[error("Provider error{}: {message}", status_suffix(.status))]
    Provider {
        status: Option<u16>,
        body: Option<String>,
        message: String,
    },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Input validation errors
    #[error("Invalid input: {message}")]
    Validation { message: String },

    /// Cache operation errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    /// I/O operation errors
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl GeoWeatherError {
    /// Create a new location-unavailable error
    pub fn location_unavailable<S: Into<String>>(message: S) -> Self {
        Self::LocationUnavailable {
            message: message.into(),
        }
    }

    /// Create a provider error for a transport or parsing failure (no HTTP status)
    pub fn provider<S: Into<String>>(message: S) -> Self {
        Self::Provider {
            status: None,
            body: None,
            message: message.into(),
        }
    }

    /// Create a provider error for a non-2xx HTTP response
    pub fn provider_status<S: Into<String>>(status: u16, body: String, message: S) -> Self {
        Self::Provider {
            status: Some(status),
            body: Some(body),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new cache error
    pub fn cache<S: Into<String>>(message: S) -> Self {
        Self::Cache {
            message: message.into(),
        }
    }

    /// HTTP status of a provider failure, if one was received
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => *status,
            _ => None,
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::LocationUnavailable { message } => format!(
                "Could not determine location automatically ({message}). Enter coordinates manually with --lat and --lon."
            ),
            Self::Provider {
                status: Some(status),
                body,
                ..
            } => {
                let body = body.as_deref().map(str::trim).unwrap_or_default();
                if body.is_empty() {
                    format!("Could not fetch weather: provider returned HTTP {status}.")
                } else {
                    format!("Could not fetch weather: provider returned HTTP {status}: {body}")
                }
            }
            Self::Provider { message, .. } => format!("Could not fetch weather: {message}"),
            Self::Configuration { message } => message.clone(),
            Self::Validation { message } => format!("Invalid input: {message}"),
            Self::Cache { .. } => {
                "Local session storage failed. You may need to clear your cache directory."
                    .to_string()
            }
            Self::Io { .. } => "File operation failed. Please check file permissions.".to_string(),
        }
    }
}

impl From<reqwest::Error> for GeoWeatherError {
    fn from(err: reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else if err.is_connect() {
            format!("connection failed: {err}")
        } else {
            err.to_string()
        };
        Self::Provider {
            status: err.status().map(|s| s.as_u16()),
            body: None,
            message,
        }
    }
}
