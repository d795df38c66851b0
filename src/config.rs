//! Configuration management for `GeoWeather`
//!
//! Handles loading configuration from files, a secrets file, environment variables,
//! and provides validation for all configuration settings.

use crate::GeoWeatherError;
use crate::location_resolver::Strategy;
use crate::models::{Units, validate_pair};
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Environment variable consulted when no API key is configured
pub const API_KEY_ENV_FALLBACK: &str = "OPENWEATHER_API_KEY";

/// Shown in place of the weather when no API key is available
pub const MISSING_API_KEY_MESSAGE: &str = "Weather API key not found. Put it in secrets.toml as weather.api_key, or set GEOWEATHER_WEATHER__API_KEY or OPENWEATHER_API_KEY.";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Weather API configuration
    pub weather: WeatherConfig,
    /// Location provider endpoints
    pub providers: ProvidersConfig,
    /// Resolution strategy order
    pub resolver: ResolverConfig,
    /// Fallback location
    pub defaults: DefaultsConfig,
    /// Cache configuration
    pub cache: CacheConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Weather API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Weather API key (required to fetch weather)
    pub api_key: Option<String>,
    /// Base URL for weather API; requests go to `<base_url>/weather`
    pub base_url: String,
    /// Query parameter carrying the API key
    pub key_param: String,
    /// Unit system requested from the provider
    pub units: Units,
    /// Request timeout in seconds
    pub timeout_seconds: u32,
}

/// IP lookup, geocoding and host geolocation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// IP geolocation base URL; requests go to `<ip_lookup_url>/json`
    pub ip_lookup_url: String,
    /// Geocoding base URL; requests go to `<geocoding_url>/search?<geocoding_query_param>=`
    pub geocoding_url: String,
    /// Query parameter carrying the city name
    pub geocoding_query_param: String,
    /// Request timeout for both services in seconds
    pub timeout_seconds: u32,
    /// Host command printing a geolocation reply as JSON
    pub gps_command: Option<String>,
    /// How long to wait for the geolocation command
    pub gps_timeout_seconds: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Strategies tried in order, first success wins
    pub order: Vec<Strategy>,
}

/// Hardcoded fallback location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Cache configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory location
    pub location: String,
    /// Weather memoization TTL in seconds, 0 disables it
    pub weather_ttl_seconds: u32,
    /// How long a resolved coordinate is remembered per session
    pub session_ttl_hours: u32,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    pub level: String,
    /// Log format (pretty or json)
    pub format: String,
}

// Default value functions
fn default_weather_base_url() -> String {
    "https://api.openweathermap.org/data/2.5".to_string()
}

fn default_key_param() -> String {
    "appid".to_string()
}

fn default_weather_timeout() -> u32 {
    8
}

fn default_ip_lookup_url() -> String {
    "https://ipinfo.io".to_string()
}

fn default_geocoding_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_geocoding_query_param() -> String {
    "q".to_string()
}

fn default_provider_timeout() -> u32 {
    5
}

fn default_gps_timeout() -> u32 {
    10
}

fn default_order() -> Vec<Strategy> {
    Strategy::DEFAULT_ORDER.to_vec()
}

fn default_city() -> String {
    "Polewali,ID".to_string()
}

fn default_cache_location() -> String {
    dirs::cache_dir()
        .map(|dir| dir.join("geoweather"))
        .unwrap_or_else(|| PathBuf::from(".geoweather-cache"))
        .to_string_lossy()
        .into_owned()
}

fn default_weather_ttl() -> u32 {
    300
}

fn default_session_ttl() -> u32 {
    24
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_weather_base_url(),
            key_param: default_key_param(),
            units: Units::default(),
            timeout_seconds: default_weather_timeout(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            ip_lookup_url: default_ip_lookup_url(),
            geocoding_url: default_geocoding_url(),
            geocoding_query_param: default_geocoding_query_param(),
            timeout_seconds: default_provider_timeout(),
            gps_command: None,
            gps_timeout_seconds: default_gps_timeout(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        // Polewali, West Sulawesi
        Self {
            city: default_city(),
            latitude: -3.4324,
            longitude: 119.3435,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            location: default_cache_location(),
            weather_ttl_seconds: default_weather_ttl(),
            session_ttl_hours: default_session_ttl(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        // Load from file if path is provided or use default location
        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        let secrets_file = Self::secrets_path_for(&config_file);
        if secrets_file.exists() {
            builder = builder.add_source(
                File::from(secrets_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Add environment variable overrides with GEOWEATHER_ prefix
        builder = builder.add_source(
            Environment::with_prefix("GEOWEATHER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .with_context(|| format!("Failed to build configuration from {}", config_file.display()))?;

        let mut config: AppConfig = settings
            .try_deserialize()
            .with_context(|| "Failed to deserialize configuration")?;

        config.apply_api_key_fallback(|name| std::env::var(name).ok());

        // Apply defaults for missing values
        config.apply_defaults();

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("geoweather").join("config.toml"))
    }

    /// `secrets.toml` next to the given config file
    #[must_use]
    pub fn secrets_path_for(config_file: &Path) -> PathBuf {
        config_file
            .parent()
            .map_or_else(|| PathBuf::from("secrets.toml"), |dir| dir.join("secrets.toml"))
    }

    /// Fill a missing API key from [`API_KEY_ENV_FALLBACK`]
    pub fn apply_api_key_fallback<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let configured = self
            .weather
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty());
        if !configured {
            self.weather.api_key = lookup(API_KEY_ENV_FALLBACK);
        }
    }

    /// Apply default values to missing configuration fields
    pub fn apply_defaults(&mut self) {
        if self
            .weather
            .api_key
            .as_deref()
            .is_some_and(|key| key.trim().is_empty())
        {
            self.weather.api_key = None;
        }
        if self.weather.base_url.is_empty() {
            self.weather.base_url = default_weather_base_url();
        }
        if self.weather.key_param.is_empty() {
            self.weather.key_param = default_key_param();
        }
        if self.weather.timeout_seconds == 0 {
            self.weather.timeout_seconds = default_weather_timeout();
        }
        if self.providers.ip_lookup_url.is_empty() {
            self.providers.ip_lookup_url = default_ip_lookup_url();
        }
        if self.providers.geocoding_url.is_empty() {
            self.providers.geocoding_url = default_geocoding_url();
        }
        if self.providers.geocoding_query_param.is_empty() {
            self.providers.geocoding_query_param = default_geocoding_query_param();
        }
        if self.providers.timeout_seconds == 0 {
            self.providers.timeout_seconds = default_provider_timeout();
        }
        if self.providers.gps_timeout_seconds == 0 {
            self.providers.gps_timeout_seconds = default_gps_timeout();
        }
        if self
            .providers
            .gps_command
            .as_deref()
            .is_some_and(|cmd| cmd.trim().is_empty())
        {
            self.providers.gps_command = None;
        }
        if self.defaults.city.is_empty() {
            self.defaults.city = default_city();
        }
        if self.cache.location.is_empty() {
            self.cache.location = default_cache_location();
        }
        if self.cache.session_ttl_hours == 0 {
            self.cache.session_ttl_hours = default_session_ttl();
        }
        if self.logging.level.is_empty() {
            self.logging.level = default_log_level();
        }
        if self.logging.format.is_empty() {
            self.logging.format = default_log_format();
        }
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        self.validate_numeric_ranges()?;
        self.validate_string_values()?;
        self.validate_resolver()?;
        Ok(())
    }

    /// The API key, or a configuration error when none is set
    pub fn require_api_key(&self) -> Result<&str, GeoWeatherError> {
        self.weather
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| GeoWeatherError::configuration(MISSING_API_KEY_MESSAGE))
    }

    /// Copy of this configuration safe to print
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.weather.api_key.is_some() {
            copy.weather.api_key = Some("********".to_string());
        }
        copy
    }

    /// Validate numeric configuration ranges
    fn validate_numeric_ranges(&self) -> Result<()> {
        if self.weather.timeout_seconds > 60 {
            return Err(
                GeoWeatherError::configuration("Weather API timeout cannot exceed 60 seconds").into(),
            );
        }

        if self.providers.timeout_seconds > 60 || self.providers.gps_timeout_seconds > 60 {
            return Err(GeoWeatherError::configuration(
                "Location provider timeouts cannot exceed 60 seconds",
            )
            .into());
        }

        if self.cache.weather_ttl_seconds > 3600 {
            return Err(GeoWeatherError::configuration(
                "Weather memoization TTL cannot exceed 3600 seconds",
            )
            .into());
        }

        if self.cache.session_ttl_hours > 720 {
            return Err(GeoWeatherError::configuration(
                "Session TTL cannot exceed 720 hours (30 days)",
            )
            .into());
        }

        validate_pair(self.defaults.latitude, self.defaults.longitude).map_err(|e| {
            GeoWeatherError::configuration(format!("Invalid default location: {e}"))
        })?;

        Ok(())
    }

    /// Validate string configuration values
    fn validate_string_values(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.logging.level.as_str()) {
            return Err(GeoWeatherError::configuration(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_log_levels.join(", ")
            ))
            .into());
        }

        let valid_log_formats = ["pretty", "json"];
        if !valid_log_formats.contains(&self.logging.format.as_str()) {
            return Err(GeoWeatherError::configuration(format!(
                "Invalid log format '{}'. Must be one of: {}",
                self.logging.format,
                valid_log_formats.join(", ")
            ))
            .into());
        }

        for (name, url) in [
            ("Weather API base URL", &self.weather.base_url),
            ("IP lookup URL", &self.providers.ip_lookup_url),
            ("Geocoding URL", &self.providers.geocoding_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(GeoWeatherError::configuration(format!(
                    "{name} must be a valid HTTP or HTTPS URL"
                ))
                .into());
            }
        }

        Ok(())
    }

    fn validate_resolver(&self) -> Result<()> {
        if self.resolver.order.is_empty() {
            return Err(GeoWeatherError::configuration(
                "Resolver order must name at least one strategy",
            )
            .into());
        }

        let mut seen = HashSet::new();
        for strategy in &self.resolver.order {
            if !seen.insert(strategy) {
                return Err(GeoWeatherError::configuration(format!(
                    "Resolver order lists '{strategy}' more than once"
                ))
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.weather.base_url, "https://api.openweathermap.org/data/2.5");
        assert_eq!(config.weather.timeout_seconds, 8);
        assert_eq!(config.weather.units, Units::Metric);
        assert_eq!(config.defaults.city, "Polewali,ID");
        assert_eq!(config.resolver.order, Strategy::DEFAULT_ORDER.to_vec());
        assert!(config.weather.api_key.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_api_key_is_configuration_error() {
        let config = AppConfig::default();
        let err = config.require_api_key().unwrap_err();
        assert!(matches!(err, GeoWeatherError::Configuration { .. }));
        assert!(err.user_message().contains("API key not found"));
    }

    #[test]
    fn test_blank_api_key_counts_as_missing() {
        let mut config = AppConfig::default();
        config.weather.api_key = Some("   ".to_string());
        config.apply_defaults();
        assert!(config.weather.api_key.is_none());
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn test_api_key_env_fallback() {
        let mut config = AppConfig::default();
        config.apply_api_key_fallback(|name| {
            (name == API_KEY_ENV_FALLBACK).then(|| "from-env".to_string())
        });
        assert_eq!(config.require_api_key().unwrap(), "from-env");

        // A configured key wins over the fallback
        let mut config = AppConfig::default();
        config.weather.api_key = Some("from-file".to_string());
        config.apply_api_key_fallback(|_| Some("from-env".to_string()));
        assert_eq!(config.require_api_key().unwrap(), "from-file");
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config = AppConfig::default();
        config.logging.level = "invalid".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid log level"));
    }

    #[test]
    fn test_config_validation_numeric_ranges() {
        let mut config = AppConfig::default();
        config.weather.timeout_seconds = 500;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("timeout cannot exceed"));

        let mut config = AppConfig::default();
        config.defaults.latitude = 123.0;
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Invalid default location"));
    }

    #[test]
    fn test_config_validation_urls() {
        let mut config = AppConfig::default();
        config.providers.geocoding_url = "ftp://example.com".to_string();
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Geocoding URL"));
    }

    #[test]
    fn test_config_validation_resolver_order() {
        let mut config = AppConfig::default();
        config.resolver.order = vec![];
        assert!(config.validate().is_err());

        config.resolver.order = vec![Strategy::Ip, Strategy::Default, Strategy::Ip];
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("more than once"));
    }

    #[test]
    fn test_load_from_file_with_secrets() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
[weather]
units = "imperial"
timeout_seconds = 4

[resolver]
order = ["city_search", "manual", "default"]

[defaults]
city = "Berlin,DE"
latitude = 52.52
longitude = 13.405
"#
        )
        .unwrap();

        let mut secrets = std::fs::File::create(dir.path().join("secrets.toml")).unwrap();
        writeln!(secrets, "[weather]\napi_key = \"secret-from-file\"").unwrap();

        let config = AppConfig::load_from_path(Some(config_path)).unwrap();
        assert_eq!(config.weather.units, Units::Imperial);
        assert_eq!(config.weather.timeout_seconds, 4);
        assert_eq!(config.weather.api_key.as_deref(), Some("secret-from-file"));
        assert_eq!(
            config.resolver.order,
            vec![Strategy::CitySearch, Strategy::Manual, Strategy::Default]
        );
        assert_eq!(config.defaults.city, "Berlin,DE");
        // Untouched sections keep their defaults
        assert_eq!(config.providers.ip_lookup_url, "https://ipinfo.io");
    }

    #[test]
    fn test_redacted_hides_api_key() {
        let mut config = AppConfig::default();
        config.weather.api_key = Some("super-secret".to_string());
        let redacted = config.redacted();
        assert_eq!(redacted.weather.api_key.as_deref(), Some("********"));
    }

    #[test]
    fn test_config_path_generation() {
        if let Some(path) = AppConfig::get_config_path() {
            assert!(path.to_string_lossy().contains("geoweather"));
            assert!(path.to_string_lossy().contains("config.toml"));
        }
        let secrets = AppConfig::secrets_path_for(Path::new("/etc/geoweather/config.toml"));
        assert_eq!(secrets, PathBuf::from("/etc/geoweather/secrets.toml"));
    }
}
