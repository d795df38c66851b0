//! Host geolocation bridge.
//!
//! Precise positioning needs user consent and a capability this crate does not
//! implement itself. The host supplies it as a command that prints one JSON reply:
//! `{"ok": true, "latitude": .., "longitude": .., "accuracyMeters": ..}` or
//! `{"ok": false, "errorMessage": ".."}`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::GeoWeatherError;
use crate::config::ProvidersConfig;

/// Reply from the host geolocation bridge
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeolocationReply {
    pub ok: bool,
    #[serde(default, alias = "lat")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lon")]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub accuracy_meters: Option<f64>,
    #[serde(default, alias = "msg")]
    pub error_message: Option<String>,
}

impl GeolocationReply {
    #[must_use]
    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            latitude: None,
            longitude: None,
            accuracy_meters: None,
            error_message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn position(latitude: f64, longitude: f64, accuracy_meters: Option<f64>) -> Self {
        Self {
            ok: true,
            latitude: Some(latitude),
            longitude: Some(longitude),
            accuracy_meters,
            error_message: None,
        }
    }
}

#[async_trait]
pub trait GeolocationBridge: Send + Sync {
    /// Ask the host for the current position. `Err` means the bridge itself is unusable.
    async fn request_position(&self) -> Result<GeolocationReply, GeoWeatherError>;
}

/// Bridge that runs a host command through `sh -c` and parses its stdout
#[derive(Debug, Clone)]
pub struct CommandBridge {
    command: String,
    timeout: Duration,
}

impl CommandBridge {
    #[must_use]
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    /// Bridge from config; `None` when no command is configured
    #[must_use]
    pub fn from_config(config: &ProvidersConfig) -> Option<Self> {
        config.gps_command.as_ref().map(|command| {
            Self::new(
                command.clone(),
                Duration::from_secs(u64::from(config.gps_timeout_seconds)),
            )
        })
    }
}

#[async_trait]
impl GeolocationBridge for CommandBridge {
    #[instrument(skip(self), fields(command = %self.command))]
    async fn request_position(&self) -> Result<GeolocationReply, GeoWeatherError> {
        let child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| {
                GeoWeatherError::location_unavailable(format!(
                    "geolocation bridge did not answer within {}s",
                    self.timeout.as_secs()
                ))
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GeoWeatherError::location_unavailable(format!(
                "geolocation bridge exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!(reply = %stdout.trim(), "Geolocation bridge replied");
        serde_json::from_str(stdout.trim()).map_err(|e| {
            GeoWeatherError::location_unavailable(format!("malformed geolocation reply: {e}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_success_reply() {
        let reply: GeolocationReply = serde_json::from_str(
            r#"{"ok": true, "latitude": 51.5, "longitude": -0.12, "accuracyMeters": 25.0}"#,
        )
        .unwrap();
        assert_eq!(reply, GeolocationReply::position(51.5, -0.12, Some(25.0)));
    }

    #[test]
    fn test_parse_denied_reply_with_short_aliases() {
        let reply: GeolocationReply =
            serde_json::from_str(r#"{"ok": false, "msg": "User denied Geolocation"}"#).unwrap();
        assert_eq!(reply, GeolocationReply::denied("User denied Geolocation"));

        let reply: GeolocationReply =
            serde_json::from_str(r#"{"ok": true, "lat": 1.0, "lon": 2.0}"#).unwrap();
        assert_eq!(reply.latitude, Some(1.0));
        assert_eq!(reply.longitude, Some(2.0));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_bridge_reads_stdout() {
        let bridge = CommandBridge::new(
            r#"echo '{"ok": true, "latitude": 10.5, "longitude": 20.25}'"#,
            Duration::from_secs(5),
        );
        let reply = bridge.request_position().await.unwrap();
        assert_eq!(reply, GeolocationReply::position(10.5, 20.25, None));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_bridge_failures_are_errors() {
        let failing = CommandBridge::new("exit 3", Duration::from_secs(5));
        assert!(failing.request_position().await.is_err());

        let garbage = CommandBridge::new("echo not-json", Duration::from_secs(5));
        assert!(garbage.request_position().await.is_err());

        let slow = CommandBridge::new("sleep 5", Duration::from_millis(100));
        let err = slow.request_position().await.unwrap_err();
        assert!(err.to_string().contains("did not answer"));
    }

    #[test]
    fn test_from_config_requires_command() {
        let config = ProvidersConfig::default();
        assert!(CommandBridge::from_config(&config).is_none());

        let config = ProvidersConfig {
            gps_command: Some("geoclue-where".to_string()),
            ..ProvidersConfig::default()
        };
        assert!(CommandBridge::from_config(&config).is_some());
    }
}
