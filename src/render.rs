//! Text rendering of a resolved location and its weather
//!
//! The layout is fixed; missing optional fields show [`NOT_AVAILABLE`] rather than
//! failing the render.

use chrono::{DateTime, Utc};

use crate::GeoWeatherError;
use crate::location_resolver::Resolution;
use crate::models::{SeriesPoint, Units, WeatherSnapshot};

/// Marker for a value the provider did not send
pub const NOT_AVAILABLE: &str = "not available";

const HOURLY_POINTS: usize = 24;
const DAILY_POINTS: usize = 8;
const SPARK_BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Expand the raw JSON panel
    pub show_raw: bool,
    /// Plot hourly and daily series when present
    pub show_charts: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_raw: false,
            show_charts: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    options: RenderOptions,
}

impl Renderer {
    #[must_use]
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    /// Location line plus a notice for each strategy that failed before it
    #[must_use]
    pub fn render_location(&self, resolution: &Resolution) -> String {
        let mut lines: Vec<String> = resolution
            .failures
            .iter()
            .map(|f| format!("! {} unavailable: {}", f.strategy, f.reason))
            .collect();

        let coordinate = &resolution.coordinate;
        let mut line = format!(
            "Location: {} (source: {})",
            coordinate.format_coordinates(),
            coordinate.source
        );
        if let Some(label) = &coordinate.label {
            line.push_str(&format!(" | {label}"));
        }
        if let Some(accuracy) = coordinate.accuracy_meters {
            line.push_str(&format!(" ±{accuracy:.0} m"));
        }
        lines.push(line);
        lines.join("\n")
    }

    /// Headline, metrics, condition, optional series, raw panel and caption
    #[must_use]
    pub fn render_snapshot(&self, snapshot: &WeatherSnapshot) -> String {
        let current = snapshot.current();
        let units = snapshot.units;
        let temp_unit = units.temperature_label();
        let mut lines = Vec::new();

        lines.push(format!(
            "Current weather in {}",
            current.place.as_deref().unwrap_or("your area")
        ));
        lines.push(String::new());

        let feels = current.feels_like.map_or_else(
            || format!("Feels like {NOT_AVAILABLE}"),
            |f| format!("Feels {f:.1}{temp_unit}"),
        );
        lines.push(format!(
            "  {:<20}{:>8}   {feels}",
            format!("Temperature ({temp_unit})"),
            format_value(current.temperature, 1),
        ));
        lines.push(format!(
            "  {:<20}{:>8}",
            "Humidity (%)",
            format_value(current.humidity, 0)
        ));
        lines.push(format!(
            "  {:<20}{:>8}",
            format!("Wind ({})", units.wind_label()),
            format_value(current.wind_speed, 1)
        ));
        lines.push(String::new());

        lines.push(format!(
            "Condition: {}",
            current
                .description
                .as_deref()
                .map_or_else(|| NOT_AVAILABLE.to_string(), title_case)
        ));

        if self.options.show_charts {
            let hourly = snapshot.hourly_series();
            if !hourly.is_empty() {
                lines.push(plot_line("Next hours", &hourly, HOURLY_POINTS, units));
            }
            let daily = snapshot.daily_series();
            if !daily.is_empty() {
                lines.push(plot_line("Next days", &daily, DAILY_POINTS, units));
            }
        }

        lines.push(String::new());
        if self.options.show_raw {
            lines.push("Full data (raw):".to_string());
            lines.push(
                serde_json::to_string_pretty(&snapshot.payload)
                    .unwrap_or_else(|_| snapshot.payload.to_string()),
            );
        } else {
            lines.push("Full data (raw): collapsed, pass --raw to expand".to_string());
        }

        let fetched: DateTime<Utc> = current.observed_at.unwrap_or(snapshot.fetched_at);
        lines.push(format!(
            "Fetched at {} UTC",
            fetched.format("%Y-%m-%dT%H:%M:%S")
        ));

        lines.join("\n")
    }

    /// User-visible message for a failure
    #[must_use]
    pub fn render_failure(&self, error: &GeoWeatherError) -> String {
        format!("Error: {}", error.user_message())
    }
}

fn format_value(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| NOT_AVAILABLE.to_string(), |v| format!("{v:.decimals$}"))
}

/// "light rain" -> "Light Rain"
#[must_use]
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// One-line plot: label, sparkline and the value range
fn plot_line(label: &str, points: &[SeriesPoint], limit: usize, units: Units) -> String {
    let values: Vec<f64> = points.iter().take(limit).map(|p| p.value).collect();
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        });
    let unit = units.temperature_label();
    format!(
        "{:<22}{}  min {min:.1}{unit}  max {max:.1}{unit}",
        format!("{label} ({unit}):"),
        sparkline(&values)
    )
}

/// Scale values onto eight block characters
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn sparkline(values: &[f64]) -> String {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let Some(min) = finite.iter().copied().reduce(f64::min) else {
        return String::new();
    };
    let max = finite.iter().copied().fold(min, f64::max);
    let span = max - min;
    let top = (SPARK_BLOCKS.len() - 1) as f64;

    finite
        .iter()
        .map(|v| {
            let index = if span == 0.0 {
                SPARK_BLOCKS.len() / 2
            } else {
                (((v - min) / span) * top).round() as usize
            };
            SPARK_BLOCKS[index.min(SPARK_BLOCKS.len() - 1)]
        })
        .collect()
}
