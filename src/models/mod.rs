//! Data models for the GeoWeather application
//!
//! - Location: validated coordinates and their provenance
//! - Weather: provider snapshots and the typed views rendered from them

pub mod location;
pub mod weather;

// Re-export all public types for convenient access
pub use location::{Coordinate, LocationSource, parse_pair, validate_pair};
pub use weather::{CurrentConditions, SeriesPoint, Units, WeatherSnapshot};
