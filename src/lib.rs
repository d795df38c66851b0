//! `GeoWeather` - current weather for wherever you are
//!
//! This library resolves the user's location through an ordered chain of
//! strategies (stored coordinate, host GPS, IP lookup, city search, manual
//! entry, default city), fetches the weather there and renders it as text.

pub mod cache;
pub mod config;
pub mod error;
pub mod location_resolver;
pub mod models;
pub mod page;
pub mod providers;
pub mod render;
pub mod session;
pub mod weather;

// Re-export core types for public API
pub use cache::PersistentCache;
pub use config::AppConfig;
pub use error::GeoWeatherError;
pub use location_resolver::{LocationRequest, LocationResolver, Resolution, Strategy, StrategyFailure};
pub use models::{Coordinate, LocationSource, Units, WeatherSnapshot};
pub use page::{PageRequest, RenderedPage, WeatherPage};
pub use render::{RenderOptions, Renderer};
pub use session::{CacheSessionStore, SessionStore};
pub use weather::{HttpWeatherClient, WeatherClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Core result type used throughout the library
pub type Result<T> = std::result::Result<T, GeoWeatherError>;
