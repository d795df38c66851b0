//! `GeoWeather` CLI
//!
//! Prints the weather page for the resolved location on stdout; logs go to stderr.

#![allow(clippy::print_stdout)]

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use geoweather::config::LoggingConfig;
use geoweather::models::parse_pair;
use geoweather::page::DEFAULT_SESSION;
use geoweather::{
    AppConfig, Coordinate, LocationSource, PageRequest, PersistentCache, RenderOptions, Strategy,
    Units, WeatherPage,
};

/// Current weather for your location
#[derive(Parser)]
#[command(name = "geoweather")]
#[command(author, version, about = "Current weather for your location", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Configuration file (default: <config dir>/geoweather/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    show: ShowArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the location and show its weather (the default)
    Show(ShowArgs),

    /// Forget the coordinate remembered for a session
    Forget {
        /// Session name
        #[arg(long, default_value = DEFAULT_SESSION)]
        session: String,
    },

    /// Print the effective configuration with secrets redacted
    Config,
}

#[derive(Args)]
struct ShowArgs {
    /// City to geocode, e.g. "Makassar". Typed locations skip GPS and IP lookup
    #[arg(long)]
    city: Option<String>,

    /// Latitude for manual entry (skips GPS and IP lookup)
    #[arg(long, allow_negative_numbers = true, requires = "lon")]
    lat: Option<f64>,

    /// Longitude for manual entry
    #[arg(long, allow_negative_numbers = true, requires = "lat")]
    lon: Option<f64>,

    /// Coordinate from a previous page, as "lat,lon"
    #[arg(long, value_name = "LAT,LON", allow_hyphen_values = true)]
    coords: Option<String>,

    /// Unit system: metric or imperial
    #[arg(short, long)]
    units: Option<Units>,

    /// Show the raw provider JSON
    #[arg(long)]
    raw: bool,

    /// Skip the hourly and daily plots
    #[arg(long)]
    no_charts: bool,

    /// Session the resolved coordinate is remembered under
    #[arg(long, default_value = DEFAULT_SESSION)]
    session: String,

    /// Strategy order, e.g. "ip,city_search,default"
    #[arg(long, value_delimiter = ',')]
    strategies: Option<Vec<Strategy>>,
}

impl ShowArgs {
    fn page_request(&self) -> Result<PageRequest> {
        let query_coordinate = self
            .coords
            .as_deref()
            .map(|raw| {
                let (lat, lon) = parse_pair(raw)?;
                Coordinate::new(lat, lon, LocationSource::QueryParam)
            })
            .transpose()
            .context("Invalid --coords")?;

        Ok(PageRequest {
            session: self.session.clone(),
            query_coordinate,
            city: self.city.clone(),
            manual: self.lat.zip(self.lon),
            units: self.units,
        })
    }
}

/// Log filter: `RUST_LOG` wins, then `-v`/`-vv`, then the configured level
fn log_filter(logging: &LoggingConfig, verbose: u8) -> EnvFilter {
    let level = match verbose {
        0 => logging.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

fn init_tracing(logging: &LoggingConfig, verbose: u8) {
    let registry = tracing_subscriber::registry().with(log_filter(logging, verbose));
    if logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn open_cache(config: &AppConfig) -> Result<Arc<PersistentCache>> {
    let cache = PersistentCache::open(&config.cache.location)
        .with_context(|| format!("Failed to open cache at {}", config.cache.location))?;
    Ok(Arc::new(cache))
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from_path(cli.config.clone())
        .context("Failed to load configuration")?;
    init_tracing(&config.logging, cli.verbose);
    debug!("Configuration loaded");

    match cli.command {
        Some(Commands::Config) => {
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            Ok(ExitCode::SUCCESS)
        }

        Some(Commands::Forget { session }) => {
            let cache = open_cache(&config)?;
            let page = WeatherPage::from_config(&config, cache, RenderOptions::default())?;
            page.forget(&session).await?;
            println!("Forgot the location for session '{session}'.");
            Ok(ExitCode::SUCCESS)
        }

        Some(Commands::Show(args)) => show(&mut config, &args).await,
        None => show(&mut config, &cli.show).await,
    }
}

async fn show(config: &mut AppConfig, args: &ShowArgs) -> Result<ExitCode> {
    if let Some(order) = &args.strategies {
        config.resolver.order.clone_from(order);
        config.validate().context("Invalid --strategies")?;
    }
    let request = args.page_request()?;

    let cache = open_cache(config)?;
    let options = RenderOptions {
        show_raw: args.raw,
        show_charts: !args.no_charts,
    };
    let page = WeatherPage::from_config(config, cache, options)?;

    let rendered = page.render(&request).await;
    println!("{}", rendered.body);

    if rendered.is_success() {
        info!("Page rendered");
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}
