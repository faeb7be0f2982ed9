use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use inquire::Password;
use std::{sync::Arc, time::Duration};
use weather_sdk::{Config, Mode, OpenWeatherProvider, Registry, Units, WeatherRecord};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI backed by a caching OpenWeatherMap SDK")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeatherMap API key in the config file.
    Configure {
        /// Key to store; prompted for when omitted.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Show current weather for one or more cities.
    Show {
        /// City names. Repeating a city is answered from cache.
        #[arg(required = true)]
        cities: Vec<String>,

        /// metric, imperial or standard. Defaults to the configured units.
        #[arg(long)]
        units: Option<String>,
    },

    /// Keep cities warm in polling mode for a while, then shut down.
    Watch {
        #[arg(required = true)]
        cities: Vec<String>,

        #[arg(long)]
        units: Option<String>,

        /// How long to keep the polling session alive, in seconds.
        #[arg(long = "for", default_value_t = 30)]
        duration_secs: u64,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure { api_key } => configure(api_key),
            Command::Show { cities, units } => show(cities, units).await,
            Command::Watch {
                cities,
                units,
                duration_secs,
            } => watch(cities, units, Duration::from_secs(duration_secs)).await,
        }
    }
}

fn configure(api_key: Option<String>) -> Result<()> {
    let mut config = Config::load()?;

    let api_key = match api_key {
        Some(key) => key,
        None => Password::new("OpenWeatherMap API key:")
            .without_confirmation()
            .prompt()
            .context("Failed to read API key")?,
    };

    let api_key = api_key.trim();
    if api_key.is_empty() {
        anyhow::bail!("API key must not be blank");
    }

    config.set_api_key(api_key);
    config.save()?;

    println!("Saved API key to {}", Config::config_file_path()?.display());
    Ok(())
}

struct Prepared {
    registry: Registry,
    api_key: String,
    units: Units,
}

fn prepare(units: Option<String>) -> Result<Prepared> {
    let config = Config::load()?;
    let api_key = config.resolve_api_key()?;
    let units = match units {
        Some(u) => Units::try_from(u.as_str())?,
        None => config.units,
    };

    let provider = OpenWeatherProvider::with_base_url(&config.http.base_url, config.http.timeout()?)?;
    let registry = Registry::with_settings(Arc::new(provider), config.session_settings()?);

    Ok(Prepared {
        registry,
        api_key,
        units,
    })
}

async fn show(cities: Vec<String>, units: Option<String>) -> Result<()> {
    let ctx = prepare(units)?;
    let session = ctx.registry.get_or_create(&ctx.api_key, Mode::OnDemand, ctx.units)?;

    for city in &cities {
        match session.get_weather(city).await {
            Ok(record) => print_record(city, &record, ctx.units),
            Err(e) => eprintln!("{city}: {e}"),
        }
    }

    println!("Cities in cache: {}", session.cache_size());
    ctx.registry.destroy(&session).await;
    Ok(())
}

async fn watch(cities: Vec<String>, units: Option<String>, duration: Duration) -> Result<()> {
    let ctx = prepare(units)?;
    let session = ctx.registry.get_or_create(&ctx.api_key, Mode::Polling, ctx.units)?;

    for city in &cities {
        if let Err(e) = session.get_weather(city).await {
            eprintln!("{city}: {e}");
        }
    }

    println!(
        "Polling {} cities every {}s, stopping in {}s",
        session.cache_size(),
        ctx.registry.settings().polling_interval.as_secs(),
        duration.as_secs()
    );
    tokio::time::sleep(duration).await;

    for city in session.cached_cities() {
        match session.get_weather(&city).await {
            Ok(record) => print_record(&city, &record, ctx.units),
            Err(e) => eprintln!("{city}: {e}"),
        }
    }

    ctx.registry.shutdown().await;
    println!("Polling stopped");
    Ok(())
}

fn print_record(city: &str, record: &WeatherRecord, units: Units) {
    let name = record.name.as_deref().unwrap_or(city);
    println!("{name}");

    if let Some(t) = &record.temperature {
        if let Some(temp) = t.temp {
            println!("  Temperature: {temp:.2}{}", units.temperature_symbol());
        }
        if let Some(feels_like) = t.feels_like {
            println!("  Feels like:  {feels_like:.2}{}", units.temperature_symbol());
        }
    }
    if let Some(w) = &record.weather {
        println!(
            "  Weather:     {} - {}",
            w.main.as_deref().unwrap_or("Unknown"),
            w.description.as_deref().unwrap_or("")
        );
    }
    if let Some(speed) = record.wind.as_ref().and_then(|w| w.speed) {
        println!("  Wind:        {speed} {}", units.speed_symbol());
    }
    if let Some(visibility) = record.visibility {
        println!("  Visibility:  {visibility} m");
    }
    if let Some(observed) = record.datetime.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)) {
        println!("  Observed:    {observed}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_watch_duration() {
        let cli = Cli::try_parse_from(["weather", "watch", "Paris", "London", "--for", "5"]).unwrap();
        match cli.command {
            Command::Watch {
                cities,
                duration_secs,
                ..
            } => {
                assert_eq!(cities, vec!["Paris", "London"]);
                assert_eq!(duration_secs, 5);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn show_requires_a_city() {
        assert!(Cli::try_parse_from(["weather", "show"]).is_err());
    }
}
