//! Cached weather lookups for OpenWeatherMap.
//!
//! This crate defines:
//! - A capacity- and time-bounded LRU cache of weather records
//! - Sessions that read through that cache to a weather provider
//! - A registry that keeps at most one session per API key
//! - Background refresh for sessions running in polling mode
//!
//! It is used by `weather-cli`, but can also be embedded in other binaries or services.
//!
//! ```no_run
//! use weather_sdk::{Mode, Registry, SessionSettings, Units};
//!
//! # async fn demo() -> Result<(), weather_sdk::WeatherError> {
//! let registry = Registry::open_weather(SessionSettings::default())?;
//! let session = registry.get_or_create("YOUR_API_KEY", Mode::OnDemand, Units::Metric)?;
//! let weather = session.get_weather("Paris").await?;
//! println!("{:?}", weather.temperature);
//! registry.destroy(&session).await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;
pub mod provider;
pub mod registry;
pub mod scheduler;
pub mod session;

pub use cache::{CacheEntry, WeatherCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::WeatherError;
pub use model::{Mode, Units, WeatherRecord};
pub use provider::{WeatherProvider, openweather::OpenWeatherProvider};
pub use registry::Registry;
pub use session::{RefreshReport, Session, SessionSettings};
