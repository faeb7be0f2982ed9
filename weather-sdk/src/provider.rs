use async_trait::async_trait;
use std::fmt::Debug;

use crate::{Units, WeatherError, WeatherRecord};

pub mod openweather;

/// Remote source of weather data.
///
/// One provider is shared by every session of a [`Registry`](crate::Registry);
/// the session passes its own credential and units on each call.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch(
        &self,
        location: &str,
        credential: &str,
        units: Units,
    ) -> Result<WeatherRecord, WeatherError>;
}
