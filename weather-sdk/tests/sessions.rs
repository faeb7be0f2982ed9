use chrono::TimeDelta;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use weather_sdk::{
    ManualClock, Mode, OpenWeatherProvider, Registry, SessionSettings, Units, WeatherCache,
    WeatherError, WeatherRecord,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate, Times,
    matchers::{method, path, query_param},
};

const WEATHER_PATH: &str = "/data/2.5/weather";

fn registry_for(server: &MockServer) -> Registry {
    let provider = OpenWeatherProvider::with_base_url(
        format!("{}{WEATHER_PATH}", server.uri()),
        Duration::from_secs(2),
    )
    .expect("client should build");

    Registry::with_settings(Arc::new(provider), SessionSettings::default())
}

async fn mock_city(server: &MockServer, city: &str, temp: f64, expected_calls: impl Into<Times>) {
    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .and(query_param("q", city))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "weather": [{"main": "Clear", "description": "clear sky"}],
            "main": {"temp": temp, "feels_like": temp - 1.0},
            "name": city
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn miss_then_hit_only_calls_api_once() {
    let server = MockServer::start().await;
    mock_city(&server, "Paris", 18.5, 1).await;

    let registry = registry_for(&server);
    let session = registry
        .get_or_create("test-api-key", Mode::OnDemand, Units::Metric)
        .unwrap();

    let first = session.get_weather("Paris").await.unwrap();
    let second = session.get_weather(" Paris ").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.name.as_deref(), Some("Paris"));
    assert_eq!(first.temperature.and_then(|t| t.temp), Some(18.5));
    assert_eq!(session.cache_size(), 1);

    registry.destroy(&session).await;
}

#[tokio::test]
async fn failed_lookup_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WEATHER_PATH))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let session = registry
        .get_or_create("test-api-key", Mode::OnDemand, Units::Metric)
        .unwrap();

    for _ in 0..2 {
        let err = session.get_weather("NonExistentCity").await.unwrap_err();
        assert!(matches!(err, WeatherError::CityNotFound(_)));
    }
    assert_eq!(session.cache_size(), 0);
}

#[tokio::test]
async fn sessions_for_different_keys_have_separate_caches() {
    let server = MockServer::start().await;
    mock_city(&server, "Tokyo", 25.0, 2).await;

    let registry = registry_for(&server);
    let metric = registry.get_or_create("key-a", Mode::OnDemand, Units::Metric).unwrap();
    let imperial = registry.get_or_create("key-b", Mode::OnDemand, Units::Imperial).unwrap();

    metric.get_weather("Tokyo").await.unwrap();
    imperial.get_weather("Tokyo").await.unwrap();

    assert_eq!(registry.len(), 2);
    assert_eq!(metric.cache_size(), 1);
    assert_eq!(imperial.cache_size(), 1);
}

#[tokio::test]
async fn expired_entry_is_fetched_again_with_simulated_clock() {
    let server = MockServer::start().await;
    mock_city(&server, "Moscow", -3.0, 2).await;

    let clock = Arc::new(ManualClock::default());
    let registry = registry_for(&server).with_clock(clock.clone());
    let session = registry
        .get_or_create("test-api-key", Mode::OnDemand, Units::Metric)
        .unwrap();

    session.get_weather("Moscow").await.unwrap();
    clock.advance(TimeDelta::minutes(9));
    session.get_weather("Moscow").await.unwrap();

    clock.advance(TimeDelta::minutes(2));
    session.get_weather("Moscow").await.unwrap();
    assert_eq!(session.cache_size(), 1);
}

#[tokio::test]
async fn eleventh_city_evicts_the_first() {
    let server = MockServer::start().await;
    mock_city(&server, "City1", 1.0, 2).await;
    for i in 2..=11 {
        mock_city(&server, &format!("City{i}"), i as f64, 1).await;
    }

    let registry = registry_for(&server);
    let session = registry
        .get_or_create("test-api-key", Mode::OnDemand, Units::Metric)
        .unwrap();

    for i in 1..=11 {
        session.get_weather(&format!("City{i}")).await.unwrap();
    }
    assert_eq!(session.cache_size(), 10);
    assert!(!session.cached_cities().contains(&"City1".to_string()));

    // City11 is served from cache, City1 has to be fetched again.
    session.get_weather("City11").await.unwrap();
    session.get_weather("City1").await.unwrap();
    assert_eq!(session.cache_size(), 10);
}

#[test]
fn cache_scenarios_with_simulated_clock() {
    let clock = Arc::new(ManualClock::default());
    let mut cache = WeatherCache::with_settings(10, TimeDelta::minutes(10), clock.clone()).unwrap();
    let record = WeatherRecord {
        name: Some("Moscow".into()),
        ..Default::default()
    };

    cache.put("Moscow", record.clone());
    assert_eq!(cache.get("Moscow"), Some(record));

    clock.advance(TimeDelta::minutes(11));
    assert_eq!(cache.get("Moscow"), None);
    assert_eq!(cache.size(), 0);
}

#[tokio::test]
async fn polling_session_keeps_entries_warm() {
    let server = MockServer::start().await;
    mock_city(&server, "Berlin", 12.0, 2..).await;

    let provider = OpenWeatherProvider::with_base_url(
        format!("{}{WEATHER_PATH}", server.uri()),
        Duration::from_secs(2),
    )
    .unwrap();
    let settings = SessionSettings {
        polling_interval: Duration::from_millis(100),
        ..SessionSettings::default()
    };
    let registry = Registry::with_settings(Arc::new(provider), settings);
    let session = registry
        .get_or_create("poll-key", Mode::Polling, Units::Metric)
        .unwrap();

    session.get_weather("Berlin").await.unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;

    registry.destroy_by_credential("poll-key").await;
    assert!(!session.is_refreshing());
    assert!(registry.is_empty());
}
