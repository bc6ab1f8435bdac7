use std::time::Duration;

use script::WeatherReading;
use serde::Deserialize;
use url::Url;

use crate::config::WeatherConfig;

const KELVIN_OFFSET: f64 = 273.15;

#[derive(Debug, thiserror::Error)]
pub enum WeatherError {
    #[error("invalid weather api base url: {0}")]
    BaseUrl(#[from] url::ParseError),
    #[error("failed to build weather http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("weather request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("weather provider responded with status {0}")]
    Status(u16),
    #[error("weather provider returned an unreadable body: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("weather provider returned no conditions")]
    MissingConditions,
}

/// Client for an OpenWeatherMap-compatible current-weather endpoint.
#[derive(Clone, Debug)]
pub struct WeatherClient {
    http: reqwest::Client,
    base_url: Url,
    api_key: String,
}

#[derive(Deserialize)]
struct UpstreamResponse {
    #[serde(default)]
    weather: Vec<UpstreamCondition>,
    main: UpstreamMain,
}

#[derive(Deserialize)]
struct UpstreamCondition {
    main: String,
}

#[derive(Deserialize)]
struct UpstreamMain {
    /// Kelvin.
    temp: f64,
}

impl WeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self, WeatherError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(WeatherError::Client)?;
        Ok(Self {
            http,
            base_url: Url::parse(config.api_base_url.trim())?,
            api_key: config.api_key.clone(),
        })
    }

    pub async fn current(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<WeatherReading, WeatherError> {
        let mut url = self.base_url.clone();
        url.query_pairs_mut()
            .append_pair("lat", &latitude.to_string())
            .append_pair("lon", &longitude.to_string())
            .append_pair("appid", &self.api_key);

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(WeatherError::Request)?;
        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }
        let body = response
            .json::<UpstreamResponse>()
            .await
            .map_err(WeatherError::Decode)?;
        into_reading(body)
    }
}

fn into_reading(body: UpstreamResponse) -> Result<WeatherReading, WeatherError> {
    let condition = body
        .weather
        .into_iter()
        .next()
        .ok_or(WeatherError::MissingConditions)?;
    Ok(WeatherReading {
        classification: condition.main.to_uppercase(),
        temperature_celsius: body.main.temp - KELVIN_OFFSET,
    })
}

/// Latitude in [-90, 90] and longitude in [-180, 180].
pub fn coordinates_in_range(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_body_is_normalized() {
        let body = serde_json::from_str::<UpstreamResponse>(
            r#"{"weather":[{"id":800,"main":"Clear"},{"main":"Mist"}],"main":{"temp":293.15,"humidity":40}}"#,
        )
        .expect("body");
        let reading = into_reading(body).expect("reading");
        assert_eq!(reading.classification, "CLEAR");
        assert!((reading.temperature_celsius - 20.0).abs() < 1e-9);
    }

    #[test]
    fn empty_condition_list_is_an_error() {
        let body = serde_json::from_str::<UpstreamResponse>(r#"{"weather":[],"main":{"temp":280.0}}"#)
            .expect("body");
        assert!(matches!(into_reading(body), Err(WeatherError::MissingConditions)));
    }

    #[test]
    fn coordinate_bounds_are_inclusive() {
        assert!(coordinates_in_range(90.0, -180.0));
        assert!(coordinates_in_range(-90.0, 180.0));
        assert!(!coordinates_in_range(90.5, 0.0));
        assert!(!coordinates_in_range(0.0, 180.1));
        assert!(!coordinates_in_range(f64::NAN, 0.0));
    }
}
