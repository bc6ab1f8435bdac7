use super::*;

/// Proxies the configured weather provider for the generated scripts.
pub(super) async fn weather_handler(
    State(state): State<AppState>,
    Query(query): Query<WeatherQuery>,
) -> Result<Json<WeatherReading>, ApiError> {
    let (Some(lat), Some(lon)) = (query.lat.as_deref(), query.lon.as_deref()) else {
        return Err(bad_request("Latitude and longitude are required"));
    };
    let latitude = parse_coordinate(lat, "lat")?;
    let longitude = parse_coordinate(lon, "lon")?;
    if !coordinates_in_range(latitude, longitude) {
        return Err(bad_request("coordinates out of range"));
    }

    state
        .metrics
        .weather_requests_total
        .fetch_add(1, Ordering::Relaxed);
    match state.weather.current(latitude, longitude).await {
        Ok(reading) => Ok(Json(reading)),
        Err(err) => {
            state
                .metrics
                .weather_upstream_errors_total
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                "{} lookup failed lat={latitude} lon={longitude} err={err}",
                category_weather()
            );
            Err(bad_gateway("Error fetching weather data".to_string()))
        }
    }
}

fn parse_coordinate(raw: &str, name: &str) -> Result<f64, ApiError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| bad_request(format!("invalid {name}: {raw}")))
}
