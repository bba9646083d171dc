//! Weather provider abstraction and the Open-Meteo adapter.
//!
//! Open-Meteo serves wind/precipitation/visibility from its forecast API and
//! wave height from a separate marine API; both accept batched coordinate
//! lists. The adapter blends sustained wind with gusts into the effective
//! wind the routing core consumes.

use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use futures::future::BoxFuture;
use passage_shared::{Coordinate, WaypointWeather};
use serde::Deserialize;
use thiserror::Error;

use crate::retry::{with_retry, RetryConfig, RetryError};

/// Open-Meteo reports wind in km/h by default.
const KMH_TO_KNOTS: f64 = 0.539957;

/// Largest number of grid points per provider call.
pub const MAX_BATCH_POINTS: usize = 100;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("weather provider unavailable: {0}")]
    Unavailable(String),
    #[error("weather provider timed out: {0}")]
    Timeout(String),
}

/// Source of hourly weather for a set of points.
///
/// Implementations must return one series per requested point, each series
/// covering every requested time, in order. Callers keep batches at or below
/// [`MAX_BATCH_POINTS`].
pub trait WeatherProvider: Send + Sync {
    fn fetch_points<'a>(
        &'a self,
        points: &'a [Coordinate],
        times: &'a [DateTime<Utc>],
    ) -> BoxFuture<'a, Result<Vec<Vec<WaypointWeather>>, ProviderError>>;
}

/// Blend sustained wind and gusts into the "felt" wind used for routing.
pub fn effective_wind(sustained: f64, gusts: f64) -> f64 {
    if gusts <= 0.0 {
        sustained
    } else {
        sustained * 0.7 + gusts * 0.3
    }
}

/// Climatological fallback used when the provider omits a value.
pub fn default_weather() -> WaypointWeather {
    WaypointWeather {
        wind_speed: 12.0,
        wind_sustained: 10.0,
        wind_gusts: 15.0,
        wind_direction: 180.0,
        wave_height: 1.2,
        precipitation: 0.0,
        visibility: 15.0,
        temperature: 18.0,
        is_estimated: true,
    }
}

/// Pick the forecast model by region: ECMWF for Europe / Mediterranean /
/// Africa, GFS elsewhere.
fn select_model(lat: f64, lng: f64) -> &'static str {
    if (-30.0..=60.0).contains(&lng) && (-40.0..=75.0).contains(&lat) {
        "ecmwf"
    } else {
        "gfs"
    }
}

pub struct OpenMeteoProvider {
    client: reqwest::Client,
    forecast_base: String,
    marine_url: String,
    retry: RetryConfig,
}

impl OpenMeteoProvider {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            forecast_base: "https://api.open-meteo.com/v1".to_string(),
            marine_url: "https://marine-api.open-meteo.com/v1/marine".to_string(),
            retry: RetryConfig::default(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let client = &self.client;
        with_retry(
            || async move {
                let response = client
                    .get(url)
                    .query(params)
                    .send()
                    .await
                    .map_err(classify_reqwest_error)?;

                let status = response.status();
                if status.is_server_error() {
                    return Err(RetryError::Retryable(ProviderError::Unavailable(format!(
                        "{url} returned {status}"
                    ))));
                }
                if !status.is_success() {
                    return Err(RetryError::NonRetryable(ProviderError::Unavailable(
                        format!("{url} returned {status}"),
                    )));
                }

                response.json::<T>().await.map_err(|e| {
                    RetryError::NonRetryable(ProviderError::Unavailable(format!(
                        "malformed provider payload: {e}"
                    )))
                })
            },
            &self.retry,
        )
        .await
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> RetryError<ProviderError> {
    if e.is_timeout() {
        RetryError::Retryable(ProviderError::Timeout(e.to_string()))
    } else {
        RetryError::Retryable(ProviderError::Unavailable(e.to_string()))
    }
}

impl WeatherProvider for OpenMeteoProvider {
    fn fetch_points<'a>(
        &'a self,
        points: &'a [Coordinate],
        times: &'a [DateTime<Utc>],
    ) -> BoxFuture<'a, Result<Vec<Vec<WaypointWeather>>, ProviderError>> {
        Box::pin(async move {
            if points.is_empty() || times.is_empty() {
                return Ok(vec![Vec::new(); points.len()]);
            }

            let lat_list = join_coords(points.iter().map(|p| p.lat));
            let lng_list = join_coords(points.iter().map(|p| p.lng));
            let start_date = times[0].format("%Y-%m-%d").to_string();
            let end_date = times[times.len() - 1].format("%Y-%m-%d").to_string();

            let mid = points[points.len() / 2];
            let model = select_model(mid.lat, mid.lng);
            let forecast_url = format!("{}/{}", self.forecast_base, model);

            let forecast_params = [
                ("latitude", lat_list.clone()),
                ("longitude", lng_list.clone()),
                (
                    "hourly",
                    "temperature_2m,precipitation,visibility,wind_speed_10m,\
                     wind_direction_10m,wind_gusts_10m"
                        .to_string(),
                ),
                ("start_date", start_date.clone()),
                ("end_date", end_date.clone()),
            ];
            let marine_params = [
                ("latitude", lat_list),
                ("longitude", lng_list),
                ("hourly", "wave_height".to_string()),
                ("start_date", start_date),
                ("end_date", end_date),
            ];

            // Wind is mandatory; waves are supplementary and degrade to an
            // estimate if the marine endpoint is down.
            let forecast: Batched<ForecastPoint> =
                self.get_json(&forecast_url, &forecast_params).await?;
            let marine: Option<Batched<MarinePoint>> =
                match self.get_json(&self.marine_url, &marine_params).await {
                    Ok(m) => Some(m),
                    Err(e) => {
                        log::warn!("marine API unavailable, estimating wave heights: {e}");
                        None
                    }
                };

            let forecast = forecast.into_vec();
            let marine = marine.map(Batched::into_vec);

            let day_zero = times[0].date_naive();
            let series = points
                .iter()
                .enumerate()
                .map(|(i, _)| {
                    let point_forecast = forecast.get(i.min(forecast.len().saturating_sub(1)));
                    let point_marine = marine
                        .as_ref()
                        .and_then(|m| m.get(i.min(m.len().saturating_sub(1))));
                    times
                        .iter()
                        .map(|t| {
                            let idx =
                                (t.date_naive() - day_zero).num_days() * 24 + t.hour() as i64;
                            extract_weather(point_forecast, point_marine, idx.max(0) as usize)
                        })
                        .collect()
                })
                .collect();

            Ok(series)
        })
    }
}

fn join_coords(values: impl Iterator<Item = f64>) -> String {
    values
        .map(|v| format!("{v:.4}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn extract_weather(
    forecast: Option<&ForecastPoint>,
    marine: Option<&MarinePoint>,
    hour_index: usize,
) -> WaypointWeather {
    let defaults = default_weather();
    let Some(hourly) = forecast.and_then(|f| f.hourly.as_ref()) else {
        return defaults;
    };

    let sustained_kmh = value_at(&hourly.wind_speed_10m, hour_index);
    let is_estimated = sustained_kmh.is_none();
    let sustained_kmh = sustained_kmh.unwrap_or(15.0);
    let gusts_kmh = value_at(&hourly.wind_gusts_10m, hour_index).unwrap_or(sustained_kmh * 1.3);

    let sustained = sustained_kmh * KMH_TO_KNOTS;
    let gusts = gusts_kmh * KMH_TO_KNOTS;

    let wave_height = marine
        .and_then(|m| m.hourly.as_ref())
        .and_then(|h| value_at(&h.wave_height, hour_index))
        .unwrap_or(defaults.wave_height);

    WaypointWeather {
        wind_speed: effective_wind(sustained, gusts),
        wind_sustained: sustained,
        wind_gusts: gusts,
        wind_direction: value_at(&hourly.wind_direction_10m, hour_index).unwrap_or(180.0),
        wave_height,
        precipitation: value_at(&hourly.precipitation, hour_index).unwrap_or(0.0),
        visibility: value_at(&hourly.visibility, hour_index).unwrap_or(10_000.0) / 1000.0,
        temperature: value_at(&hourly.temperature_2m, hour_index).unwrap_or(18.0),
        is_estimated,
    }
}

fn value_at(values: &[Option<f64>], index: usize) -> Option<f64> {
    values.get(index).copied().flatten()
}

/// Open-Meteo returns a bare object for one coordinate and an array for many.
#[derive(Deserialize)]
#[serde(untagged)]
enum Batched<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Batched<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Batched::Many(v) => v,
            Batched::One(p) => vec![p],
        }
    }
}

#[derive(Deserialize)]
struct ForecastPoint {
    hourly: Option<ForecastHourly>,
}

#[derive(Default, Deserialize)]
struct ForecastHourly {
    #[serde(default)]
    temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    precipitation: Vec<Option<f64>>,
    #[serde(default)]
    visibility: Vec<Option<f64>>,
    #[serde(default)]
    wind_speed_10m: Vec<Option<f64>>,
    #[serde(default)]
    wind_direction_10m: Vec<Option<f64>>,
    #[serde(default)]
    wind_gusts_10m: Vec<Option<f64>>,
}

#[derive(Deserialize)]
struct MarinePoint {
    hourly: Option<MarineHourly>,
}

#[derive(Default, Deserialize)]
struct MarineHourly {
    #[serde(default)]
    wave_height: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_wind_blends_sustained_and_gusts() {
        assert!((effective_wind(10.0, 20.0) - 13.0).abs() < 1e-9);
        assert_eq!(effective_wind(10.0, 0.0), 10.0);
    }

    #[test]
    fn model_selection_by_region() {
        assert_eq!(select_model(48.0, -2.0), "ecmwf"); // Brittany
        assert_eq!(select_model(40.7, -74.0), "gfs"); // New York
        assert_eq!(select_model(35.0, 139.0), "gfs"); // Tokyo
    }

    #[test]
    fn extract_falls_back_per_field() {
        let forecast = ForecastPoint {
            hourly: Some(ForecastHourly {
                wind_speed_10m: vec![Some(27.8)], // ~15 kt sustained
                wind_direction_10m: vec![Some(225.0)],
                ..Default::default()
            }),
        };
        let w = extract_weather(Some(&forecast), None, 0);
        assert!(!w.is_estimated);
        assert!((w.wind_sustained - 27.8 * KMH_TO_KNOTS).abs() < 1e-9);
        assert_eq!(w.wind_direction, 225.0);
        // missing gusts estimated at 1.3x sustained
        assert!((w.wind_gusts - w.wind_sustained * 1.3).abs() < 1e-6);
        // missing waves take the climatological default
        assert!((w.wave_height - 1.2).abs() < 1e-9);
    }

    #[test]
    fn missing_wind_marks_weather_estimated() {
        let forecast = ForecastPoint {
            hourly: Some(ForecastHourly::default()),
        };
        let w = extract_weather(Some(&forecast), None, 5);
        assert!(w.is_estimated);
    }

    #[test]
    fn batched_payload_accepts_single_object() {
        let single: Batched<MarinePoint> =
            serde_json::from_str(r#"{"hourly": {"wave_height": [1.5]}}"#).unwrap();
        assert_eq!(single.into_vec().len(), 1);

        let many: Batched<MarinePoint> =
            serde_json::from_str(r#"[{"hourly": {"wave_height": [1.5]}}, {"hourly": null}]"#)
                .unwrap();
        assert_eq!(many.into_vec().len(), 2);
    }
}
