//! Immutable spatio-temporal weather field over the route corridor.
//!
//! The grid is built once per request: a padded bounding box around the two
//! endpoints, axes spaced a fixed sailing distance apart, and hourly slices
//! covering the forecast horizon. Queries interpolate bilinearly in space and
//! linearly in time; wind direction goes through unit vectors so the 0/360
//! seam cannot corrupt it.

use chrono::{DateTime, TimeDelta, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use passage_shared::{Bounds, Coordinate, GridPointWeather, WaypointWeather, WeatherGridView};

use crate::geo::normalize_angle;
use crate::weather::{ProviderError, WeatherProvider, MAX_BATCH_POINTS};

/// How the grid is laid out and fetched.
pub struct GridSpec {
    /// Target spacing between grid points, nautical miles.
    pub spacing_nm: f64,
    /// Padding around the corridor bounding box, degrees.
    pub padding_deg: f64,
    /// Points per provider call.
    pub batch_points: usize,
    /// Provider calls in flight at once.
    pub fan_out: usize,
}

impl Default for GridSpec {
    fn default() -> Self {
        GridSpec {
            spacing_nm: 10.0,
            padding_deg: 0.5,
            batch_points: MAX_BATCH_POINTS,
            fan_out: 4,
        }
    }
}

/// Forecast horizon in hours: 1.5x the estimated passage duration, kept
/// within one day and the provider's 16-day range.
pub fn forecast_hours_needed(distance_nm: f64, avg_speed_kt: f64) -> u32 {
    let hours = (distance_nm / avg_speed_kt.max(0.1) * 1.5).ceil();
    (hours as u32).clamp(24, 384)
}

pub struct WeatherGrid {
    bounds: Bounds,
    lats: Vec<f64>,
    lngs: Vec<f64>,
    times: Vec<DateTime<Utc>>,
    /// Time-major, then latitude, then longitude.
    samples: Vec<WaypointWeather>,
}

impl WeatherGrid {
    /// Assemble a grid from axes and a dense time-major sample array.
    ///
    /// `samples.len()` must equal `times * lats * lngs`, each axis ascending
    /// with at least two entries.
    pub fn new(
        lats: Vec<f64>,
        lngs: Vec<f64>,
        times: Vec<DateTime<Utc>>,
        samples: Vec<WaypointWeather>,
    ) -> Self {
        assert!(lats.len() >= 2 && lngs.len() >= 2 && times.len() >= 2);
        assert_eq!(samples.len(), times.len() * lats.len() * lngs.len());

        let bounds = Bounds {
            sw: Coordinate::new(lats[0], lngs[0]),
            ne: Coordinate::new(*lats.last().unwrap(), *lngs.last().unwrap()),
        };
        Self {
            bounds,
            lats,
            lngs,
            times,
            samples,
        }
    }

    /// Build the padded grid for a route corridor and fill it from the
    /// provider in batched, concurrency-limited calls. Any provider failure
    /// abandons the grid; partial grids are never used.
    pub async fn fetch(
        provider: &dyn WeatherProvider,
        start: Coordinate,
        end: Coordinate,
        departure: DateTime<Utc>,
        forecast_hours: u32,
        spec: &GridSpec,
    ) -> Result<WeatherGrid, ProviderError> {
        let lat_min = (start.lat.min(end.lat) - spec.padding_deg).max(-90.0);
        let lat_max = (start.lat.max(end.lat) + spec.padding_deg).min(90.0);
        let lng_min = (start.lng.min(end.lng) - spec.padding_deg).max(-180.0);
        let lng_max = (start.lng.max(end.lng) + spec.padding_deg).min(180.0);

        let lat_step = spec.spacing_nm / 60.0;
        let mid_lat = ((lat_min + lat_max) / 2.0).to_radians();
        let lng_step = spec.spacing_nm / (60.0 * mid_lat.cos().max(0.1));

        let lats = axis(lat_min, lat_max, lat_step);
        let lngs = axis(lng_min, lng_max, lng_step);
        let times: Vec<DateTime<Utc>> = (0..=forecast_hours.max(1) as i64)
            .map(|h| departure + TimeDelta::hours(h))
            .collect();

        let points: Vec<Coordinate> = lats
            .iter()
            .flat_map(|&lat| lngs.iter().map(move |&lng| Coordinate::new(lat, lng)))
            .collect();

        log::info!(
            "fetching weather grid: {} points x {} hours ({} batches)",
            points.len(),
            times.len(),
            points.len().div_ceil(spec.batch_points)
        );

        let mut batches: Vec<(usize, Vec<Vec<WaypointWeather>>)> =
            stream::iter(points.chunks(spec.batch_points).enumerate().map(
                |(index, chunk)| {
                    let times = &times;
                    async move {
                        let series = provider.fetch_points(chunk, times).await?;
                        if series.len() != chunk.len()
                            || series.iter().any(|s| s.len() != times.len())
                        {
                            return Err(ProviderError::Unavailable(
                                "provider returned a short batch".to_string(),
                            ));
                        }
                        Ok((index, series))
                    }
                },
            ))
            .buffer_unordered(spec.fan_out.max(1))
            .try_collect()
            .await?;

        batches.sort_by_key(|(index, _)| *index);
        let per_point: Vec<Vec<WaypointWeather>> =
            batches.into_iter().flat_map(|(_, series)| series).collect();

        // reshape from point-major to time-major
        let mut samples = Vec::with_capacity(points.len() * times.len());
        for t in 0..times.len() {
            for series in &per_point {
                samples.push(series[t]);
            }
        }

        Ok(WeatherGrid::new(lats, lngs, times, samples))
    }

    /// Weather at an arbitrary position and time. Positions outside the grid
    /// clamp to the nearest edge; times outside the horizon clamp to the
    /// nearest slice. Never fails.
    pub fn at(&self, position: Coordinate, time: DateTime<Utc>) -> WaypointWeather {
        let (la0, la1, laf) = bracket(&self.lats, position.lat);
        let (lo0, lo1, lof) = bracket(&self.lngs, position.lng);
        let (t0, t1, tf) = self.time_bracket(time);

        let corners = [
            (la0, lo0, (1.0 - laf) * (1.0 - lof)),
            (la0, lo1, (1.0 - laf) * lof),
            (la1, lo0, laf * (1.0 - lof)),
            (la1, lo1, laf * lof),
        ];

        let blend = |t: usize| -> (WaypointWeather, f64, f64, bool) {
            let mut acc = WaypointWeather {
                wind_speed: 0.0,
                wind_sustained: 0.0,
                wind_gusts: 0.0,
                wind_direction: 0.0,
                wave_height: 0.0,
                precipitation: 0.0,
                visibility: 0.0,
                temperature: 0.0,
                is_estimated: false,
            };
            let mut sin_sum = 0.0;
            let mut cos_sum = 0.0;
            let mut estimated = false;
            for &(la, lo, w) in &corners {
                let s = self.sample(t, la, lo);
                acc.wind_speed += w * s.wind_speed;
                acc.wind_sustained += w * s.wind_sustained;
                acc.wind_gusts += w * s.wind_gusts;
                acc.wave_height += w * s.wave_height;
                acc.precipitation += w * s.precipitation;
                acc.visibility += w * s.visibility;
                acc.temperature += w * s.temperature;
                let dir = s.wind_direction.to_radians();
                sin_sum += w * dir.sin();
                cos_sum += w * dir.cos();
                estimated |= s.is_estimated && w > 0.0;
            }
            (acc, sin_sum, cos_sum, estimated)
        };

        let (w0, sin0, cos0, est0) = blend(t0);
        let (w1, sin1, cos1, est1) = blend(t1);

        let lerp = |a: f64, b: f64| a + (b - a) * tf;
        let sin_total = lerp(sin0, sin1);
        let cos_total = lerp(cos0, cos1);
        let wind_direction = if sin_total == 0.0 && cos_total == 0.0 {
            // opposing winds cancel exactly; fall back to the earlier slice
            self.sample(t0, 0, 0).wind_direction
        } else {
            normalize_angle(sin_total.atan2(cos_total).to_degrees())
        };

        WaypointWeather {
            wind_speed: lerp(w0.wind_speed, w1.wind_speed),
            wind_sustained: lerp(w0.wind_sustained, w1.wind_sustained),
            wind_gusts: lerp(w0.wind_gusts, w1.wind_gusts),
            wind_direction,
            wave_height: lerp(w0.wave_height, w1.wave_height),
            precipitation: lerp(w0.precipitation, w1.precipitation),
            visibility: lerp(w0.visibility, w1.visibility),
            temperature: lerp(w0.temperature, w1.temperature),
            is_estimated: est0 || est1,
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn grid_points(&self) -> Vec<Coordinate> {
        self.lats
            .iter()
            .flat_map(|&lat| self.lngs.iter().map(move |&lng| Coordinate::new(lat, lng)))
            .collect()
    }

    /// Flatten back into the client-facing visualization payload.
    pub fn to_view(&self) -> WeatherGridView {
        let points = self.grid_points();
        let n_points = points.len();
        let grid_points_with_weather = points
            .iter()
            .enumerate()
            .map(|(p, &position)| GridPointWeather {
                position,
                hourly: (0..self.times.len())
                    .map(|t| self.samples[t * n_points + p])
                    .collect(),
            })
            .collect();

        WeatherGridView {
            grid_points: points,
            bounds: self.bounds.clone(),
            times: self.times.clone(),
            grid_points_with_weather,
        }
    }

    fn sample(&self, t: usize, la: usize, lo: usize) -> &WaypointWeather {
        &self.samples[(t * self.lats.len() + la) * self.lngs.len() + lo]
    }

    fn time_bracket(&self, time: DateTime<Utc>) -> (usize, usize, f64) {
        let first = self.times[0];
        let last = *self.times.last().unwrap();
        let clamped = time.clamp(first, last);

        let offset = (clamped - first).num_seconds() as f64;
        let step = ((self.times[1] - self.times[0]).num_seconds() as f64).max(1.0);
        let t0 = ((offset / step) as usize).min(self.times.len() - 1);
        let t1 = (t0 + 1).min(self.times.len() - 1);
        let span = ((self.times[t1] - self.times[t0]).num_seconds() as f64).max(1.0);
        let frac = if t1 == t0 {
            0.0
        } else {
            ((clamped - self.times[t0]).num_seconds() as f64 / span).clamp(0.0, 1.0)
        };
        (t0, t1, frac)
    }
}

fn axis(min: f64, max: f64, step: f64) -> Vec<f64> {
    let mut values = Vec::new();
    let mut v = min;
    while v < max - 1e-9 {
        values.push(v);
        v += step;
    }
    values.push(max);
    if values.len() < 2 {
        values.push(min + step.max(1e-3));
    }
    values
}

/// Bracketing indices and fraction along an ascending axis, clamped to the
/// ends.
fn bracket(axis: &[f64], x: f64) -> (usize, usize, f64) {
    if x <= axis[0] {
        return (0, 0, 0.0);
    }
    let last = axis.len() - 1;
    if x >= axis[last] {
        return (last, last, 0.0);
    }
    let i1 = axis.partition_point(|v| *v < x).min(last);
    let i0 = i1 - 1;
    let f = (x - axis[i0]) / (axis[i1] - axis[i0]);
    (i0, i1, f)
}
