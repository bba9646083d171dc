//! Pattern-based tactical route generation.
//!
//! Classifies the passage by the angle between the goal bearing and the wind
//! at the origin, then applies the matching sailing tactic: alternating
//! tacks upwind, a VMG-biased two-piece schedule on reaches and runs, and a
//! wind-seeking curve that bends toward the stronger-wind side of the
//! corridor. All generators are deterministic.

use chrono::{DateTime, TimeDelta, Utc};
use passage_shared::{BoatProfile, BoatType, Coordinate};

use crate::geo::{self, GeoError};
use crate::grid::WeatherGrid;
use crate::polar;
use crate::route::{self, GeneratedRoute};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SailingScenario {
    /// Goal within 60 degrees of the wind: must tack.
    Upwind,
    /// 60-100 degrees: fast reaching.
    BeamReach,
    /// 100-150 degrees: fastest point of sail.
    BroadReach,
    /// 150 degrees or more: running, often faster at an angle.
    Downwind,
}

/// Classify by the angle between the destination bearing and the direction
/// the wind comes from.
pub fn classify_scenario(destination_bearing: f64, wind_from: f64) -> SailingScenario {
    let angle = geo::angle_diff(destination_bearing, wind_from);
    if angle < 60.0 {
        SailingScenario::Upwind
    } else if angle < 100.0 {
        SailingScenario::BeamReach
    } else if angle < 150.0 {
        SailingScenario::BroadReach
    } else {
        SailingScenario::Downwind
    }
}

/// Wind statistics along the direct corridor at departure time.
#[derive(Clone, Debug)]
pub struct WindCorridor {
    pub avg_wind_speed: f64,
    /// Circular mean of the wind direction.
    pub avg_wind_direction: f64,
    pub max_wind_speed: f64,
    pub min_wind_speed: f64,
    /// Circular spread in degrees; 0 is steady, above ~30 is shifty.
    pub wind_variability: f64,
    pub max_wave_height: f64,
}

/// Sample the rhumb line and summarize the prevailing wind. Direction is
/// averaged through unit vectors so the 0/360 seam does not skew it.
pub fn analyze_corridor(
    grid: &WeatherGrid,
    start: Coordinate,
    end: Coordinate,
    departure: DateTime<Utc>,
) -> Result<WindCorridor, GeoError> {
    const SAMPLES: usize = 10;
    let bearing = geo::bearing_deg(start, end)?;
    let total = geo::distance_nm(start, end)?;

    let mut speeds = Vec::with_capacity(SAMPLES + 1);
    let mut waves = Vec::with_capacity(SAMPLES + 1);
    let mut sin_sum = 0.0;
    let mut cos_sum = 0.0;

    for i in 0..=SAMPLES {
        let fraction = i as f64 / SAMPLES as f64;
        let position = if i == 0 {
            start
        } else if i == SAMPLES {
            end
        } else {
            geo::destination(start, bearing, total * fraction)?
        };
        let weather = grid.at(position, departure);
        speeds.push(weather.wind_speed);
        waves.push(weather.wave_height);
        let dir = weather.wind_direction.to_radians();
        sin_sum += dir.sin();
        cos_sum += dir.cos();
    }

    let n = speeds.len() as f64;
    let avg_sin = sin_sum / n;
    let avg_cos = cos_sum / n;
    let avg_wind_direction = geo::normalize_angle(avg_sin.atan2(avg_cos).to_degrees());
    let r = (avg_sin * avg_sin + avg_cos * avg_cos).sqrt();
    let wind_variability = if r > 0.01 {
        (-2.0 * r.ln()).sqrt().to_degrees()
    } else {
        0.0
    };

    Ok(WindCorridor {
        avg_wind_speed: speeds.iter().sum::<f64>() / n,
        avg_wind_direction,
        max_wind_speed: speeds.iter().copied().fold(0.0, f64::max),
        min_wind_speed: speeds.iter().copied().fold(f64::INFINITY, f64::min),
        wind_variability,
        max_wave_height: waves.iter().copied().fold(0.0, f64::max),
    })
}

/// Generate the tactical candidate routes for this passage.
pub fn generate_routes(
    grid: &WeatherGrid,
    boat: BoatType,
    start: Coordinate,
    end: Coordinate,
    departure: DateTime<Utc>,
) -> Result<Vec<GeneratedRoute>, GeoError> {
    let rhumb = geo::bearing_deg(start, end)?;
    let origin_weather = grid.at(start, departure);
    let scenario = classify_scenario(rhumb, origin_weather.wind_direction);

    let corridor = analyze_corridor(grid, start, end, departure)?;
    log::info!(
        "hybrid router: {scenario:?}, wind {:.0} kt from {:.0} (variability {:.0})",
        corridor.avg_wind_speed,
        corridor.avg_wind_direction,
        corridor.wind_variability
    );

    let mut routes = Vec::with_capacity(3);
    if scenario == SailingScenario::Upwind && boat.is_sailing_craft() {
        let two = tacking_positions(grid, boat, start, end, departure, 2)?;
        routes.push(route::assemble("Two-Leg Beat", &two, departure, grid, boat)?);
        let four = tacking_positions(grid, boat, start, end, departure, 4)?;
        routes.push(route::assemble("Four-Leg Beat", &four, departure, grid, boat)?);
    } else {
        let direct = rhumb_positions(start, end, 5)?;
        routes.push(route::assemble("Direct Route", &direct, departure, grid, boat)?);
        let vmg = vmg_positions(grid, boat, start, end, departure)?;
        routes.push(route::assemble("VMG Optimized", &vmg, departure, grid, boat)?);
    }

    let seeking = weather_seeking_positions(grid, start, end, departure)?;
    routes.push(route::assemble("Wind Seeker", &seeking, departure, grid, boat)?);

    Ok(routes)
}

/// Evenly spaced positions along the rhumb line, endpoints included.
fn rhumb_positions(
    start: Coordinate,
    end: Coordinate,
    interior: usize,
) -> Result<Vec<Coordinate>, GeoError> {
    let bearing = geo::bearing_deg(start, end)?;
    let total = geo::distance_nm(start, end)?;
    let steps = interior + 1;

    let mut positions = vec![start];
    for i in 1..steps {
        let fraction = i as f64 / steps as f64;
        positions.push(geo::destination(start, bearing, total * fraction)?);
    }
    positions.push(end);
    Ok(positions)
}

/// Alternating close-hauled legs at the optimal VMG angle off the forecast
/// wind, each advancing one equal share of the rhumb line. Within 10 nm the
/// closing leg aims straight at the goal. Wind is re-read at every tack, so
/// the pattern follows shifts in space and time.
fn tacking_positions(
    grid: &WeatherGrid,
    boat: BoatType,
    start: Coordinate,
    end: Coordinate,
    departure: DateTime<Utc>,
    legs: u32,
) -> Result<Vec<Coordinate>, GeoError> {
    let profile = BoatProfile::for_type(boat);
    let total = geo::distance_nm(start, end)?;
    let share = total / legs as f64;

    let mut positions = vec![start];
    let mut current = start;
    let mut now = departure;
    let mut last_was_port: Option<bool> = None;

    for _ in 0..legs {
        let to_goal = geo::distance_nm(current, end)?;
        if to_goal < 10.0 {
            break;
        }

        let weather = grid.at(current, now);
        let wind = weather.wind_direction;
        let rhumb = geo::bearing_deg(current, end)?;

        // close-hauled angle the polar actually rewards in this wind
        let (vmg_heading, _) = polar::optimal_vmg_heading(boat, weather.wind_speed, rhumb, wind);
        let vmg_angle = geo::angle_diff(vmg_heading, wind);

        let port_heading = geo::normalize_angle(wind + vmg_angle);
        let starboard_heading = geo::normalize_angle(wind - vmg_angle);
        let take_port = match last_was_port {
            // open on the tack pointing closer to the goal
            None => {
                geo::angle_diff(port_heading, rhumb) <= geo::angle_diff(starboard_heading, rhumb)
            }
            Some(was_port) => !was_port,
        };
        last_was_port = Some(take_port);
        let heading = if take_port {
            port_heading
        } else {
            starboard_heading
        };

        // leg length that advances one share measured along the rhumb
        let along = geo::angle_diff(heading, rhumb).to_radians().cos().max(0.2);
        let leg_nm = (share / along).min(to_goal);

        let speed = polar::boat_speed(boat, weather.wind_speed, vmg_angle)
            .max(profile.avg_speed * 0.2);
        now += TimeDelta::seconds((leg_nm / speed * 3600.0).round() as i64);

        current = geo::destination(current, heading, leg_nm)?;
        positions.push(current);
    }

    positions.push(end);
    Ok(positions)
}

/// Two-piece bearing schedule: the first half biased toward the polar's peak
/// wind angle (capped at 20 degrees off the rhumb), the second half closing
/// on the goal.
fn vmg_positions(
    grid: &WeatherGrid,
    boat: BoatType,
    start: Coordinate,
    end: Coordinate,
    departure: DateTime<Utc>,
) -> Result<Vec<Coordinate>, GeoError> {
    let rhumb = geo::bearing_deg(start, end)?;
    let total = geo::distance_nm(start, end)?;
    let weather = grid.at(start, departure);

    let twa_direct = geo::angle_diff(rhumb, weather.wind_direction);
    let peak = polar::peak_twa(boat, weather.wind_speed);
    let delta = (peak - twa_direct).clamp(-20.0, 20.0);
    // rotating away from the wind raises the wind angle
    let away = if geo::signed_angle_diff(rhumb, weather.wind_direction) >= 0.0 {
        1.0
    } else {
        -1.0
    };
    let first_piece = geo::normalize_angle(rhumb + away * delta);

    let mut positions = vec![
        start,
        geo::destination(start, first_piece, total * 0.25)?,
        geo::destination(start, first_piece, total * 0.5)?,
    ];
    let elbow = positions[2];
    let back = geo::bearing_deg(elbow, end)?;
    let remaining = geo::distance_nm(elbow, end)?;
    positions.push(geo::destination(elbow, back, remaining * 0.5)?);
    positions.push(end);
    Ok(positions)
}

/// Sample the wind abeam of the route midpoint and bend a sine-shaped bulge
/// toward the stronger side. The bulge is 5% of the route length, kept
/// between 10 and 50 nm.
fn weather_seeking_positions(
    grid: &WeatherGrid,
    start: Coordinate,
    end: Coordinate,
    departure: DateTime<Utc>,
) -> Result<Vec<Coordinate>, GeoError> {
    const INTERIOR: usize = 5;
    let rhumb = geo::bearing_deg(start, end)?;
    let total = geo::distance_nm(start, end)?;
    let offset = (total * 0.05).clamp(10.0, 50.0);

    let midpoint = geo::destination(start, rhumb, total * 0.5)?;
    let left = geo::destination(midpoint, geo::normalize_angle(rhumb - 90.0), offset)?;
    let right = geo::destination(midpoint, geo::normalize_angle(rhumb + 90.0), offset)?;
    let side = if grid.at(left, departure).wind_speed >= grid.at(right, departure).wind_speed {
        -90.0
    } else {
        90.0
    };
    let perpendicular = geo::normalize_angle(rhumb + side);

    let mut positions = vec![start];
    let steps = INTERIOR + 1;
    for i in 1..steps {
        let fraction = i as f64 / steps as f64;
        let bulge = offset * (fraction * std::f64::consts::PI).sin();
        let on_rhumb = geo::destination(start, rhumb, total * fraction)?;
        positions.push(geo::destination(on_rhumb, perpendicular, bulge)?);
    }
    positions.push(end);
    Ok(positions)
}
