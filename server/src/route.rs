//! Route assembly shared by both routing pipelines: waypoint timing from
//! polar speeds, weather attachment, distance accounting, and duration
//! formatting.

use chrono::{DateTime, TimeDelta, Utc};
use passage_shared::{BoatProfile, BoatType, Coordinate, RouteType, Waypoint};

use crate::geo::{self, GeoError};
use crate::grid::WeatherGrid;
use crate::polar;

/// A candidate route before scoring.
#[derive(Clone, Debug)]
pub struct GeneratedRoute {
    pub name: String,
    pub route_type: RouteType,
    pub waypoints: Vec<Waypoint>,
    pub distance_nm: f64,
    pub estimated_hours: f64,
}

/// Convert positions into waypoints with realistic arrival times.
///
/// Each segment is timed at the polar speed for the forecast wind at the
/// segment's start; a floor of 20% of cruising speed stands in for motoring
/// when the polar would stall. Consecutive duplicate positions are dropped.
pub fn waypoints_with_timing(
    positions: &[Coordinate],
    departure: DateTime<Utc>,
    grid: &WeatherGrid,
    boat: BoatType,
) -> Result<Vec<Waypoint>, GeoError> {
    let profile = BoatProfile::for_type(boat);
    let mut waypoints: Vec<Waypoint> = Vec::with_capacity(positions.len());
    let mut current_time = departure;

    for &position in positions {
        let Some(previous) = waypoints.last() else {
            waypoints.push(Waypoint {
                position,
                estimated_arrival: departure,
                heading: None,
                weather: None,
            });
            continue;
        };

        let from = previous.position;
        let distance = geo::distance_nm(from, position)?;
        if distance < 1e-6 {
            continue;
        }
        let heading = geo::bearing_deg(from, position)?;

        let weather = grid.at(from, current_time);
        let twa = geo::angle_diff(heading, weather.wind_direction);
        let mut speed = polar::boat_speed(boat, weather.wind_speed, twa);
        if speed < 1.0 {
            // stalled or pinching: crawl at motoring-penalty speed
            speed = profile.avg_speed * 0.2;
        }

        let seconds = (distance / speed * 3600.0).round().max(1.0) as i64;
        current_time += TimeDelta::seconds(seconds);

        waypoints.push(Waypoint {
            position,
            estimated_arrival: current_time,
            heading: Some(heading),
            weather: None,
        });
    }

    Ok(waypoints)
}

/// Sum of great-circle segment lengths.
pub fn route_distance_nm(waypoints: &[Waypoint]) -> Result<f64, GeoError> {
    let mut total = 0.0;
    for pair in waypoints.windows(2) {
        total += geo::distance_nm(pair[0].position, pair[1].position)?;
    }
    Ok(total)
}

/// Interpolate grid weather onto every waypoint at its arrival time.
pub fn attach_weather(route: &mut GeneratedRoute, grid: &WeatherGrid) {
    for waypoint in &mut route.waypoints {
        waypoint.weather = Some(grid.at(waypoint.position, waypoint.estimated_arrival));
    }
}

/// Which side of the rhumb line the route favors: the mean signed bearing
/// offset of interior waypoints, seen from the start.
pub fn classify_side(
    start: Coordinate,
    end: Coordinate,
    waypoints: &[Waypoint],
) -> Result<RouteType, GeoError> {
    if waypoints.len() <= 2 {
        return Ok(RouteType::Direct);
    }
    let rhumb = geo::bearing_deg(start, end)?;

    let mut offset_sum = 0.0;
    let mut counted = 0usize;
    for waypoint in &waypoints[1..waypoints.len() - 1] {
        if geo::distance_nm(start, waypoint.position)? < 1.0 {
            continue;
        }
        let bearing = geo::bearing_deg(start, waypoint.position)?;
        offset_sum += geo::signed_angle_diff(bearing, rhumb);
        counted += 1;
    }
    if counted == 0 {
        return Ok(RouteType::Direct);
    }

    let mean = offset_sum / counted as f64;
    Ok(if mean > 3.0 {
        RouteType::Starboard
    } else if mean < -3.0 {
        RouteType::Port
    } else {
        RouteType::Direct
    })
}

/// Build a timed, classified route from raw positions.
pub fn assemble(
    name: &str,
    positions: &[Coordinate],
    departure: DateTime<Utc>,
    grid: &WeatherGrid,
    boat: BoatType,
) -> Result<GeneratedRoute, GeoError> {
    let waypoints = waypoints_with_timing(positions, departure, grid, boat)?;
    let distance_nm = route_distance_nm(&waypoints)?;
    let estimated_hours = match (waypoints.first(), waypoints.last()) {
        (Some(first), Some(last)) => {
            (last.estimated_arrival - first.estimated_arrival).num_seconds() as f64 / 3600.0
        }
        _ => 0.0,
    };
    let route_type = match (positions.first(), positions.last()) {
        (Some(&start), Some(&end)) => classify_side(start, end, &waypoints)?,
        _ => RouteType::Direct,
    };

    Ok(GeneratedRoute {
        name: name.to_string(),
        route_type,
        waypoints,
        distance_nm,
        estimated_hours,
    })
}

/// Human-readable duration, e.g. "12h 30m".
pub fn format_duration(hours: f64) -> String {
    if hours < 1.0 {
        return format!("{} minutes", (hours * 60.0) as i64);
    }
    let h = hours as i64;
    let m = ((hours - h as f64) * 60.0) as i64;
    if m == 0 {
        if h == 1 {
            "1 hour".to_string()
        } else {
            format!("{h} hours")
        }
    } else {
        format!("{h}h {m}m")
    }
}
