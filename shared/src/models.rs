use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A point on Earth. Latitude in [-90, 90], longitude in [-180, 180].
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Bounds {
    pub sw: Coordinate,
    pub ne: Coordinate,
}

/// Weather conditions at a specific point and time.
///
/// `wind_speed` is the effective wind used for routing: a blend of the
/// sustained wind and gusts (70/30). Direction is meteorological, degrees
/// the wind blows FROM.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaypointWeather {
    /// Effective wind speed (knots)
    pub wind_speed: f64,
    /// Sustained wind speed (knots)
    pub wind_sustained: f64,
    /// Gust speed (knots)
    pub wind_gusts: f64,
    /// Direction the wind comes from (degrees, 0 = North)
    pub wind_direction: f64,
    /// Significant wave height (meters)
    pub wave_height: f64,
    /// Precipitation rate (mm/h)
    pub precipitation: f64,
    /// Visibility (km)
    pub visibility: f64,
    /// Air temperature (celsius)
    pub temperature: f64,
    /// True when the provider fell back to climatological defaults
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_estimated: bool,
}

/// A point along a route with its estimated arrival time.
///
/// `heading` is the course made good from the previous waypoint; the origin
/// has none. Weather is attached after generation by grid interpolation.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Waypoint {
    pub position: Coordinate,
    pub estimated_arrival: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WaypointWeather>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BoatType {
    Sailboat,
    Motorboat,
    Catamaran,
}

impl BoatType {
    /// Sailing craft have a no-go zone; motorboats do not.
    pub fn is_sailing_craft(self) -> bool {
        matches!(self, BoatType::Sailboat | BoatType::Catamaran)
    }
}

impl std::str::FromStr for BoatType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sailboat" => Ok(BoatType::Sailboat),
            "motorboat" => Ok(BoatType::Motorboat),
            "catamaran" => Ok(BoatType::Catamaran),
            other => Err(format!("unknown boat type: {other}")),
        }
    }
}

impl std::fmt::Display for BoatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BoatType::Sailboat => "sailboat",
            BoatType::Motorboat => "motorboat",
            BoatType::Catamaran => "catamaran",
        };
        f.write_str(name)
    }
}

/// Performance characteristics of a boat class that affect routing.
#[derive(Clone, Copy, Debug)]
pub struct BoatProfile {
    pub boat_type: BoatType,
    /// Average cruising speed in ideal conditions (knots)
    pub avg_speed: f64,
    /// Maximum speed (knots)
    pub max_speed: f64,
    /// Best angle off the wind for upwind progress (degrees)
    pub optimal_vmg_angle: f64,
    /// Minimum usable wind (knots); below this a sailboat needs its motor
    pub min_wind_speed: f64,
    /// Maximum safe wind (knots)
    pub max_safe_wind_speed: f64,
    /// Maximum safe significant wave height (meters)
    pub max_safe_wave_height: f64,
    /// Headings closer than this to the wind are unsailable (degrees)
    pub no_go_angle: f64,
}

static SAILBOAT_PROFILE: BoatProfile = BoatProfile {
    boat_type: BoatType::Sailboat,
    avg_speed: 6.0,
    max_speed: 12.0,
    optimal_vmg_angle: 52.0,
    min_wind_speed: 5.0,
    max_safe_wind_speed: 30.0,
    max_safe_wave_height: 3.0,
    no_go_angle: 45.0,
};

static MOTORBOAT_PROFILE: BoatProfile = BoatProfile {
    boat_type: BoatType::Motorboat,
    avg_speed: 15.0,
    max_speed: 30.0,
    optimal_vmg_angle: 0.0,
    min_wind_speed: 0.0,
    max_safe_wind_speed: 35.0,
    max_safe_wave_height: 2.5,
    no_go_angle: 0.0,
};

static CATAMARAN_PROFILE: BoatProfile = BoatProfile {
    boat_type: BoatType::Catamaran,
    avg_speed: 8.0,
    max_speed: 15.0,
    optimal_vmg_angle: 52.0,
    min_wind_speed: 6.0,
    max_safe_wind_speed: 28.0,
    max_safe_wave_height: 2.0,
    no_go_angle: 45.0,
};

impl BoatProfile {
    pub fn for_type(boat_type: BoatType) -> &'static BoatProfile {
        match boat_type {
            BoatType::Sailboat => &SAILBOAT_PROFILE,
            BoatType::Motorboat => &MOTORBOAT_PROFILE,
            BoatType::Catamaran => &CATAMARAN_PROFILE,
        }
    }
}

/// Which side of the rhumb line a route favors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteType {
    Direct,
    Port,
    Starboard,
}

/// A segment of a sailing route whose heading lies inside the no-go zone
/// for the forecast wind at that point.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoGoViolation {
    /// Index of the offending segment (waypoint i -> i+1)
    pub segment: usize,
    /// Course over the segment (degrees)
    pub heading: f64,
    /// True wind angle over the segment (degrees off the bow)
    pub wind_angle: f64,
}

/// A scored route recommendation.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub name: String,
    #[serde(rename = "type")]
    pub route_type: RouteType,
    /// 0-100
    pub score: u8,
    /// Nautical miles
    pub distance: f64,
    /// Human readable, e.g. "12h 30m"
    pub estimated_time: String,
    pub estimated_hours: f64,
    pub waypoints: Vec<Waypoint>,
    pub warnings: Vec<String>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub no_go_zone_violations: Vec<NoGoViolation>,
}

/// Route calculation request. Field names are snake_case on the wire.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RouteRequest {
    pub start: Coordinate,
    pub end: Coordinate,
    pub boat_type: BoatType,
    pub departure_time: DateTime<Utc>,
}

/// Hourly weather for one grid point, for map visualization.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridPointWeather {
    pub position: Coordinate,
    pub hourly: Vec<WaypointWeather>,
}

/// The weather grid as returned to clients.
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeatherGridView {
    pub grid_points: Vec<Coordinate>,
    pub bounds: Bounds,
    pub times: Vec<DateTime<Utc>>,
    pub grid_points_with_weather: Vec<GridPointWeather>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteResponse {
    pub routes: Vec<Route>,
    pub weather_grid: WeatherGridView,
    pub calculated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}
