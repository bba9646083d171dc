//! End-to-end routing scenarios against a scripted weather provider.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use futures::future::BoxFuture;

use passage_server::error::RoutingError;
use passage_server::geo;
use passage_server::orchestrator::calculate_routes;
use passage_server::weather::{ProviderError, WeatherProvider};
use passage_shared::{BoatType, Coordinate, RouteRequest, WaypointWeather};

/// Serves the same conditions everywhere, for every hour.
struct ScriptedProvider {
    wind_speed: f64,
    wind_from: f64,
    wave_height: f64,
    failing: bool,
}

impl ScriptedProvider {
    fn steady(wind_speed: f64, wind_from: f64) -> Self {
        Self {
            wind_speed,
            wind_from,
            wave_height: 1.0,
            failing: false,
        }
    }

    fn down() -> Self {
        Self {
            wind_speed: 0.0,
            wind_from: 0.0,
            wave_height: 0.0,
            failing: true,
        }
    }
}

impl WeatherProvider for ScriptedProvider {
    fn fetch_points<'a>(
        &'a self,
        points: &'a [Coordinate],
        times: &'a [DateTime<Utc>],
    ) -> BoxFuture<'a, Result<Vec<Vec<WaypointWeather>>, ProviderError>> {
        Box::pin(async move {
            if self.failing {
                return Err(ProviderError::Unavailable(
                    "upstream returned 503".to_string(),
                ));
            }
            let sample = WaypointWeather {
                wind_speed: self.wind_speed,
                wind_sustained: self.wind_speed,
                wind_gusts: self.wind_speed * 1.3,
                wind_direction: self.wind_from,
                wave_height: self.wave_height,
                precipitation: 0.0,
                visibility: 20.0,
                temperature: 15.0,
                is_estimated: false,
            };
            Ok(vec![vec![sample; times.len()]; points.len()])
        })
    }
}

fn request(start: Coordinate, end: Coordinate, boat: BoatType) -> RouteRequest {
    RouteRequest {
        start,
        end,
        boat_type: boat,
        departure_time: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
    }
}

const SOUTHAMPTON: Coordinate = Coordinate { lat: 50.89, lng: -1.39 };
const CHERBOURG: Coordinate = Coordinate { lat: 49.63, lng: -1.62 };

#[tokio::test]
async fn channel_crossing_scores_well_without_violations() {
    let provider = Arc::new(ScriptedProvider::steady(12.0, 225.0));
    let response = calculate_routes(provider, request(SOUTHAMPTON, CHERBOURG, BoatType::Sailboat))
        .await
        .unwrap();

    assert!(!response.routes.is_empty());
    assert!(response.routes.len() <= 3);

    let best = &response.routes[0];
    assert!(best.score >= 70, "best route scored {}", best.score);
    assert!(
        best.no_go_zone_violations.is_empty(),
        "violations: {:?}",
        best.no_go_zone_violations
    );
    assert!(
        best.estimated_hours > 8.0 && best.estimated_hours < 30.0,
        "estimated {}h",
        best.estimated_hours
    );

    // waypoint etas strictly increase and the track ends near Cherbourg
    for route in &response.routes {
        for pair in route.waypoints.windows(2) {
            assert!(pair[1].estimated_arrival > pair[0].estimated_arrival);
        }
        let last = route.waypoints.last().unwrap();
        assert!(geo::distance_nm(last.position, CHERBOURG).unwrap() < 6.0);
    }
}

#[tokio::test]
async fn dead_upwind_passage_tacks() {
    let start = Coordinate::new(50.0, -2.0);
    let end = Coordinate::new(50.0, 0.0);
    let direct = geo::distance_nm(start, end).unwrap();

    let provider = Arc::new(ScriptedProvider::steady(15.0, 90.0));
    let response = calculate_routes(provider, request(start, end, BoatType::Sailboat))
        .await
        .unwrap();

    let best = &response.routes[0];
    assert!(
        best.no_go_zone_violations.is_empty(),
        "best upwind route has violations: {:?}",
        best.no_go_zone_violations
    );
    assert!(
        best.distance >= direct * 1.25,
        "distance {} vs direct {direct}",
        best.distance
    );

    // legs on both sides of the wind axis: a real beat, not a straight line
    let headings: Vec<f64> = best
        .waypoints
        .iter()
        .filter_map(|w| w.heading)
        .collect();
    assert!(headings.len() >= 2);
    let northerly = headings
        .iter()
        .any(|&h| geo::signed_angle_diff(h, 90.0) < -5.0);
    let southerly = headings
        .iter()
        .any(|&h| geo::signed_angle_diff(h, 90.0) > 5.0);
    assert!(
        northerly && southerly,
        "no tack change in headings {headings:?}"
    );
}

#[tokio::test]
async fn dead_downwind_run_prefers_an_angle() {
    let start = Coordinate::new(50.0, -2.0);
    let end = Coordinate::new(50.0, 0.0);
    let direct = geo::distance_nm(start, end).unwrap();

    let provider = Arc::new(ScriptedProvider::steady(15.0, 270.0));
    let response = calculate_routes(provider, request(start, end, BoatType::Sailboat))
        .await
        .unwrap();

    // a dead run at 15 kt makes 8.0 kt; sailing hotter angles must not lose
    let dead_run_hours = direct / 8.0;
    let fastest = response
        .routes
        .iter()
        .map(|r| r.estimated_hours)
        .fold(f64::INFINITY, f64::min);
    assert!(
        fastest <= dead_run_hours,
        "fastest {fastest}h vs dead run {dead_run_hours}h"
    );

    // at least one candidate leaves the rhumb line for a hotter angle
    let biased = response.routes.iter().any(|route| {
        route.waypoints.iter().any(|w| {
            (w.position.lat - 50.0).abs() * 60.0 > 5.0 // >5 nm off the rhumb
        })
    });
    assert!(biased, "no route sails off the dead run");
}

#[tokio::test]
async fn motorboat_in_a_gale_is_warned() {
    let start = Coordinate::new(50.0, -2.0);
    let end = Coordinate::new(50.0, 0.0);

    let provider = Arc::new(ScriptedProvider {
        wind_speed: 40.0,
        wind_from: 180.0,
        wave_height: 3.5,
        failing: false,
    });
    let response = calculate_routes(provider, request(start, end, BoatType::Motorboat))
        .await
        .unwrap();

    let best = &response.routes[0];
    // close to the rhumb: motorboats do not tack
    assert!(best.distance < geo::distance_nm(start, end).unwrap() * 1.15);
    assert!(best.score < 80, "gale conditions scored {}", best.score);
    assert!(best
        .warnings
        .iter()
        .any(|w| w.contains("Dangerous wind")));
    assert!(best
        .warnings
        .iter()
        .any(|w| w.contains("Dangerous waves")));
}

#[tokio::test]
async fn degenerate_request_is_bad_request() {
    let provider = Arc::new(ScriptedProvider::steady(12.0, 225.0));
    let p = Coordinate::new(50.0, -1.0);
    let result = calculate_routes(provider, request(p, p, BoatType::Sailboat)).await;
    assert!(matches!(result, Err(RoutingError::BadRequest(_))));
}

#[tokio::test]
async fn provider_outage_fails_the_request() {
    let provider = Arc::new(ScriptedProvider::down());
    let result = calculate_routes(
        provider,
        request(SOUTHAMPTON, CHERBOURG, BoatType::Sailboat),
    )
    .await;
    assert!(matches!(result, Err(RoutingError::ProviderUnavailable(_))));
}

#[tokio::test]
async fn catamaran_beam_reach_is_fast_and_clean() {
    let start = Coordinate::new(50.0, -2.0);
    let end = Coordinate::new(50.0, 0.0);
    let direct = geo::distance_nm(start, end).unwrap();

    let provider = Arc::new(ScriptedProvider::steady(15.0, 0.0));
    let response = calculate_routes(provider, request(start, end, BoatType::Catamaran))
        .await
        .unwrap();

    let best = &response.routes[0];
    assert!(best.score >= 70);
    assert!(best.no_go_zone_violations.is_empty());
    // a catamaran reaches at ~14.5 kt; even with detours this is a day sail
    assert!(
        best.estimated_hours < direct / 14.5 * 2.0,
        "estimated {}h",
        best.estimated_hours
    );
}
