//! Route scoring: weighted wind / wave / visibility / distance sub-scores,
//! warnings, pros and cons, and no-go-zone violation flags.
//!
//! Scoring is pure and deterministic; equal inputs produce equal scores.

use passage_shared::{
    BoatProfile, BoatType, NoGoViolation, Route, RouteType, Waypoint, WaypointWeather,
};

use crate::geo;
use crate::polar;
use crate::route::{self, GeneratedRoute};

/// Relative weight of each sub-score. Kept as data so tuning never touches
/// the scoring code.
#[derive(Clone, Copy, Debug)]
pub struct ScoreWeights {
    pub wind: f64,
    pub waves: f64,
    pub visibility: f64,
    pub distance: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            wind: 0.35,
            waves: 0.25,
            visibility: 0.15,
            distance: 0.25,
        }
    }
}

fn score_wind(
    weather: &WaypointWeather,
    heading: f64,
    boat: &BoatProfile,
) -> (f64, Vec<String>) {
    let mut notes = Vec::new();
    let mut score: f64 = 100.0;

    let twa = geo::angle_diff(heading, weather.wind_direction);

    if boat.boat_type.is_sailing_craft() {
        if weather.wind_speed < boat.min_wind_speed {
            score -= 30.0;
            notes.push(format!(
                "Low wind ({:.0} kt) - may need motor",
                weather.wind_speed
            ));
        }
        if twa < boat.no_go_angle {
            score -= 25.0;
            notes.push("Headwind - will need to tack".to_string());
        } else if (90.0..=150.0).contains(&twa) {
            score += 10.0;
        }
    }

    if weather.wind_speed > boat.max_safe_wind_speed {
        score -= 40.0;
        notes.push(format!(
            "Dangerous wind: {:.0} kt exceeds safe limit",
            weather.wind_speed
        ));
    } else if weather.wind_speed > boat.max_safe_wind_speed * 0.8 {
        score -= 20.0;
        notes.push(format!(
            "Strong wind: {:.0} kt - challenging conditions",
            weather.wind_speed
        ));
    }

    (score.clamp(0.0, 100.0), notes)
}

fn score_waves(wave_height: f64, boat: &BoatProfile) -> (f64, Vec<String>) {
    let mut notes = Vec::new();
    let mut score: f64 = 100.0;

    if wave_height > boat.max_safe_wave_height {
        score -= 40.0;
        notes.push(format!(
            "Dangerous waves: {wave_height:.1} m exceeds safe limit"
        ));
    } else if wave_height > boat.max_safe_wave_height * 0.7 {
        score -= 20.0;
        notes.push(format!("Rough seas: {wave_height:.1} m waves"));
    } else if wave_height < 0.5 {
        score += 5.0;
    }

    (score.clamp(0.0, 100.0), notes)
}

fn score_visibility(weather: &WaypointWeather) -> (f64, Vec<String>) {
    let mut notes = Vec::new();
    let mut score: f64 = 100.0;

    if weather.visibility < 2.0 {
        score -= 30.0;
        notes.push("Poor visibility - fog or heavy precipitation".to_string());
    } else if weather.visibility < 5.0 {
        score -= 15.0;
        notes.push("Reduced visibility".to_string());
    }

    if weather.precipitation > 5.0 {
        score -= 20.0;
        notes.push("Heavy rain expected".to_string());
    } else if weather.precipitation > 1.0 {
        score -= 10.0;
        notes.push("Rain expected".to_string());
    }

    (score.clamp(0.0, 100.0), notes)
}

fn score_distance(route_distance: f64, direct_distance: f64) -> (f64, Vec<String>) {
    let mut notes = Vec::new();
    let mut score: f64 = 100.0;

    let ratio = route_distance / direct_distance.max(1e-6);
    if ratio > 1.2 {
        score -= 20.0;
        notes.push(format!(
            "{}% longer than direct route",
            ((ratio - 1.0) * 100.0) as i64
        ));
    } else if ratio > 1.1 {
        score -= 10.0;
        notes.push(format!(
            "{}% longer than direct route",
            ((ratio - 1.0) * 100.0) as i64
        ));
    } else if ratio <= 1.02 {
        notes.push("Most direct path".to_string());
    }

    (score, notes)
}

fn segment_bearings(waypoints: &[Waypoint]) -> Vec<f64> {
    waypoints
        .windows(2)
        .filter_map(|pair| geo::bearing_deg(pair[0].position, pair[1].position).ok())
        .collect()
}

/// Sailing-craft segments whose course lies inside the no-go zone for the
/// forecast wind. Flagged, never fatal: a route from another model may
/// legitimately carry such a segment and merely score poorly.
fn find_no_go_violations(waypoints: &[Waypoint], boat: BoatType) -> Vec<NoGoViolation> {
    if !boat.is_sailing_craft() {
        return Vec::new();
    }

    let bearings = segment_bearings(waypoints);
    let mut violations = Vec::new();
    for (segment, heading) in bearings.iter().enumerate() {
        let Some(weather) = waypoints[segment].weather.as_ref() else {
            continue;
        };
        let twa = geo::angle_diff(*heading, weather.wind_direction);
        if polar::in_no_go_zone(boat, twa) {
            violations.push(NoGoViolation {
                segment,
                heading: *heading,
                wind_angle: twa,
            });
        }
    }
    violations
}

struct WeatherSummary {
    avg_wind_speed: f64,
    avg_wave_height: f64,
    max_wave_height: f64,
    avg_visibility: f64,
    has_rain: bool,
}

fn summarize(waypoints: &[Waypoint]) -> Option<WeatherSummary> {
    let weathers: Vec<&WaypointWeather> =
        waypoints.iter().filter_map(|w| w.weather.as_ref()).collect();
    if weathers.is_empty() {
        return None;
    }
    let n = weathers.len() as f64;
    Some(WeatherSummary {
        avg_wind_speed: weathers.iter().map(|w| w.wind_speed).sum::<f64>() / n,
        avg_wave_height: weathers.iter().map(|w| w.wave_height).sum::<f64>() / n,
        max_wave_height: weathers.iter().map(|w| w.wave_height).fold(0.0, f64::max),
        avg_visibility: weathers.iter().map(|w| w.visibility).sum::<f64>() / n,
        has_rain: weathers.iter().any(|w| w.precipitation > 0.5),
    })
}

/// Score a candidate route against the passage's direct distance.
pub fn score_route(
    candidate: &GeneratedRoute,
    boat_type: BoatType,
    direct_distance_nm: f64,
    weights: &ScoreWeights,
) -> Route {
    let boat = BoatProfile::for_type(boat_type);
    let bearings = segment_bearings(&candidate.waypoints);

    let mut warnings: Vec<String> = Vec::new();
    let mut wind_total = 0.0;
    let mut wave_total = 0.0;
    let mut visibility_total = 0.0;
    let mut scored = 0usize;
    let mut estimated_count = 0usize;

    for (i, waypoint) in candidate.waypoints.iter().enumerate() {
        let Some(weather) = waypoint.weather.as_ref() else {
            continue;
        };
        if weather.is_estimated {
            estimated_count += 1;
        }

        let heading = if bearings.is_empty() {
            0.0
        } else {
            bearings[i.min(bearings.len() - 1)]
        };

        let (wind_score, wind_notes) = score_wind(weather, heading, boat);
        let (wave_score, wave_notes) = score_waves(weather.wave_height, boat);
        let (vis_score, vis_notes) = score_visibility(weather);
        wind_total += wind_score;
        wave_total += wave_score;
        visibility_total += vis_score;
        scored += 1;

        for note in wind_notes.into_iter().chain(wave_notes).chain(vis_notes) {
            let serious = note.contains("Dangerous") || note.contains("exceeds");
            if serious && !warnings.contains(&note) {
                warnings.push(note);
            }
        }
    }

    let (distance_score, _) = score_distance(candidate.distance_nm, direct_distance_nm);

    let (avg_wind, avg_wave, avg_vis) = if scored > 0 {
        let n = scored as f64;
        (wind_total / n, wave_total / n, visibility_total / n)
    } else {
        (50.0, 50.0, 50.0)
    };

    let final_score = avg_wind * weights.wind
        + avg_wave * weights.waves
        + avg_vis * weights.visibility
        + distance_score * weights.distance;

    let mut pros: Vec<String> = Vec::new();
    let mut cons: Vec<String> = Vec::new();
    if let Some(summary) = summarize(&candidate.waypoints) {
        if (8.0..=20.0).contains(&summary.avg_wind_speed) {
            pros.push("Good sailing wind".to_string());
        }
        if summary.avg_wave_height < 1.0 {
            pros.push("Calm seas".to_string());
        }
        if !summary.has_rain {
            pros.push("No rain expected".to_string());
        }
        if candidate.route_type == RouteType::Direct {
            pros.push("Shortest distance".to_string());
        }
        if summary.avg_visibility > 15.0 {
            pros.push("Excellent visibility".to_string());
        }

        if summary.avg_wind_speed < 5.0 && boat_type == BoatType::Sailboat {
            cons.push("May need motor - low wind".to_string());
        }
        if summary.max_wave_height > 2.0 {
            cons.push("Rough sections expected".to_string());
        }
        if summary.has_rain {
            cons.push("Rain expected on route".to_string());
        }
        if candidate.distance_nm > direct_distance_nm * 1.1 {
            cons.push("Longer route".to_string());
        }
    }
    if pros.is_empty() {
        pros.push("Standard conditions".to_string());
    }
    if cons.is_empty() {
        cons.push("No significant concerns".to_string());
    }

    if estimated_count > 0 {
        warnings.push(format!(
            "Weather data unavailable for {estimated_count} waypoint(s) - using estimates"
        ));
    }

    Route {
        name: candidate.name.clone(),
        route_type: candidate.route_type,
        score: final_score.clamp(0.0, 100.0).round() as u8,
        distance: (candidate.distance_nm * 10.0).round() / 10.0,
        estimated_time: route::format_duration(candidate.estimated_hours),
        estimated_hours: candidate.estimated_hours,
        waypoints: candidate.waypoints.clone(),
        warnings,
        pros,
        cons,
        no_go_zone_violations: find_no_go_violations(&candidate.waypoints, boat_type),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone, Utc};
    use passage_shared::Coordinate;

    fn weather(wind_speed: f64, wind_from: f64, wave: f64) -> WaypointWeather {
        WaypointWeather {
            wind_speed,
            wind_sustained: wind_speed,
            wind_gusts: wind_speed * 1.3,
            wind_direction: wind_from,
            wave_height: wave,
            precipitation: 0.0,
            visibility: 20.0,
            temperature: 15.0,
            is_estimated: false,
        }
    }

    /// Eastbound three-waypoint route with uniform weather attached.
    fn candidate(wind_from: f64, wind_speed: f64, wave: f64) -> GeneratedRoute {
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let positions = [
            Coordinate::new(50.0, -2.0),
            Coordinate::new(50.0, -1.0),
            Coordinate::new(50.0, 0.0),
        ];
        let waypoints: Vec<Waypoint> = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| Waypoint {
                position,
                estimated_arrival: t0 + TimeDelta::hours(i as i64 * 6),
                heading: (i > 0).then_some(90.0),
                weather: Some(weather(wind_speed, wind_from, wave)),
            })
            .collect();

        GeneratedRoute {
            name: "Test Route".to_string(),
            route_type: RouteType::Direct,
            waypoints,
            distance_nm: 77.0,
            estimated_hours: 12.0,
        }
    }

    #[test]
    fn beam_reach_in_fair_weather_scores_high() {
        let route = score_route(
            &candidate(0.0, 12.0, 0.8),
            BoatType::Sailboat,
            77.0,
            &ScoreWeights::default(),
        );
        assert!(route.score >= 80, "got {}", route.score);
        assert!(route.warnings.is_empty());
        assert!(route.no_go_zone_violations.is_empty());
        assert!(route.pros.contains(&"Good sailing wind".to_string()));
    }

    #[test]
    fn scoring_is_deterministic() {
        let generated = candidate(0.0, 12.0, 0.8);
        let a = score_route(&generated, BoatType::Sailboat, 77.0, &ScoreWeights::default());
        let b = score_route(&generated, BoatType::Sailboat, 77.0, &ScoreWeights::default());
        assert_eq!(a.score, b.score);
        assert_eq!(a.warnings, b.warnings);
        assert_eq!(a.pros, b.pros);
        assert_eq!(a.cons, b.cons);
    }

    #[test]
    fn storm_conditions_warn_and_depress_the_score() {
        // 40 kt and 3.5 m seas against a motorboat limited to 35 kt / 2.5 m
        let route = score_route(
            &candidate(180.0, 40.0, 3.5),
            BoatType::Motorboat,
            77.0,
            &ScoreWeights::default(),
        );
        let fair = score_route(
            &candidate(180.0, 15.0, 0.8),
            BoatType::Motorboat,
            77.0,
            &ScoreWeights::default(),
        );
        assert!(route.score < fair.score - 15);
        assert!(route
            .warnings
            .iter()
            .any(|w| w.contains("Dangerous wind")));
        assert!(route
            .warnings
            .iter()
            .any(|w| w.contains("Dangerous waves")));
        // motorboats have no no-go zone
        assert!(route.no_go_zone_violations.is_empty());
    }

    #[test]
    fn headwind_segments_are_flagged_as_violations() {
        // eastbound route, wind from due east: every segment is in the no-go
        let route = score_route(
            &candidate(90.0, 15.0, 1.0),
            BoatType::Sailboat,
            77.0,
            &ScoreWeights::default(),
        );
        assert_eq!(route.no_go_zone_violations.len(), 2);
        let violation = &route.no_go_zone_violations[0];
        assert_eq!(violation.segment, 0);
        assert!(violation.wind_angle < 45.0);
        // flagged but not zeroed
        assert!(route.score > 0);
    }

    #[test]
    fn long_detours_lose_distance_points() {
        let mut long = candidate(0.0, 12.0, 0.8);
        long.distance_nm = 100.0; // 30% over direct
        let direct = score_route(
            &candidate(0.0, 12.0, 0.8),
            BoatType::Sailboat,
            77.0,
            &ScoreWeights::default(),
        );
        let detour = score_route(&long, BoatType::Sailboat, 77.0, &ScoreWeights::default());
        assert!(detour.score < direct.score);
        assert!(detour.cons.contains(&"Longer route".to_string()));
    }

    #[test]
    fn estimated_weather_surfaces_a_warning() {
        let mut generated = candidate(0.0, 12.0, 0.8);
        if let Some(w) = generated.waypoints[1].weather.as_mut() {
            w.is_estimated = true;
        }
        let route = score_route(&generated, BoatType::Sailboat, 77.0, &ScoreWeights::default());
        assert!(route
            .warnings
            .iter()
            .any(|w| w.contains("using estimates")));
    }
}
