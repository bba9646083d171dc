//! Boat performance polars: tabulated (TWS, TWA) -> boat speed surfaces with
//! bilinear interpolation, plus the optimal-VMG heading scan.
//!
//! Wind angles are symmetric about the bow, so tables cover 0-180 and lookups
//! mirror. Sailing craft hold zero speed below the no-go threshold; the
//! motorboat curve depends on wind speed only and is capped at cruising speed.

use passage_shared::{BoatProfile, BoatType};

use crate::geo::{angle_diff, normalize_angle};

/// True wind speeds (knots) sampled by every table.
const TWS_ROWS: [f64; 7] = [6.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0];

/// True wind angles (degrees off the bow) sampled by the sailing tables.
const TWA_COLS: [f64; 11] = [
    0.0, 30.0, 45.0, 52.0, 60.0, 75.0, 90.0, 110.0, 135.0, 150.0, 180.0,
];

/// Cruising monohull. Peak speed on a broad reach around 110 degrees.
#[rustfmt::skip]
const SAILBOAT_SPEEDS: [[f64; 11]; 7] = [
    [0.0, 0.0, 0.0, 3.2, 3.8,  4.1,  4.3,  4.7,  4.5,  4.0, 3.5],
    [0.0, 0.0, 0.0, 5.5, 6.2,  6.8,  7.2,  7.8,  7.5,  6.8, 6.0],
    [0.0, 0.0, 0.0, 7.5, 8.2,  9.0,  9.5, 10.2,  9.8,  9.0, 8.0],
    [0.0, 0.0, 0.0, 8.5, 9.2, 10.0, 10.5, 11.0, 10.5,  9.5, 8.5],
    [0.0, 0.0, 0.0, 8.8, 9.5, 10.2, 10.8, 11.2, 10.8, 10.0, 9.0],
    [0.0, 0.0, 0.0, 9.0, 9.8, 10.5, 11.0, 11.5, 11.0, 10.2, 9.2],
    [0.0, 0.0, 0.0, 9.0, 9.5, 10.0, 10.5, 11.0, 10.5, 10.0, 9.0],
];

/// Cruising catamaran. Faster off the wind, can exceed wind speed reaching.
#[rustfmt::skip]
const CATAMARAN_SPEEDS: [[f64; 11]; 7] = [
    [0.0, 0.0, 0.0,  4.0,  4.8,  5.5,  6.0,  6.5,  6.2,  5.5,  5.0],
    [0.0, 0.0, 0.0,  7.0,  8.0,  9.0, 10.0, 11.0, 10.5,  9.5,  8.5],
    [0.0, 0.0, 0.0, 10.0, 11.5, 13.0, 14.5, 16.0, 15.5, 14.0, 12.5],
    [0.0, 0.0, 0.0, 12.0, 14.0, 16.0, 18.0, 20.0, 19.0, 17.0, 15.0],
    [0.0, 0.0, 0.0, 13.5, 15.5, 17.5, 19.5, 21.5, 20.5, 18.5, 16.5],
    [0.0, 0.0, 0.0, 14.0, 16.0, 18.0, 20.0, 22.0, 21.0, 19.0, 17.0],
    [0.0, 0.0, 0.0, 14.0, 16.0, 18.0, 20.0, 21.5, 20.5, 19.0, 17.0],
];

/// Motorboat hull speed against head seas, by wind speed. Heading-independent;
/// the profile's cruising speed caps the result.
const MOTORBOAT_SPEEDS: [f64; 7] = [18.0, 17.5, 17.0, 16.0, 15.0, 14.0, 12.0];

/// Boat speed in knots for the given true wind speed and wind angle.
///
/// TWA may be given in any convention; it is mirrored into [0, 180].
/// Wind speeds outside the tabulated range clamp to the nearest row.
pub fn boat_speed(boat: BoatType, tws: f64, twa: f64) -> f64 {
    if tws < 0.0 || !tws.is_finite() || !twa.is_finite() {
        return 0.0;
    }

    let twa = mirror_twa(twa);
    let profile = BoatProfile::for_type(boat);

    if boat == BoatType::Motorboat {
        let (i0, i1, f) = bracket(&TWS_ROWS, tws);
        let hull = lerp(MOTORBOAT_SPEEDS[i0], MOTORBOAT_SPEEDS[i1], f);
        return profile.avg_speed.min(hull);
    }

    if twa < profile.no_go_angle {
        return 0.0;
    }

    let speeds: &[[f64; 11]; 7] = match boat {
        BoatType::Sailboat => &SAILBOAT_SPEEDS,
        BoatType::Catamaran => &CATAMARAN_SPEEDS,
        BoatType::Motorboat => unreachable!(),
    };

    let (r0, r1, rf) = bracket(&TWS_ROWS, tws);
    let (c0, c1, cf) = bracket(&TWA_COLS, twa);

    let low = lerp(speeds[r0][c0], speeds[r0][c1], cf);
    let high = lerp(speeds[r1][c0], speeds[r1][c1], cf);
    lerp(low, high, rf)
}

/// Whether a wind angle is unsailable for the boat class.
pub fn in_no_go_zone(boat: BoatType, twa: f64) -> bool {
    let threshold = BoatProfile::for_type(boat).no_go_angle;
    threshold > 0.0 && mirror_twa(twa) < threshold
}

/// Fastest achievable speed at this wind strength over all wind angles.
pub fn max_speed_at(boat: BoatType, tws: f64) -> f64 {
    (0..=180)
        .map(|twa| boat_speed(boat, tws, twa as f64))
        .fold(0.0, f64::max)
}

/// Wind angle at which the boat is fastest for this wind strength.
pub fn peak_twa(boat: BoatType, tws: f64) -> f64 {
    let mut best_twa = 0.0;
    let mut best = 0.0;
    for twa in 0..=180 {
        let speed = boat_speed(boat, tws, twa as f64);
        if speed > best {
            best = speed;
            best_twa = twa as f64;
        }
    }
    best_twa
}

/// Heading that maximizes velocity made good toward the destination.
///
/// Scans headings at one-degree resolution; `vmg = speed * cos(offset to the
/// destination bearing)`. Ties prefer the heading closest to the destination
/// bearing. Returns `(destination_bearing, 0.0)` when every heading is
/// becalmed or unsailable.
pub fn optimal_vmg_heading(
    boat: BoatType,
    tws: f64,
    destination_bearing: f64,
    wind_from: f64,
) -> (f64, f64) {
    let mut best_heading = normalize_angle(destination_bearing);
    let mut best_vmg = 0.0;
    let mut best_deviation = f64::INFINITY;

    for h in 0..360 {
        let heading = h as f64;
        let twa = angle_diff(heading, wind_from);
        let speed = boat_speed(boat, tws, twa);
        if speed <= 0.0 {
            continue;
        }

        let deviation = angle_diff(heading, destination_bearing);
        let vmg = speed * deviation.to_radians().cos();
        if vmg > best_vmg + 1e-9 || (vmg > best_vmg - 1e-9 && deviation < best_deviation) {
            best_vmg = vmg;
            best_heading = heading;
            best_deviation = deviation;
        }
    }

    (best_heading, best_vmg)
}

fn mirror_twa(twa: f64) -> f64 {
    let a = normalize_angle(twa.abs());
    if a > 180.0 {
        360.0 - a
    } else {
        a
    }
}

/// Bracketing indices and interpolation fraction for `x` along an ascending
/// axis; clamps beyond either end.
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

fn lerp(a: f64, b: f64, f: f64) -> f64 {
    a + (b - a) * f
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_table_lookups() {
        assert!((boat_speed(BoatType::Sailboat, 10.0, 90.0) - 7.2).abs() < 1e-9);
        assert!((boat_speed(BoatType::Catamaran, 15.0, 110.0) - 16.0).abs() < 1e-9);
    }

    #[test]
    fn no_go_zone_returns_zero() {
        assert_eq!(boat_speed(BoatType::Sailboat, 10.0, 30.0), 0.0);
        assert_eq!(boat_speed(BoatType::Sailboat, 20.0, 44.9), 0.0);
        assert!(in_no_go_zone(BoatType::Sailboat, 30.0));
        assert!(!in_no_go_zone(BoatType::Sailboat, 52.0));
        assert!(!in_no_go_zone(BoatType::Motorboat, 0.0));
    }

    #[test]
    fn symmetry_about_the_bow() {
        for twa in [10.0, 52.0, 90.0, 135.0, 179.0] {
            let port = boat_speed(BoatType::Sailboat, 12.0, twa);
            let starboard = boat_speed(BoatType::Sailboat, 12.0, 360.0 - twa);
            assert!((port - starboard).abs() < 1e-12, "asymmetric at {twa}");
        }
    }

    #[test]
    fn interpolates_between_samples() {
        // between tws 10 (7.2) and 15 (9.5) at twa 90
        let s = boat_speed(BoatType::Sailboat, 12.0, 90.0);
        assert!(s > 7.2 && s < 9.5, "got {s}");

        // between twa 90 (7.2) and 110 (7.8) at tws 10
        let s = boat_speed(BoatType::Sailboat, 10.0, 95.0);
        assert!((s - 7.35).abs() < 1e-9, "got {s}");
    }

    #[test]
    fn wind_speed_clamps_outside_table() {
        assert!((boat_speed(BoatType::Sailboat, 2.0, 90.0) - 4.3).abs() < 1e-9);
        assert!((boat_speed(BoatType::Sailboat, 50.0, 90.0) - 10.5).abs() < 1e-9);
    }

    #[test]
    fn motorboat_ignores_wind_angle_and_caps_at_cruise() {
        let upwind = boat_speed(BoatType::Motorboat, 15.0, 0.0);
        let downwind = boat_speed(BoatType::Motorboat, 15.0, 180.0);
        assert_eq!(upwind, downwind);
        assert_eq!(upwind, 15.0); // capped at cruising speed

        // storm conditions dip below the cap
        let storm = boat_speed(BoatType::Motorboat, 35.0, 90.0);
        assert!((storm - 12.0).abs() < 1e-9);
    }

    #[test]
    fn vmg_dead_upwind_tacks_near_the_close_hauled_angle() {
        let (heading, vmg) = optimal_vmg_heading(BoatType::Sailboat, 15.0, 0.0, 0.0);
        assert!(
            angle_diff(heading, 52.0) < 1.0 || angle_diff(heading, 308.0) < 1.0,
            "got heading {heading}"
        );
        assert!(vmg > 4.0 && vmg < 5.5, "got vmg {vmg}");
    }

    #[test]
    fn vmg_beam_wind_sails_straight_at_the_goal() {
        let (heading, vmg) = optimal_vmg_heading(BoatType::Sailboat, 15.0, 0.0, 90.0);
        assert!(angle_diff(heading, 0.0) < 20.0, "got heading {heading}");
        assert!(vmg > 8.0, "got vmg {vmg}");
    }

    #[test]
    fn peak_twa_is_a_broad_reach() {
        let peak = peak_twa(BoatType::Sailboat, 15.0);
        assert!((100.0..=120.0).contains(&peak), "got {peak}");
    }

    #[test]
    fn max_speed_bounds_every_angle() {
        let max = max_speed_at(BoatType::Sailboat, 15.0);
        for twa in 0..=180 {
            assert!(boat_speed(BoatType::Sailboat, 15.0, twa as f64) <= max + 1e-9);
        }
        assert!((max - 10.2).abs() < 1e-9);
    }
}
