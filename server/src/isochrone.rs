//! Time-stepped isochrone search.
//!
//! Each wave expands the reachable frontier by trying a fan of headings from
//! every surviving point, then prunes the candidates down to one
//! representative per grid cell plus the Pareto front of
//! (distance-to-goal, miles sailed). Parent links use arena indices
//! `(wave, slot)`, so reconstruction is an index walk and cancellation just
//! drops the arena.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, TimeDelta, Utc};
use passage_shared::{BoatType, Coordinate, Waypoint};
use rayon::prelude::*;

use crate::geo::{self, GeoError};
use crate::grid::WeatherGrid;
use crate::hybrid::SailingScenario;
use crate::polar;
use crate::route::{self, GeneratedRoute};

#[derive(Clone, Debug)]
pub struct SearchConfig {
    /// Wave interval in hours.
    pub time_step_hours: f64,
    /// Heading fan resolution in degrees.
    pub angular_step_deg: f64,
    /// Pruning cell size in degrees (~6 nm at mid-latitudes at the default).
    pub prune_cell_deg: f64,
    /// Time bucket for pruning, hours.
    pub time_bucket_hours: f64,
    /// Directional cone around the initial goal bearing. Disabled for upwind
    /// passages, where tacking must leave the cone.
    pub cone_enabled: bool,
    pub cone_max_deg: f64,
    pub cone_min_deg: f64,
    /// How fast the cone narrows with progress toward the goal.
    pub cone_narrowing: f64,
    /// Arrival tolerance in nautical miles.
    pub goal_tolerance_nm: f64,
    /// Headings slower than this are not worth a child.
    pub min_speed_kt: f64,
    /// A child must close at least this fraction of its step length.
    pub min_progress_factor: f64,
    pub max_waves: u32,
    pub max_points_per_wave: usize,
    /// Waves to keep searching after the first arrival, for alternates.
    pub extra_waves_after_arrival: u32,
    pub wall_time: Duration,
    /// Hard stop shared with the enclosing request. When it fires the search
    /// exits at the next wave boundary, even if `wall_time` has budget left.
    pub deadline: Option<Instant>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        SearchConfig {
            time_step_hours: 1.0,
            angular_step_deg: 10.0,
            prune_cell_deg: 0.1,
            time_bucket_hours: 1.0,
            cone_enabled: true,
            cone_max_deg: 90.0,
            cone_min_deg: 30.0,
            cone_narrowing: 0.75,
            goal_tolerance_nm: 5.0,
            min_speed_kt: 0.1,
            min_progress_factor: 0.05,
            max_waves: 240,
            max_points_per_wave: 2000,
            extra_waves_after_arrival: 2,
            wall_time: Duration::from_secs(20),
            deadline: None,
        }
    }
}

impl SearchConfig {
    /// Tune the search for one passage: the time step shrinks until the
    /// direct path spans at least 8 waves, upwind passages drop the cone and
    /// halve the pruning cell, long passages coarsen it.
    pub fn for_passage(
        direct_distance_nm: f64,
        avg_speed_kt: f64,
        scenario: SailingScenario,
    ) -> Self {
        let mut config = SearchConfig::default();

        let direct_hours = direct_distance_nm / avg_speed_kt.max(0.1);
        config.time_step_hours = (direct_hours / 8.0).clamp(0.25, config.time_step_hours);
        config.time_bucket_hours = config.time_step_hours;

        if scenario == SailingScenario::Upwind {
            config.cone_enabled = false;
            config.prune_cell_deg = 0.05;
        } else if direct_distance_nm > 300.0 {
            config.prune_cell_deg = 0.2;
        }

        config
    }
}

/// One reachable position at a wave boundary.
#[derive(Clone, Copy, Debug)]
pub struct IsochronePoint {
    pub position: Coordinate,
    pub time_hours: f64,
    /// Primary objective; equals elapsed time.
    pub cost: f64,
    /// Total miles through the water; layered cost term for pruning.
    pub sailed_nm: f64,
    pub distance_to_goal: f64,
    /// Arena reference `(wave, slot)`; the origin has none.
    pub parent: Option<(u32, u32)>,
    /// Heading sailed from the parent.
    pub heading: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Termination {
    /// Arrived and finished gathering alternates.
    Reconstructed,
    /// Frontier went empty before arrival.
    Exhausted,
    /// Wall clock or wave cap hit.
    Timeout,
    /// No productive heading from the origin.
    Unreachable,
}

#[derive(Clone, Debug)]
pub struct SearchReport {
    pub termination: Termination,
    pub waves: u32,
    pub expanded_points: u64,
    pub closest_approach_nm: f64,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub routes: Vec<GeneratedRoute>,
    pub report: SearchReport,
}

pub struct IsochroneSearch<'a> {
    grid: &'a WeatherGrid,
    boat: BoatType,
    start: Coordinate,
    goal: Coordinate,
    departure: DateTime<Utc>,
    config: SearchConfig,
}

impl<'a> IsochroneSearch<'a> {
    pub fn new(
        grid: &'a WeatherGrid,
        boat: BoatType,
        start: Coordinate,
        goal: Coordinate,
        departure: DateTime<Utc>,
        config: SearchConfig,
    ) -> Self {
        Self {
            grid,
            boat,
            start,
            goal,
            departure,
            config,
        }
    }

    pub fn run(&self) -> Result<SearchOutcome, GeoError> {
        let initial_bearing = geo::bearing_deg(self.start, self.goal)?;
        let initial_distance = geo::distance_nm(self.start, self.goal)?;

        let origin = IsochronePoint {
            position: self.start,
            time_hours: 0.0,
            cost: 0.0,
            sailed_nm: 0.0,
            distance_to_goal: initial_distance,
            parent: None,
            heading: None,
        };

        let mut waves: Vec<Vec<IsochronePoint>> = vec![vec![origin]];
        let mut solutions: Vec<(u32, u32)> = Vec::new();
        let mut closest = initial_distance;
        let mut expanded: u64 = 0;
        let mut stop_at_wave: Option<u32> = None;
        let mut deadline = Instant::now() + self.config.wall_time;
        if let Some(request_deadline) = self.config.deadline {
            deadline = deadline.min(request_deadline);
        }

        let termination = loop {
            let wave_index = waves.len() as u32;
            if let Some(stop) = stop_at_wave {
                if wave_index > stop {
                    break Termination::Reconstructed;
                }
            }
            if wave_index > self.config.max_waves || Instant::now() >= deadline {
                break Termination::Timeout;
            }

            let parent_wave = wave_index - 1;
            let parents = &waves[parent_wave as usize];
            let mut children: Vec<IsochronePoint> = parents
                .par_iter()
                .enumerate()
                .flat_map_iter(|(slot, p)| {
                    self.expand(
                        parent_wave,
                        slot as u32,
                        p,
                        initial_bearing,
                        initial_distance,
                        self.config.cone_enabled,
                    )
                })
                .collect();

            if children.is_empty() && wave_index == 1 && self.config.cone_enabled {
                // hemmed in at the origin: one more attempt with the cone off
                children = parents
                    .par_iter()
                    .enumerate()
                    .flat_map_iter(|(slot, p)| {
                        self.expand(parent_wave, slot as u32, p, initial_bearing, initial_distance, false)
                    })
                    .collect();
            }
            expanded += children.len() as u64;

            if children.is_empty() {
                break if wave_index == 1 {
                    Termination::Unreachable
                } else {
                    Termination::Exhausted
                };
            }

            let wave = prune(&self.config, children);
            let mut arrived = false;
            for (slot, point) in wave.iter().enumerate() {
                closest = closest.min(point.distance_to_goal);
                if point.distance_to_goal <= self.config.goal_tolerance_nm {
                    solutions.push((wave_index, slot as u32));
                    arrived = true;
                }
            }
            log::debug!(
                "wave {wave_index}: {} points, closest {:.1} nm",
                wave.len(),
                closest
            );
            waves.push(wave);

            if arrived && stop_at_wave.is_none() {
                stop_at_wave = Some(wave_index + self.config.extra_waves_after_arrival);
            }
        };

        let routes = self.reconstruct(&waves, &solutions)?;
        let report = SearchReport {
            termination,
            waves: waves.len() as u32 - 1,
            expanded_points: expanded,
            closest_approach_nm: closest,
        };
        log::info!(
            "isochrone search: {:?} after {} waves, {} routes, closest {:.1} nm",
            report.termination,
            report.waves,
            routes.len(),
            report.closest_approach_nm
        );

        Ok(SearchOutcome { routes, report })
    }

    /// Fan out from one parent. Returns all children that survive the cone,
    /// the polar, and the progress gate.
    fn expand(
        &self,
        parent_wave: u32,
        slot: u32,
        p: &IsochronePoint,
        initial_bearing: f64,
        initial_distance: f64,
        cone_enabled: bool,
    ) -> Vec<IsochronePoint> {
        let time = self.departure + hours_delta(p.time_hours);
        let weather = self.grid.at(p.position, time);
        let dt = self.config.time_step_hours;

        let progress = (1.0 - p.distance_to_goal / initial_distance.max(1e-6)).clamp(0.0, 1.0);
        let cone_half = if cone_enabled {
            (self.config.cone_max_deg * (1.0 - progress * self.config.cone_narrowing))
                .max(self.config.cone_min_deg)
        } else {
            180.0
        };

        let step = self.config.angular_step_deg.max(1.0);
        let headings: Vec<f64> = (0..(360.0 / step) as usize)
            .map(|i| i as f64 * step)
            .collect();

        let mut children = Vec::new();
        let mut sailable_in_cone = false;

        for &heading in &headings {
            let twa = geo::angle_diff(heading, weather.wind_direction);
            let speed = polar::boat_speed(self.boat, weather.wind_speed, twa);
            let in_cone = geo::angle_diff(heading, initial_bearing) <= cone_half;

            if !in_cone {
                continue;
            }
            if speed < self.config.min_speed_kt {
                continue;
            }
            sailable_in_cone = true;
            if let Some(child) = self.child_for(p, parent_wave, slot, heading, speed, dt) {
                children.push(child);
            }
        }

        // Tack exception: the whole cone is no-go or becalmed, but an
        // off-cone heading still makes positive VMG toward the goal.
        if cone_enabled && !sailable_in_cone {
            let to_goal = geo::bearing_deg(p.position, self.goal).unwrap_or(initial_bearing);
            for &heading in &headings {
                if geo::angle_diff(heading, initial_bearing) <= cone_half {
                    continue;
                }
                if geo::angle_diff(heading, to_goal) >= 90.0 {
                    continue;
                }
                let twa = geo::angle_diff(heading, weather.wind_direction);
                let speed = polar::boat_speed(self.boat, weather.wind_speed, twa);
                if speed < self.config.min_speed_kt {
                    continue;
                }
                if let Some(child) = self.child_for(p, parent_wave, slot, heading, speed, dt) {
                    children.push(child);
                }
            }
        }

        children
    }

    fn child_for(
        &self,
        p: &IsochronePoint,
        parent_wave: u32,
        slot: u32,
        heading: f64,
        speed: f64,
        dt: f64,
    ) -> Option<IsochronePoint> {
        let leg_nm = speed * dt;
        let position = geo::destination(p.position, heading, leg_nm).ok()?;
        let distance_to_goal = geo::distance_nm(position, self.goal).ok()?;

        // progress gate: must close on the goal by a fraction of the leg
        let min_progress = self.config.min_progress_factor * leg_nm;
        if distance_to_goal > p.distance_to_goal - min_progress {
            return None;
        }

        Some(IsochronePoint {
            position,
            time_hours: p.time_hours + dt,
            cost: p.cost + dt,
            sailed_nm: p.sailed_nm + leg_nm,
            distance_to_goal,
            parent: Some((parent_wave, slot)),
            heading: Some(heading),
        })
    }

    /// Walk parent links for each solution, newest first, and produce up to
    /// three distinct route skeletons.
    fn reconstruct(
        &self,
        waves: &[Vec<IsochronePoint>],
        solutions: &[(u32, u32)],
    ) -> Result<Vec<GeneratedRoute>, GeoError> {
        let mut arrivals: Vec<&IsochronePoint> = solutions
            .iter()
            .map(|&(wave, slot)| &waves[wave as usize][slot as usize])
            .collect();
        arrivals.sort_by(|a, b| {
            a.cost
                .total_cmp(&b.cost)
                .then(a.distance_to_goal.total_cmp(&b.distance_to_goal))
                .then(a.sailed_nm.total_cmp(&b.sailed_nm))
        });

        let mut routes: Vec<GeneratedRoute> = Vec::new();
        for arrival in arrivals {
            if routes.len() >= 3 {
                break;
            }

            let waypoints = self.chain_to_waypoints(waves, arrival);
            let near_duplicate = routes.iter().any(|kept| {
                let cost_gap = (arrival.time_hours - kept.estimated_hours).abs()
                    / kept.estimated_hours.max(1e-6);
                cost_gap < 0.01 && paths_similar(&kept.waypoints, &waypoints)
            });
            if near_duplicate {
                continue;
            }

            let name = match routes.len() {
                0 => "Isochrone Fastest".to_string(),
                n => format!("Isochrone Alternate {n}"),
            };
            let route_type = route::classify_side(self.start, self.goal, &waypoints)?;
            routes.push(GeneratedRoute {
                name,
                route_type,
                waypoints,
                distance_nm: arrival.sailed_nm,
                estimated_hours: arrival.time_hours,
            });
        }

        Ok(routes)
    }

    fn chain_to_waypoints(
        &self,
        waves: &[Vec<IsochronePoint>],
        arrival: &IsochronePoint,
    ) -> Vec<Waypoint> {
        let mut chain = vec![*arrival];
        let mut cursor = arrival.parent;
        while let Some((wave, slot)) = cursor {
            let point = &waves[wave as usize][slot as usize];
            chain.push(*point);
            cursor = point.parent;
        }
        chain.reverse();

        chain
            .into_iter()
            .map(|point| Waypoint {
                position: point.position,
                estimated_arrival: self.departure + hours_delta(point.time_hours),
                heading: point.heading,
                weather: None,
            })
            .collect()
    }
}

/// Three-stage pruning: best child per (cell, time bucket), then the Pareto
/// front of (distance-to-goal, miles sailed), then the per-wave cap, nearest
/// first. Output order is deterministic.
fn prune(config: &SearchConfig, children: Vec<IsochronePoint>) -> Vec<IsochronePoint> {
    let cell = config.prune_cell_deg.max(1e-6);
    let bucket = config.time_bucket_hours.max(1e-6);

    let mut best: HashMap<(i64, i64, i64), IsochronePoint> =
        HashMap::with_capacity(children.len());
    for child in children {
        let key = (
            (child.position.lat / cell).floor() as i64,
            (child.position.lng / cell).floor() as i64,
            (child.time_hours / bucket).floor() as i64,
        );
        match best.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(child);
            }
            Entry::Occupied(mut entry) => {
                let kept = entry.get();
                let better = child
                    .cost
                    .total_cmp(&kept.cost)
                    .then(child.distance_to_goal.total_cmp(&kept.distance_to_goal))
                    .then(child.sailed_nm.total_cmp(&kept.sailed_nm))
                    .is_lt();
                if better {
                    entry.insert(child);
                }
            }
        }
    }

    let mut kept: Vec<IsochronePoint> = best.into_values().collect();
    kept.sort_by(|a, b| {
        a.cost
            .total_cmp(&b.cost)
            .then(a.sailed_nm.total_cmp(&b.sailed_nm))
            .then(a.distance_to_goal.total_cmp(&b.distance_to_goal))
            .then(a.position.lat.total_cmp(&b.position.lat))
            .then(a.position.lng.total_cmp(&b.position.lng))
    });

    // dominance sweep: cheaper-or-equal points that are strictly closer to
    // the goal eliminate the rest
    let mut frontier: Vec<IsochronePoint> = Vec::with_capacity(kept.len());
    let mut min_distance = f64::INFINITY;
    for point in kept {
        if point.distance_to_goal <= min_distance {
            min_distance = min_distance.min(point.distance_to_goal);
            frontier.push(point);
        }
    }

    if frontier.len() > config.max_points_per_wave {
        frontier.sort_by(|a, b| {
            a.distance_to_goal
                .total_cmp(&b.distance_to_goal)
                .then(a.cost.total_cmp(&b.cost))
                .then(a.sailed_nm.total_cmp(&b.sailed_nm))
        });
        frontier.truncate(config.max_points_per_wave);
    }

    frontier
}

fn paths_similar(a: &[Waypoint], b: &[Waypoint]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| {
        geo::distance_nm(x.position, y.position)
            .map(|d| d < 10.0)
            .unwrap_or(false)
    })
}

fn hours_delta(hours: f64) -> TimeDelta {
    TimeDelta::seconds((hours * 3600.0).round() as i64)
}
