//! Request orchestration: validate, fetch the grid, run both routing
//! pipelines in parallel, score everything, return the top candidates.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use passage_shared::{BoatProfile, RouteRequest, RouteResponse};
use tokio::task;
use tokio::time::timeout;

use crate::config;
use crate::error::RoutingError;
use crate::geo;
use crate::grid::{self, GridSpec, WeatherGrid};
use crate::hybrid;
use crate::isochrone::{IsochroneSearch, SearchConfig, Termination};
use crate::route::{self, GeneratedRoute};
use crate::scorer::{self, ScoreWeights};
use crate::weather::WeatherProvider;

/// Handle one routing request end to end, under the request deadline.
///
/// The same deadline is threaded into the searches, so when it fires any
/// in-flight search is cancelled cooperatively at its next wave boundary
/// rather than running on in the blocking pool.
pub async fn calculate_routes(
    provider: Arc<dyn WeatherProvider>,
    request: RouteRequest,
) -> Result<RouteResponse, RoutingError> {
    let budget = Duration::from_secs(config::config().request_deadline_secs);
    let deadline = Instant::now() + budget;
    match timeout(budget, calculate_inner(provider, request, deadline)).await {
        Ok(result) => result,
        Err(_) => Err(RoutingError::ProviderTimeout(
            "request deadline expired".to_string(),
        )),
    }
}

async fn calculate_inner(
    provider: Arc<dyn WeatherProvider>,
    request: RouteRequest,
    deadline: Instant,
) -> Result<RouteResponse, RoutingError> {
    let cfg = config::config();

    let direct_distance = geo::distance_nm(request.start, request.end)
        .map_err(|e| RoutingError::BadRequest(e.to_string()))?;
    if direct_distance < 5.0 {
        return Err(RoutingError::BadRequest(
            "start and end are the same point".to_string(),
        ));
    }

    let profile = BoatProfile::for_type(request.boat_type);
    let forecast_hours = grid::forecast_hours_needed(direct_distance, profile.avg_speed);

    log::info!(
        "routing {:.1} nm for a {} departing {}",
        direct_distance,
        request.boat_type,
        request.departure_time
    );

    let grid = WeatherGrid::fetch(
        provider.as_ref(),
        request.start,
        request.end,
        request.departure_time,
        forecast_hours,
        &GridSpec::default(),
    )
    .await
    .map_err(RoutingError::from)?;
    let grid = Arc::new(grid);

    // classify once at the origin; it gates the isochrone's cone and cell
    let rhumb = geo::bearing_deg(request.start, request.end)
        .map_err(|e| RoutingError::Internal(e.to_string()))?;
    let origin_wind = grid.at(request.start, request.departure_time).wind_direction;
    let scenario = hybrid::classify_scenario(rhumb, origin_wind);

    let mut search_config =
        SearchConfig::for_passage(direct_distance, profile.avg_speed, scenario);
    search_config.wall_time = Duration::from_secs(cfg.search_wall_time_secs);
    // whatever the grid fetch left of the request budget caps the search
    search_config.deadline = Some(deadline);

    // both pipelines are CPU-bound and share the read-only grid
    let isochrone_task = {
        let grid = Arc::clone(&grid);
        let request = request.clone();
        task::spawn_blocking(move || {
            IsochroneSearch::new(
                &grid,
                request.boat_type,
                request.start,
                request.end,
                request.departure_time,
                search_config,
            )
            .run()
        })
    };
    let hybrid_task = {
        let grid = Arc::clone(&grid);
        let request = request.clone();
        task::spawn_blocking(move || {
            hybrid::generate_routes(
                &grid,
                request.boat_type,
                request.start,
                request.end,
                request.departure_time,
            )
        })
    };

    let (isochrone_result, hybrid_result) = tokio::join!(isochrone_task, hybrid_task);

    let hybrid_routes: Vec<GeneratedRoute> = hybrid_result
        .map_err(|e| RoutingError::Internal(format!("hybrid task panicked: {e}")))?
        .map_err(|e| RoutingError::Internal(format!("hybrid generation failed: {e}")))?;

    // isochrone candidates first so score ties resolve toward the optimal
    // pipeline
    let mut candidates: Vec<GeneratedRoute> = Vec::new();
    let mut diagnostics = None;
    match isochrone_routes(isochrone_result) {
        Ok(routes) => candidates.extend(routes),
        Err(search_error) => {
            // non-fatal while the hybrid pipeline delivered something
            log::warn!("isochrone search came back empty: {search_error}");
            diagnostics = Some(search_error.to_string());
        }
    }
    candidates.extend(hybrid_routes);

    if candidates.is_empty() {
        return Ok(RouteResponse {
            routes: Vec::new(),
            weather_grid: grid.to_view(),
            calculated_at: Utc::now(),
            diagnostics: diagnostics
                .or_else(|| Some("no viable routes found".to_string())),
        });
    }

    let weights = ScoreWeights::default();
    let mut scored: Vec<_> = candidates
        .into_iter()
        .map(|mut candidate| {
            route::attach_weather(&mut candidate, &grid);
            scorer::score_route(&candidate, request.boat_type, direct_distance, &weights)
        })
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.estimated_hours.total_cmp(&b.estimated_hours))
    });
    scored.truncate(cfg.top_k);

    for route in &scored {
        log::info!(
            "  {} ({:?}): {}/100, {:.1} nm, {}",
            route.name,
            route.route_type,
            route.score,
            route.distance,
            route.estimated_time
        );
    }

    Ok(RouteResponse {
        routes: scored,
        weather_grid: grid.to_view(),
        calculated_at: Utc::now(),
        diagnostics,
    })
}

/// Map a finished search onto routes, or onto the error kind its empty
/// outcome represents.
fn isochrone_routes(
    joined: Result<Result<crate::isochrone::SearchOutcome, geo::GeoError>, task::JoinError>,
) -> Result<Vec<GeneratedRoute>, RoutingError> {
    let outcome = joined
        .map_err(|e| RoutingError::Internal(format!("isochrone task panicked: {e}")))?
        .map_err(|e| RoutingError::Internal(format!("isochrone search failed: {e}")))?;

    if !outcome.routes.is_empty() {
        return Ok(outcome.routes);
    }
    match outcome.report.termination {
        Termination::Unreachable => Err(RoutingError::Unreachable),
        Termination::Timeout | Termination::Exhausted | Termination::Reconstructed => {
            Err(RoutingError::SearchTimeout)
        }
    }
}
