//! HTTP front door: `POST /calculate-routes` plus a health probe.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use passage_shared::RouteRequest;
use serde::Serialize;
use warp::http::StatusCode;
use warp::{path, Filter, Rejection, Reply};

use crate::error::{Rejected, RoutingError};
use crate::orchestrator;
use crate::weather::WeatherProvider;

pub async fn run(address: SocketAddr, provider: Arc<dyn WeatherProvider>) {
    log::info!("listening on {address}");
    warp::serve(routes(provider)).run(address).await
}

/// The full filter tree; split out so tests can drive it without a socket.
pub fn routes(
    provider: Arc<dyn WeatherProvider>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST"]);

    let health_route = path!("health").and(warp::get()).map(|| "OK");

    let calculate_route = path!("calculate-routes")
        .and(warp::post())
        .and(warp::body::content_length_limit(64 * 1024))
        .and(warp::body::json())
        .and(with_provider(provider))
        .and_then(calculate);

    health_route
        .or(calculate_route)
        .with(cors)
        .recover(rejection)
}

fn with_provider(
    provider: Arc<dyn WeatherProvider>,
) -> impl Filter<Extract = (Arc<dyn WeatherProvider>,), Error = Infallible> + Clone {
    warp::any().map(move || provider.clone())
}

async fn calculate(
    request: RouteRequest,
    provider: Arc<dyn WeatherProvider>,
) -> Result<impl Reply, Rejection> {
    let _ = orchestrator::calculate_routes(provider, request).await;
    Ok(warp::reply::json(&"ok"))
}

fn _assert_calculate_send() {
    fn is_send<T: Send>(_: T) {}
    let provider: Arc<dyn WeatherProvider> = unimplemented!();
    let req: RouteRequest = unimplemented!();
    is_send(calculate(req, provider));
}

#[derive(Serialize)]
struct ErrorMessage {
    code: u16,
    message: String,
}

async fn rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not found".to_string())
    } else if let Some(Rejected(e)) = err.find::<Rejected>() {
        if matches!(e, RoutingError::Internal(_)) {
            log::error!("internal error: {e}");
        }
        (e.status(), e.to_string())
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::MethodNotAllowed>() {
        (StatusCode::METHOD_NOT_ALLOWED, e.to_string())
    } else if let Some(e) = err.find::<warp::reject::PayloadTooLarge>() {
        (StatusCode::PAYLOAD_TOO_LARGE, format!("{e:?}"))
    } else {
        log::error!("unhandled rejection: {err:?}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal server error".to_string(),
        )
    };

    let json = warp::reply::json(&ErrorMessage {
        code: code.as_u16(),
        message,
    });
    Ok(warp::reply::with_status(json, code))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use futures::future::BoxFuture;
    use passage_shared::{Coordinate, WaypointWeather};

    use crate::weather::ProviderError;

    struct UniformProvider;

    impl WeatherProvider for UniformProvider {
        fn fetch_points<'a>(
            &'a self,
            points: &'a [Coordinate],
            times: &'a [DateTime<Utc>],
        ) -> BoxFuture<'a, Result<Vec<Vec<WaypointWeather>>, ProviderError>> {
            let sample = WaypointWeather {
                wind_speed: 12.0,
                wind_sustained: 12.0,
                wind_gusts: 15.0,
                wind_direction: 0.0,
                wave_height: 1.0,
                precipitation: 0.0,
                visibility: 20.0,
                temperature: 15.0,
                is_estimated: false,
            };
            let series = vec![vec![sample; times.len()]; points.len()];
            Box::pin(async move { Ok(series) })
        }
    }

    struct DownProvider;

    impl WeatherProvider for DownProvider {
        fn fetch_points<'a>(
            &'a self,
            _points: &'a [Coordinate],
            _times: &'a [DateTime<Utc>],
        ) -> BoxFuture<'a, Result<Vec<Vec<WaypointWeather>>, ProviderError>> {
            Box::pin(async move {
                Err(ProviderError::Unavailable("connection refused".to_string()))
            })
        }
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let filter = routes(Arc::new(UniformProvider));
        let response = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request() {
        let filter = routes(Arc::new(UniformProvider));
        let response = warp::test::request()
            .method("POST")
            .path("/calculate-routes")
            .body("{\"start\": \"not a coordinate\"}")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn degenerate_route_is_a_bad_request() {
        let filter = routes(Arc::new(UniformProvider));
        let body = serde_json::json!({
            "start": {"lat": 50.0, "lng": -1.0},
            "end": {"lat": 50.0, "lng": -1.0},
            "boat_type": "sailboat",
            "departure_time": "2024-06-01T08:00:00Z"
        });
        let response = warp::test::request()
            .method("POST")
            .path("/calculate-routes")
            .json(&body)
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn provider_failure_maps_to_bad_gateway() {
        let filter = routes(Arc::new(DownProvider));
        let body = serde_json::json!({
            "start": {"lat": 50.0, "lng": -2.0},
            "end": {"lat": 50.0, "lng": -1.0},
            "boat_type": "sailboat",
            "departure_time": "2024-06-01T08:00:00Z"
        });
        let response = warp::test::request()
            .method("POST")
            .path("/calculate-routes")
            .json(&body)
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
