//! Request-level error kinds and their HTTP mapping.

use thiserror::Error;
use warp::http::StatusCode;

use crate::weather::ProviderError;

#[derive(Debug, Error)]
pub enum RoutingError {
    /// Malformed or out-of-range input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// The weather provider failed; the request cannot proceed.
    #[error("weather provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// The weather provider (or the request deadline) timed out.
    #[error("weather provider timed out: {0}")]
    ProviderTimeout(String),
    /// No productive heading from the origin.
    #[error("destination unreachable from origin")]
    Unreachable,
    /// Search caps hit before any solution was found.
    #[error("route search timed out before finding a solution")]
    SearchTimeout,
    #[error("internal error: {0}")]
    Internal(String),
}

impl RoutingError {
    pub fn status(&self) -> StatusCode {
        match self {
            RoutingError::BadRequest(_) => StatusCode::BAD_REQUEST,
            RoutingError::ProviderUnavailable(_) => StatusCode::BAD_GATEWAY,
            RoutingError::ProviderTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            // surfaced only when no pipeline produced anything; the
            // orchestrator normally downgrades these to an empty 200
            RoutingError::Unreachable | RoutingError::SearchTimeout => StatusCode::OK,
            RoutingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ProviderError> for RoutingError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Unavailable(msg) => RoutingError::ProviderUnavailable(msg),
            ProviderError::Timeout(msg) => RoutingError::ProviderTimeout(msg),
        }
    }
}

/// Wrapper so a `RoutingError` can travel through warp's rejection machinery.
#[derive(Debug)]
pub struct Rejected(pub RoutingError);

impl warp::reject::Reject for Rejected {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_the_api_contract() {
        assert_eq!(
            RoutingError::BadRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            RoutingError::ProviderUnavailable("x".into()).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RoutingError::ProviderTimeout("x".into()).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            RoutingError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn provider_errors_convert() {
        let e: RoutingError = ProviderError::Unavailable("down".into()).into();
        assert!(matches!(e, RoutingError::ProviderUnavailable(_)));
        let e: RoutingError = ProviderError::Timeout("slow".into()).into();
        assert!(matches!(e, RoutingError::ProviderTimeout(_)));
    }
}
