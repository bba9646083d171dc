//! Service configuration from `PASSAGE_*` environment variables.
//!
//! Every knob has a default, so an empty environment works out of the box;
//! `validate()` runs at startup to fail fast on malformed values.

use once_cell::sync::Lazy;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    /// Whole-request deadline in seconds.
    #[serde(default = "default_request_deadline_secs")]
    pub request_deadline_secs: u64,
    /// Wall-clock budget for one isochrone search, seconds.
    #[serde(default = "default_search_wall_time_secs")]
    pub search_wall_time_secs: u64,
    /// Per-batch provider timeout, seconds.
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,
    /// How many scored routes a response carries.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_request_deadline_secs() -> u64 {
    30
}

fn default_search_wall_time_secs() -> u64 {
    20
}

fn default_provider_timeout_secs() -> u64 {
    15
}

fn default_top_k() -> usize {
    3
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            request_deadline_secs: default_request_deadline_secs(),
            search_wall_time_secs: default_search_wall_time_secs(),
            provider_timeout_secs: default_provider_timeout_secs(),
            top_k: default_top_k(),
        }
    }
}

pub static CONFIG: Lazy<ServiceConfig> = Lazy::new(|| {
    if cfg!(test) {
        return ServiceConfig::default();
    }
    envy::prefixed("PASSAGE_")
        .from_env::<ServiceConfig>()
        .expect("Invalid PASSAGE_* configuration")
});

pub fn config() -> &'static ServiceConfig {
    &CONFIG
}

/// Fail fast on malformed env vars instead of poisoning the lazy cell later.
pub fn validate() {
    if cfg!(test) {
        return;
    }
    if let Err(e) = envy::prefixed("PASSAGE_").from_env::<ServiceConfig>() {
        eprintln!("ERROR: invalid PASSAGE_* configuration: {e}");
        std::process::exit(1);
    }
    let cfg = config();
    log::info!(
        "configuration: request deadline {}s, search wall time {}s, top {}",
        cfg.request_deadline_secs,
        cfg.search_wall_time_secs,
        cfg.top_k
    );
}
