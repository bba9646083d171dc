use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use passage_server::cli::{parse_coordinate, Cli, Command};
use passage_server::weather::OpenMeteoProvider;
use passage_server::{config, orchestrator, server};
use passage_shared::{BoatType, RouteRequest};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();
    config::validate();

    let args = Cli::parse();
    let provider = Arc::new(OpenMeteoProvider::new(Duration::from_secs(
        config::config().provider_timeout_secs,
    )));

    match args.cmd {
        Command::Http { address } => server::run(address, provider).await,
        Command::Plan {
            from,
            to,
            boat,
            departure,
        } => {
            let request = RouteRequest {
                start: parse_coordinate(&from)?,
                end: parse_coordinate(&to)?,
                boat_type: boat.parse::<BoatType>().map_err(anyhow::Error::msg)?,
                departure_time: match departure {
                    Some(s) => s.parse().context("invalid departure time")?,
                    None => chrono::Utc::now(),
                },
            };
            let response = orchestrator::calculate_routes(provider, request).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
    }

    Ok(())
}
