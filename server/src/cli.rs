use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use passage_shared::Coordinate;

#[derive(Debug, Parser)]
#[command(about = "Passage weather routing service.")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the HTTP API
    Http {
        #[arg(long, env = "PASSAGE_SERVER_ADDRESS", default_value = "127.0.0.1:3000")]
        address: SocketAddr,
    },
    /// Compute routes once and print the JSON response
    Plan {
        /// Start position as "lat,lng"
        #[arg(long)]
        from: String,
        /// End position as "lat,lng"
        #[arg(long)]
        to: String,
        /// Boat class: sailboat, motorboat or catamaran
        #[arg(long, default_value = "sailboat")]
        boat: String,
        /// RFC3339 departure time; defaults to now
        #[arg(long)]
        departure: Option<String>,
    },
}

/// Parse a "lat,lng" pair.
pub fn parse_coordinate(s: &str) -> anyhow::Result<Coordinate> {
    let (lat, lng) = s
        .split_once(',')
        .ok_or_else(|| anyhow::anyhow!("expected \"lat,lng\", got {s:?}"))?;
    Ok(Coordinate {
        lat: lat.trim().parse()?,
        lng: lng.trim().parse()?,
    })
}
