// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod airport_risk;
mod config;
mod player;
mod weather;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::SecondsFormat;
use clap::{Parser, Subcommand};
use log::{info, warn};
use stormtrack_engine::{
    flight_plan, AirportRiskLookup, Entity, InMemoryScene, StormTops, VisualizationOrchestrator,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use airport_risk::HttpRiskFeed;
use config::AppConfig;
use weather::HttpWeatherFeed;

#[derive(Parser)]
#[command(name = "stormtrack", version, about = "Replay filed flight routes against severe weather")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse an ICAO flight plan message and print its fields
    Parse {
        /// The FPL message, e.g. "(FPL-N123AB-VG -C172/L -KJFK1200 ... -KLAX0630 DOF/240615)"
        fpl: String,
    },
    /// Play a route file back against the storm cell service
    Play {
        /// Path to the GeoJSON route FeatureCollection
        #[arg(short, long, value_name = "FILE")]
        route: PathBuf,
        /// The FPL message the route was filed with
        #[arg(short, long)]
        fpl: String,
        /// Simulated seconds per wall-clock second
        #[arg(short, long)]
        multiplier: Option<f64>,
        /// Restart from departure when the route ends
        #[arg(long = "loop")]
        looped: bool,
        /// Fix the storm top sequence for reproducible runs
        #[arg(long)]
        seed: Option<u64>,
        /// Look up departure and destination risk before playing
        #[arg(long)]
        risk: bool,
    },
    /// Fetch the risk snapshot for an airport
    Risk {
        /// 4-letter location indicator, e.g. KJFK
        ident: String,
    },
    /// Print the configuration file location
    ConfigPath,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Parse { fpl } => print_flight_plan(&fpl),
        Command::Play {
            route,
            fpl,
            multiplier,
            looped,
            seed,
            risk,
        } => {
            let mut config = AppConfig::load()?;
            if let Some(multiplier) = multiplier {
                config.playback_multiplier = multiplier;
            }
            config.loop_playback |= looped;
            play(&config, &route, &fpl, seed, risk).await
        }
        Command::Risk { ident } => {
            let config = AppConfig::load()?;
            let feed = HttpRiskFeed::new(config.risk_url.clone(), config.resolve_api_key());
            let lookup = AirportRiskLookup::new(feed, &config.visualizer_config().risk);
            let snapshot = lookup.lookup(ident.to_ascii_uppercase()).await?;
            println!("{}: {}", ident.to_ascii_uppercase(), snapshot.classification);
            println!("  wind        {:5.1}%", snapshot.wind_risk);
            println!("  temperature {:5.1}%", snapshot.temperature_risk);
            println!("  pressure    {:5.1}%", snapshot.pressure_risk);
            println!("  visibility  {:5.1}%", snapshot.visibility_risk);
            Ok(())
        }
        Command::ConfigPath => {
            println!("{}", AppConfig::get_config_path()?.display());
            Ok(())
        }
    }
}

fn print_flight_plan(fpl: &str) -> Result<(), Box<dyn std::error::Error>> {
    let plan = flight_plan::parse(fpl)?;
    println!("callsign     {}", plan.callsign.as_deref().unwrap_or("-"));
    println!("aircraft     {}", plan.aircraft_type.as_deref().unwrap_or("-"));
    println!("departure    {}", plan.departure_id);
    println!("destination  {}", plan.destination_id);
    println!("off-block    {}", plan.departure_time_utc.to_rfc3339_opts(SecondsFormat::Secs, true));
    if let Some(arrival) = plan.estimated_arrival() {
        println!("arrival      {}", arrival.to_rfc3339_opts(SecondsFormat::Secs, true));
    }
    if !plan.route.is_empty() {
        println!("route        {}", plan.route.join(" "));
    }
    Ok(())
}

async fn play(
    config: &AppConfig,
    route_path: &Path,
    fpl: &str,
    seed: Option<u64>,
    show_risk: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let geometry = tokio::fs::read_to_string(route_path).await?;

    let api_key = config.resolve_api_key();
    if api_key.is_none() {
        warn!("No API key configured; requests are sent unauthenticated");
    }
    let weather = HttpWeatherFeed::new(config.weather_url.clone(), api_key.clone());
    let risk = HttpRiskFeed::new(config.risk_url.clone(), api_key);

    let mut viz = VisualizationOrchestrator::new(
        InMemoryScene::new(),
        weather,
        risk,
        &config.visualizer_config(),
    );
    if let Some(seed) = seed {
        viz = viz.with_storm_tops(StormTops::seeded(seed));
    }

    let session: Uuid = viz.visualize_str(fpl, &geometry)?;
    info!("Playing {} as session {}", route_path.display(), session);

    if show_risk {
        let airports: Vec<_> = viz
            .scene()
            .entities()
            .filter(|(_, e)| matches!(e, Entity::Airport { .. }))
            .map(|(handle, _)| handle)
            .collect();
        for handle in airports {
            match viz.on_pick(handle).await {
                Ok(snapshot) => info!(
                    "{} risk {} (peak {:.0}%)",
                    viz.risk_panel().ident().unwrap_or("?"),
                    snapshot.classification,
                    snapshot.peak()
                ),
                Err(e) => warn!("{}", e),
            }
        }
        viz.dismiss_risk_panel();
    }

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    let summary = player::run(&mut viz, config.tick_interval(), cancel_token).await;
    info!(
        "Playback {} after {} ticks: {} weather buckets, {} layer updates",
        if summary.cancelled { "stopped" } else { "finished" },
        summary.ticks,
        summary.buckets_entered,
        summary.weather_updates
    );
    viz.clear();
    Ok(())
}
