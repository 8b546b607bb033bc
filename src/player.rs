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

//! Headless playback driver.
//!
//! Ticks a loaded visualization on a fixed interval, applies weather as it
//! arrives and logs what a renderer would show, until the route ends or
//! the run is cancelled.

use log::info;
use stormtrack_engine::{InMemoryScene, RiskFeed, VisualizationOrchestrator, WeatherFeed};
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Ticks between aircraft position reports.
const REPORT_EVERY_TICKS: u64 = 50;

/// What happened during a playback run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub ticks: u64,
    pub buckets_entered: u64,
    pub weather_updates: usize,
    pub cancelled: bool,
}

pub async fn run<W: WeatherFeed, R: RiskFeed>(
    viz: &mut VisualizationOrchestrator<InMemoryScene, W, R>,
    tick_interval: Duration,
    cancel_token: CancellationToken,
) -> PlaybackSummary {
    let mut summary = PlaybackSummary::default();
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_tick = Instant::now();

    loop {
        tokio::select! {
            biased;

            () = cancel_token.cancelled() => {
                info!("Playback cancelled");
                summary.cancelled = true;
                break;
            }

            _ = interval.tick() => {}
        }

        let now = Instant::now();
        let elapsed = now - last_tick;
        last_tick = now;

        summary.weather_updates += viz.pump_weather();
        let Some(update) = viz.tick(elapsed) else {
            break;
        };
        summary.ticks += 1;

        if let Some(bucket) = update.new_bucket {
            summary.buckets_entered += 1;
            info!("{} entering weather bucket {}", update.time.format("%H:%M:%S"), bucket);
        }
        if summary.ticks % REPORT_EVERY_TICKS == 0 {
            if let Some(pose) = update.pose {
                info!(
                    "{} aircraft at {:.4}, {:.4} alt {:.0} hdg {} | {} storm entities",
                    update.time.format("%H:%M:%S"),
                    pose.position.lat,
                    pose.position.lon,
                    pose.position.alt,
                    pose.heading.map_or_else(|| "-".to_string(), |h| format!("{h:03.0}")),
                    viz.scene().weather_entity_count()
                );
            }
        }

        if viz.playback().clock().is_some_and(|c| c.is_finished()) {
            summary.weather_updates += viz.pump_weather();
            info!("Arrived at {}", update.time.format("%Y-%m-%d %H:%M:%SZ"));
            break;
        }
    }

    summary
}
