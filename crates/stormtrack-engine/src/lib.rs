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

//! Temporal flight and storm visualization engine.
//!
//! Plays a filed flight route back under an accelerated simulation clock
//! while keeping a layer of extruded storm cells in step with simulated
//! time. The engine is renderer-agnostic: it drives any [`SceneBackend`]
//! and fetches data through the [`WeatherFeed`] and [`RiskFeed`] traits.
//!
//! - **Parsing**: ICAO flight plan messages ([`flight_plan`]) and route /
//!   weather GeoJSON ([`geojson`])
//! - **Weather**: 5-minute [`TimeBucket`]s, a deduplicating [`WeatherCache`]
//!   and the [`SceneLayerManager`] that swaps storm volumes atomically
//! - **Playback**: [`PlaybackClock`], [`SampledTrack`] and the
//!   [`RoutePlaybackController`]
//! - **Orchestration**: [`VisualizationOrchestrator`] ties it together and
//!   handles airport picks through [`AirportRiskLookup`]
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use stormtrack_engine::{InMemoryScene, VisualizationOrchestrator, VisualizerConfig};
//! # use stormtrack_engine::{FeedError, RiskFeed, RiskSnapshot, TimeBucket, WeatherFeed, WeatherGeometry};
//! # struct NoWeather;
//! # impl WeatherFeed for NoWeather {
//! #     async fn fetch(&self, _: TimeBucket) -> Result<Option<WeatherGeometry>, FeedError> { Ok(None) }
//! # }
//! # struct NoRisk;
//! # impl RiskFeed for NoRisk {
//! #     async fn fetch(&self, _: String) -> Result<RiskSnapshot, FeedError> { Err(FeedError::Status(404)) }
//! # }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut viz = VisualizationOrchestrator::new(
//!         InMemoryScene::new(),
//!         NoWeather,
//!         NoRisk,
//!         &VisualizerConfig::default(),
//!     );
//!
//!     let route = std::fs::read_to_string("route.geojson").unwrap();
//!     viz.visualize_str("(FPL-N123AB-VG -C172/L -KJFK1200 N0120A080 DCT -KLAX0630)", &route)
//!         .unwrap();
//!
//!     while !viz.playback().clock().is_some_and(|c| c.is_finished()) {
//!         viz.tick(Duration::from_millis(100));
//!         tokio::time::sleep(Duration::from_millis(100)).await;
//!     }
//! }
//! ```

pub mod flight_plan;
pub mod geojson;
pub mod orchestrator;
pub mod playback;
pub mod risk;
pub mod scene;
pub mod time_bucket;
pub mod weather;

pub use flight_plan::{FlightPlanError, FlightPlanRecord};
pub use geojson::{GeoPosition, RouteError, RouteGeometry, RouteWaypoint, StormCell, WeatherGeometry};
pub use orchestrator::{VisualizationOrchestrator, VisualizationState};
pub use playback::{
    ClockRange, PlaybackClock, PlaybackConfig, Pose, RoutePlaybackController, SampledTrack, SeededRoute,
    TickUpdate,
};
pub use risk::{AirportRiskLookup, RiskConfig, RiskError, RiskFeed, RiskPanel, RiskSnapshot};
pub use scene::{
    AirportRole, Entity, EntityHandle, InMemoryScene, LayerConfig, SceneBackend, SceneLayerManager, StormTops,
};
pub use time_bucket::TimeBucket;
pub use weather::{CachedWeather, FeedError, WeatherCache, WeatherConfig, WeatherFeed};

/// Configuration for the full visualization stack.
#[derive(Debug, Clone, Default)]
pub struct VisualizerConfig {
    /// Weather fetch timeout and bucket width.
    pub weather: WeatherConfig,
    /// Clock speed and end-of-route behaviour.
    pub playback: PlaybackConfig,
    /// Storm cell extrusion.
    pub layer: LayerConfig,
    /// Airport risk fetch timeout.
    pub risk: RiskConfig,
}
