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

//! Route visualization lifecycle.
//!
//! [`VisualizationOrchestrator`] owns the scene and every engine component.
//! Loading a route moves it through `Idle -> Loading -> Ready`, or to
//! `Error` when the route geometry is unusable. Weather for each new time
//! bucket is fetched on a spawned task and handed back over a channel, so
//! ticks never wait on the network. Results are tagged with the session
//! that requested them and dropped if that session is gone or the clock
//! has since moved to another bucket.

use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::flight_plan::{self, FlightPlanRecord};
use crate::geojson::{RouteError, RouteGeometry};
use crate::playback::{RoutePlaybackController, TickUpdate};
use crate::risk::{AirportRiskLookup, RiskError, RiskFeed, RiskPanel, RiskSnapshot};
use crate::scene::{EntityHandle, SceneBackend, SceneLayerManager, StormTops};
use crate::time_bucket::TimeBucket;
use crate::weather::{CachedWeather, WeatherCache, WeatherFeed};
use crate::VisualizerConfig;

/// Lifecycle state, published to subscribers on every change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VisualizationState {
    #[default]
    Idle,
    /// A route is being parsed and drawn.
    Loading,
    /// A route is drawn and playing.
    Ready,
    /// The last load failed; carries a user-facing message.
    Error(String),
}

/// Weather resolved for a bucket on behalf of a session.
#[derive(Debug)]
struct WeatherUpdate {
    session: Uuid,
    bucket: TimeBucket,
    geometry: CachedWeather,
}

#[derive(Debug)]
struct Session {
    id: Uuid,
    plan: Option<FlightPlanRecord>,
    entities: Vec<EntityHandle>,
    aircraft: Option<EntityHandle>,
    cancel: CancellationToken,
}

/// Composes route playback, the weather layer and airport risk picks
/// around a single scene.
///
/// Methods that may start a weather fetch spawn onto the current tokio
/// runtime and must be called from within one.
pub struct VisualizationOrchestrator<S, W, R> {
    scene: S,
    weather: WeatherCache<W>,
    layer: SceneLayerManager,
    playback: RoutePlaybackController,
    risk: AirportRiskLookup<R>,
    panel: RiskPanel,
    session: Option<Session>,
    state: watch::Sender<VisualizationState>,
    updates_tx: mpsc::UnboundedSender<WeatherUpdate>,
    updates_rx: mpsc::UnboundedReceiver<WeatherUpdate>,
    applied_bucket: Option<TimeBucket>,
}

impl<S, W, R> std::fmt::Debug for VisualizationOrchestrator<S, W, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisualizationOrchestrator")
            .field("state", &*self.state.borrow())
            .field("session", &self.session.as_ref().map(|s| s.id))
            .field("weather", &self.weather)
            .field("applied_bucket", &self.applied_bucket)
            .finish_non_exhaustive()
    }
}

impl<S: SceneBackend, W: WeatherFeed, R: RiskFeed> VisualizationOrchestrator<S, W, R> {
    pub fn new(scene: S, weather_feed: W, risk_feed: R, config: &VisualizerConfig) -> Self {
        let mut playback = config.playback.clone();
        playback.bucket_minutes = config.weather.bucket_minutes;

        let (state, _) = watch::channel(VisualizationState::Idle);
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();

        Self {
            scene,
            weather: WeatherCache::new(weather_feed, &config.weather),
            layer: SceneLayerManager::new(config.layer.clone()),
            playback: RoutePlaybackController::new(playback),
            risk: AirportRiskLookup::new(risk_feed, &config.risk),
            panel: RiskPanel::default(),
            session: None,
            state,
            updates_tx,
            updates_rx,
            applied_bucket: None,
        }
    }

    /// Replace the storm top source, e.g. with a fixed altitude.
    #[must_use]
    pub fn with_storm_tops(mut self, tops: StormTops) -> Self {
        let config = self.layer.config().clone();
        self.layer = SceneLayerManager::with_tops(config, tops);
        self
    }

    /// Load a route from its raw JSON text.
    pub fn visualize_str(&mut self, fpl: &str, geometry: &str) -> Result<Uuid, RouteError> {
        match serde_json::from_str::<Value>(geometry) {
            Ok(value) => self.visualize(fpl, &value),
            Err(e) => {
                let e = RouteError::from(e);
                warn!("Route geometry rejected: {}", e);
                self.set_state(VisualizationState::Error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Load a route: validate the geometry, tear down the previous route,
    /// draw the new one and start playback.
    ///
    /// Invalid geometry leaves the scene exactly as it was. A flight plan
    /// that cannot be parsed falls back to the current time as departure.
    /// Returns the id of the new session.
    pub fn visualize(&mut self, fpl: &str, geometry: &Value) -> Result<Uuid, RouteError> {
        self.set_state(VisualizationState::Loading);

        let route = match RouteGeometry::from_json(geometry) {
            Ok(route) => route,
            Err(e) => {
                warn!("Route geometry rejected: {}", e);
                self.set_state(VisualizationState::Error(e.to_string()));
                return Err(e);
            }
        };

        let plan = match flight_plan::parse(fpl) {
            Ok(plan) => Some(plan),
            Err(e) => {
                warn!("Flight plan not usable ({}), departing now", e);
                None
            }
        };
        let departure = plan
            .as_ref()
            .map_or_else(Utc::now, |p| p.departure_time_utc);

        self.teardown();

        self.playback.build_track(route.waypoints(), departure);
        let seeded = self.playback.seed_scene(&mut self.scene, &route, plan.as_ref());
        for (handle, ident) in &seeded.airports {
            self.risk.register(*handle, ident.clone());
        }

        let id = Uuid::new_v4();
        self.session = Some(Session {
            id,
            plan,
            entities: seeded.entities,
            aircraft: seeded.aircraft,
            cancel: CancellationToken::new(),
        });
        info!(
            "Route session {} loaded with {} waypoints",
            id,
            route.waypoints().len()
        );

        let start = self.playback.clock_mut().map(|clock| {
            clock.play();
            clock.current()
        });
        if let Some(bucket) = start.and_then(|time| self.playback.on_tick(time)) {
            self.enter_bucket(bucket);
        }

        self.set_state(VisualizationState::Ready);
        Ok(id)
    }

    /// Advance playback by `wall` elapsed real time.
    ///
    /// Applies weather that resolved since the last tick, moves the
    /// aircraft and starts a fetch when a new bucket is entered. Does
    /// nothing unless a route is ready.
    pub fn tick(&mut self, wall: Duration) -> Option<TickUpdate> {
        if !self.is_ready() {
            return None;
        }
        self.pump_weather();
        let update = self.playback.advance(wall)?;
        self.apply_tick(&update);
        Some(update)
    }

    /// Jump playback to `time`.
    pub fn seek(&mut self, time: DateTime<Utc>) -> Option<TickUpdate> {
        if !self.is_ready() {
            return None;
        }
        let update = self.playback.seek(time)?;
        self.apply_tick(&update);
        Some(update)
    }

    fn apply_tick(&mut self, update: &TickUpdate) {
        if let (Some(aircraft), Some(pose)) = (self.aircraft(), update.pose) {
            self.scene.set_pose(aircraft, pose);
        }
        if let Some(bucket) = update.new_bucket {
            self.enter_bucket(bucket);
        }
    }

    fn enter_bucket(&mut self, bucket: TimeBucket) {
        if let Some(cached) = self.weather.get(&bucket) {
            self.apply_weather(bucket, cached);
        } else {
            self.request_weather(bucket);
        }
    }

    fn request_weather(&self, bucket: TimeBucket) {
        let Some(session) = &self.session else {
            return;
        };
        let id = session.id;
        let cancel = session.cancel.clone();
        let cache = self.weather.clone();
        let tx = self.updates_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("Weather fetch for {} cancelled", bucket);
                }
                geometry = cache.get_or_fetch(bucket) => {
                    if tx.send(WeatherUpdate { session: id, bucket, geometry }).is_err() {
                        debug!("Visualization closed before weather for {} arrived", bucket);
                    }
                }
            }
        });
    }

    /// Apply every weather result that has arrived. Returns how many were applied.
    pub fn pump_weather(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(update) = self.updates_rx.try_recv() {
            if self.apply_update(update) {
                applied += 1;
            }
        }
        applied
    }

    /// Wait for the next weather result and apply it if still relevant.
    ///
    /// Returns whether the scene was updated.
    pub async fn next_weather_update(&mut self) -> bool {
        match self.updates_rx.recv().await {
            Some(update) => self.apply_update(update),
            None => false,
        }
    }

    fn apply_update(&mut self, update: WeatherUpdate) -> bool {
        if self.session.as_ref().map(|s| s.id) != Some(update.session) {
            debug!("Discarding weather for {} from a previous route", update.bucket);
            return false;
        }
        if self.playback.active_bucket() != Some(update.bucket) {
            debug!(
                "Discarding weather for {}, playback has moved on",
                update.bucket
            );
            return false;
        }
        self.apply_weather(update.bucket, update.geometry);
        true
    }

    fn apply_weather(&mut self, bucket: TimeBucket, geometry: CachedWeather) {
        let added = self
            .layer
            .refresh_weather_layer(&mut self.scene, geometry.as_deref());
        debug!("Weather layer for {} now has {} entities", bucket, added);
        self.applied_bucket = Some(bucket);
    }

    /// Resolve a pick. Airport markers fill the risk panel; anything else
    /// is rejected without a request.
    pub async fn on_pick(&mut self, handle: EntityHandle) -> Result<RiskSnapshot, RiskError> {
        let ident = self.risk.identifier(handle)?.to_string();
        let snapshot = self.risk.lookup(ident.clone()).await?;
        self.panel.show(ident, snapshot.clone());
        Ok(snapshot)
    }

    pub fn dismiss_risk_panel(&mut self) {
        self.panel.dismiss();
    }

    /// Remove the current route and return to `Idle`.
    pub fn clear(&mut self) {
        self.teardown();
        self.set_state(VisualizationState::Idle);
    }

    /// Cancel in-flight fetches and remove everything the route created.
    fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel.cancel();
            for handle in session.entities {
                self.scene.remove(handle);
            }
            info!("Route session {} torn down", session.id);
        }
        self.playback.teardown();
        self.weather.reset();
        self.layer.clear(&mut self.scene);
        self.risk.clear();
        self.panel.dismiss();
        self.applied_bucket = None;
        while self.updates_rx.try_recv().is_ok() {}
    }

    fn set_state(&self, state: VisualizationState) {
        let previous = self.state.send_replace(state);
        let current = self.state.borrow();
        if previous != *current {
            info!("Visualization state {:?} -> {:?}", previous, *current);
        }
    }

    fn is_ready(&self) -> bool {
        *self.state.borrow() == VisualizationState::Ready
    }

    /// Receiver for state changes.
    pub fn subscribe(&self) -> watch::Receiver<VisualizationState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> VisualizationState {
        self.state.borrow().clone()
    }

    /// Busy signal for the UI.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        *self.state.borrow() == VisualizationState::Loading
    }

    #[must_use]
    pub fn session_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.id)
    }

    #[must_use]
    pub fn flight_plan(&self) -> Option<&FlightPlanRecord> {
        self.session.as_ref().and_then(|s| s.plan.as_ref())
    }

    #[must_use]
    pub fn aircraft(&self) -> Option<EntityHandle> {
        self.session.as_ref().and_then(|s| s.aircraft)
    }

    /// Bucket whose weather is currently drawn.
    #[must_use]
    pub fn applied_bucket(&self) -> Option<TimeBucket> {
        self.applied_bucket
    }

    #[must_use]
    pub fn scene(&self) -> &S {
        &self.scene
    }

    #[must_use]
    pub fn playback(&self) -> &RoutePlaybackController {
        &self.playback
    }

    /// Playback controls: pause, resume, speed and range.
    pub fn playback_mut(&mut self) -> &mut RoutePlaybackController {
        &mut self.playback
    }

    #[must_use]
    pub fn weather_cache(&self) -> &WeatherCache<W> {
        &self.weather
    }

    #[must_use]
    pub fn risk_panel(&self) -> &RiskPanel {
        &self.panel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geojson::{GeoPosition, StormCell, WeatherGeometry};
    use crate::risk::RiskSnapshot;
    use crate::scene::{AirportRole, Entity, InMemoryScene};
    use crate::weather::FeedError;
    use chrono::{Duration as ChronoDuration, TimeZone, Timelike};
    use serde_json::json;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const FPL: &str = "(FPL-TEST01-VG -C172/L -KJFK1200 N0120A080 DCT -KLAX0630 DOF/240615)";
    const LATER_FPL: &str = "(FPL-TEST02-IS -B738/M -KJFK1300 N0450F350 DCT -KLAX0530 DOF/240615)";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    /// Storm cells keyed on the bucket hour so each route's weather is recognisable.
    /// Buckets before `slow_until` take a minute to answer; `hang_from`
    /// onwards never answer.
    struct MockWeather {
        calls: Arc<AtomicUsize>,
        slow_until: Option<DateTime<Utc>>,
        hang_from: Option<DateTime<Utc>>,
    }

    impl WeatherFeed for MockWeather {
        fn fetch(
            &self,
            bucket: TimeBucket,
        ) -> impl Future<Output = Result<Option<WeatherGeometry>, FeedError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let slow = self.slow_until.is_some_and(|t| bucket.start() < t);
            let hang = self.hang_from.is_some_and(|t| bucket.start() >= t);
            async move {
                if hang {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                } else if slow {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                } else {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                let lon = f64::from(bucket.start().hour());
                Ok(Some(WeatherGeometry {
                    cells: vec![StormCell {
                        ring: vec![
                            GeoPosition::new(lon, 0.0, 0.0),
                            GeoPosition::new(lon + 1.0, 0.0, 0.0),
                            GeoPosition::new(lon + 1.0, 1.0, 0.0),
                        ],
                    }],
                }))
            }
        }
    }

    struct MockRisk;

    impl RiskFeed for MockRisk {
        fn fetch(&self, ident: String) -> impl Future<Output = Result<RiskSnapshot, FeedError>> + Send {
            async move {
                Ok(RiskSnapshot {
                    wind_risk: 10.0,
                    temperature_risk: 20.0,
                    pressure_risk: 5.0,
                    visibility_risk: 1.0,
                    classification: format!("{ident} LOW"),
                })
            }
        }
    }

    type TestOrchestrator = VisualizationOrchestrator<InMemoryScene, MockWeather, MockRisk>;

    fn orchestrator(
        slow_until: Option<DateTime<Utc>>,
        hang_from: Option<DateTime<Utc>>,
    ) -> (Arc<AtomicUsize>, TestOrchestrator) {
        let calls = Arc::new(AtomicUsize::new(0));
        let weather = MockWeather {
            calls: Arc::clone(&calls),
            slow_until,
            hang_from,
        };
        let orchestrator = VisualizationOrchestrator::new(
            InMemoryScene::new(),
            weather,
            MockRisk,
            &VisualizerConfig::default(),
        )
        .with_storm_tops(StormTops::Fixed(10_000.0));
        (calls, orchestrator)
    }

    fn route(start: DateTime<Utc>, count: i64, step_minutes: i64) -> Value {
        let features: Vec<_> = (0..count)
            .map(|i| {
                json!({
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [-73.8 - i as f64, 40.6] },
                    "properties": {
                        "time": (start + ChronoDuration::minutes(i * step_minutes)).to_rfc3339(),
                        "name": if i == 0 { "KJFK".to_string() } else { format!("WP{i}") }
                    }
                })
            })
            .collect();
        json!({ "type": "FeatureCollection", "features": features })
    }

    fn weather_lons(orchestrator: &TestOrchestrator) -> Vec<f64> {
        orchestrator
            .scene()
            .entities()
            .filter_map(|(_, e)| match e {
                Entity::StormWall { ring, .. } => Some(ring[0].lon),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_visualize_reaches_ready() {
        let (_, mut orchestrator) = orchestrator(None, None);
        let mut states = orchestrator.subscribe();
        assert_eq!(orchestrator.state(), VisualizationState::Idle);

        orchestrator.visualize(FPL, &route(t0(), 3, 1)).unwrap();

        assert_eq!(orchestrator.state(), VisualizationState::Ready);
        assert!(!orchestrator.is_busy());
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), VisualizationState::Ready);
        assert_eq!(orchestrator.flight_plan().unwrap().departure_id, "KJFK");
        assert!(orchestrator.playback().clock().unwrap().is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_bounds_and_active_bucket() {
        let (_, mut orchestrator) = orchestrator(None, None);
        orchestrator.visualize(FPL, &route(t0(), 3, 1)).unwrap();

        let clock = orchestrator.playback().clock().unwrap();
        assert_eq!(clock.start(), t0());
        assert_eq!(clock.stop(), t0() + ChronoDuration::minutes(2));

        let at = t0() + ChronoDuration::seconds(90);
        orchestrator.seek(at).unwrap();
        assert_eq!(orchestrator.playback().active_bucket(), Some(TimeBucket::floor(at)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_moves_aircraft_and_applies_weather() {
        let (calls, mut orchestrator) = orchestrator(None, None);
        orchestrator.visualize(FPL, &route(t0(), 3, 1)).unwrap();

        assert!(orchestrator.next_weather_update().await);
        assert_eq!(weather_lons(&orchestrator), vec![12.0]);
        assert_eq!(orchestrator.applied_bucket(), Some(TimeBucket::floor(t0())));

        let update = orchestrator.tick(Duration::from_secs(1)).unwrap();
        assert_eq!(update.time, t0() + ChronoDuration::seconds(30));
        assert!(update.new_bucket.is_none());
        let aircraft = orchestrator.aircraft().unwrap();
        assert!(orchestrator.scene().pose(aircraft).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_weather_timeout_clears_layer() {
        let hang_from = t0() + ChronoDuration::minutes(5);
        let (_, mut orchestrator) = orchestrator(None, Some(hang_from));
        orchestrator.visualize(FPL, &route(t0(), 3, 5)).unwrap();
        assert!(orchestrator.next_weather_update().await);
        assert_eq!(orchestrator.scene().weather_entity_count(), 3);

        orchestrator.seek(t0() + ChronoDuration::minutes(6)).unwrap();
        assert!(orchestrator.next_weather_update().await);

        assert_eq!(orchestrator.scene().weather_entity_count(), 0);
        assert_eq!(orchestrator.applied_bucket(), Some(TimeBucket::floor(hang_from)));
        assert_eq!(orchestrator.state(), VisualizationState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_route_never_shows_previous_weather() {
        let second = t0() + ChronoDuration::hours(1);
        let (_, mut orchestrator) = orchestrator(Some(second), None);

        orchestrator.visualize(FPL, &route(t0(), 3, 1)).unwrap();
        tokio::task::yield_now().await;
        orchestrator.visualize(LATER_FPL, &route(second, 3, 1)).unwrap();
        assert_eq!(orchestrator.state(), VisualizationState::Ready);

        assert!(orchestrator.next_weather_update().await);
        tokio::time::sleep(Duration::from_secs(120)).await;
        orchestrator.pump_weather();

        assert_eq!(weather_lons(&orchestrator), vec![13.0]);
        let aircraft = orchestrator
            .scene()
            .entities()
            .filter(|(_, e)| matches!(e, Entity::Aircraft { .. }))
            .count();
        assert_eq!(aircraft, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_and_out_of_order_updates_are_discarded() {
        let (_, mut orchestrator) = orchestrator(None, None);
        let first = orchestrator.visualize(FPL, &route(t0(), 3, 10)).unwrap();
        let second = orchestrator.visualize(FPL, &route(t0(), 3, 10)).unwrap();
        assert_ne!(first, second);

        let stale = WeatherUpdate {
            session: first,
            bucket: TimeBucket::floor(t0()),
            geometry: None,
        };
        assert!(!orchestrator.apply_update(stale));

        orchestrator.seek(t0() + ChronoDuration::minutes(12)).unwrap();
        let behind = WeatherUpdate {
            session: second,
            bucket: TimeBucket::floor(t0()),
            geometry: None,
        };
        assert!(!orchestrator.apply_update(behind));
        assert_ne!(orchestrator.applied_bucket(), Some(TimeBucket::floor(t0())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_geometry_leaves_scene_untouched() {
        let (_, mut orchestrator) = orchestrator(None, None);

        let err = orchestrator.visualize(FPL, &json!({ "type": "Feature" })).unwrap_err();
        assert!(matches!(err, RouteError::NotFeatureCollection(_)));
        assert!(matches!(orchestrator.state(), VisualizationState::Error(_)));
        assert!(orchestrator.scene().is_empty());

        let session = orchestrator.visualize(FPL, &route(t0(), 3, 1)).unwrap();
        let drawn = orchestrator.scene().len();

        let err = orchestrator
            .visualize(FPL, &json!({ "type": "FeatureCollection", "features": [] }))
            .unwrap_err();
        assert!(matches!(err, RouteError::NoFeatures));
        assert_eq!(orchestrator.scene().len(), drawn);
        assert_eq!(orchestrator.session_id(), Some(session));
        assert!(orchestrator.tick(Duration::from_secs(1)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_json_text_is_an_error() {
        let (_, mut orchestrator) = orchestrator(None, None);
        assert!(matches!(
            orchestrator.visualize_str(FPL, "{not json"),
            Err(RouteError::Json(_))
        ));
        assert!(matches!(orchestrator.state(), VisualizationState::Error(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unparseable_plan_departs_now() {
        let (_, mut orchestrator) = orchestrator(None, None);
        orchestrator.visualize("garbage", &route(t0(), 3, 1)).unwrap();

        assert!(orchestrator.flight_plan().is_none());
        assert_eq!(orchestrator.playback().clock().unwrap().start(), t0());
        assert_eq!(orchestrator.state(), VisualizationState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pick_airport_fills_panel() {
        let (_, mut orchestrator) = orchestrator(None, None);
        orchestrator.visualize(FPL, &route(t0(), 3, 1)).unwrap();

        let (departure, waypoint) = {
            let entities: Vec<_> = orchestrator.scene().entities().collect();
            let departure = entities
                .iter()
                .find(|(_, e)| matches!(e, Entity::Airport { role: AirportRole::Departure, .. }))
                .map(|(h, _)| *h)
                .unwrap();
            let waypoint = entities
                .iter()
                .find(|(_, e)| matches!(e, Entity::Waypoint { .. }))
                .map(|(h, _)| *h)
                .unwrap();
            (departure, waypoint)
        };

        assert!(matches!(
            orchestrator.on_pick(waypoint).await,
            Err(RiskError::NotAirport(_))
        ));
        assert!(!orchestrator.risk_panel().is_open());

        let snapshot = orchestrator.on_pick(departure).await.unwrap();
        assert_eq!(snapshot.classification, "KJFK LOW");
        assert_eq!(orchestrator.risk_panel().ident(), Some("KJFK"));

        orchestrator.dismiss_risk_panel();
        assert!(!orchestrator.risk_panel().is_open());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_returns_to_idle() {
        let (_, mut orchestrator) = orchestrator(None, None);
        orchestrator.visualize(FPL, &route(t0(), 3, 1)).unwrap();
        assert!(orchestrator.next_weather_update().await);

        orchestrator.clear();

        assert_eq!(orchestrator.state(), VisualizationState::Idle);
        assert!(orchestrator.scene().is_empty());
        assert!(orchestrator.weather_cache().is_empty());
        assert!(orchestrator.session_id().is_none());
    }
}
