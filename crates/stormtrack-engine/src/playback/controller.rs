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

//! Route playback: clock ownership, track building and bucket tracking.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};

use super::clock::{ClockRange, PlaybackClock};
use super::track::{Pose, SampledTrack};
use crate::flight_plan::FlightPlanRecord;
use crate::geojson::{RouteGeometry, RouteWaypoint};
use crate::scene::{AirportRole, Entity, EntityHandle, SceneBackend};
use crate::time_bucket::{TimeBucket, DEFAULT_BUCKET_MINUTES};

/// Configuration for route playback.
#[derive(Debug, Clone)]
pub struct PlaybackConfig {
    /// Simulated seconds per wall-clock second.
    pub multiplier: f64,
    /// Behaviour at the end of the route.
    pub range: ClockRange,
    /// Width of the weather buckets tracked while playing.
    pub bucket_minutes: u32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            multiplier: 30.0,
            range: ClockRange::Clamped,
            bucket_minutes: DEFAULT_BUCKET_MINUTES,
        }
    }
}

/// Result of one clock tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickUpdate {
    /// Simulated time after the tick.
    pub time: DateTime<Utc>,
    /// Aircraft pose at that time.
    pub pose: Option<Pose>,
    /// Set when the tick crossed into a new weather bucket.
    pub new_bucket: Option<TimeBucket>,
}

/// Entities created when a route is drawn.
#[derive(Debug, Clone, Default)]
pub struct SeededRoute {
    /// The animated aircraft.
    pub aircraft: Option<EntityHandle>,
    /// Departure and destination markers with their identifiers.
    pub airports: Vec<(EntityHandle, Option<String>)>,
    /// Every entity created, including the ones above.
    pub entities: Vec<EntityHandle>,
}

/// Drives an aircraft along a sampled track under a simulation clock.
#[derive(Debug)]
pub struct RoutePlaybackController {
    config: PlaybackConfig,
    clock: Option<PlaybackClock>,
    track: Option<Arc<SampledTrack>>,
    active_bucket: Option<TimeBucket>,
}

impl RoutePlaybackController {
    #[must_use]
    pub fn new(config: PlaybackConfig) -> Self {
        Self {
            config,
            clock: None,
            track: None,
            active_bucket: None,
        }
    }

    /// Build the track and clock for `waypoints`.
    ///
    /// The clock starts at the departure time or the first waypoint,
    /// whichever is earlier, and stops at the last waypoint. The returned
    /// clock is paused.
    pub fn build_track(
        &mut self,
        waypoints: &[RouteWaypoint],
        departure: DateTime<Utc>,
    ) -> PlaybackClock {
        let track = SampledTrack::from_waypoints(waypoints);
        let first = track.start_time().unwrap_or(departure);
        let stop = track.end_time().unwrap_or(departure);
        let start = departure.min(first);

        let clock = PlaybackClock::new(start, stop, self.config.multiplier, self.config.range);
        info!(
            "Playback track built: {} samples, {} -> {} at {}x",
            track.len(),
            clock.start(),
            clock.stop(),
            clock.multiplier()
        );

        self.track = Some(Arc::new(track));
        self.clock = Some(clock.clone());
        self.active_bucket = None;
        clock
    }

    /// Add route entities to the scene: filed route, waypoint markers,
    /// airport markers at both ends, and the aircraft.
    pub fn seed_scene<S: SceneBackend + ?Sized>(
        &self,
        scene: &mut S,
        route: &RouteGeometry,
        plan: Option<&FlightPlanRecord>,
    ) -> SeededRoute {
        let mut seeded = SeededRoute::default();

        if let Some(line) = route.filed_route() {
            seeded.entities.push(scene.add(Entity::FiledRoute {
                positions: line.to_vec(),
            }));
        }

        let waypoints = route.waypoints();
        let last_index = waypoints.len() - 1;
        for (i, waypoint) in waypoints.iter().enumerate() {
            // A one-point route is both ends at once.
            let roles: &[AirportRole] = match (i == 0, i == last_index) {
                (true, true) => &[AirportRole::Departure, AirportRole::Destination],
                (true, false) => &[AirportRole::Departure],
                (false, true) => &[AirportRole::Destination],
                (false, false) => &[],
            };

            if roles.is_empty() {
                seeded.entities.push(scene.add(Entity::Waypoint {
                    position: waypoint.position,
                    label: waypoint.label().map(str::to_string),
                    style: waypoint.style.clone(),
                }));
                continue;
            }
            for &role in roles {
                let ident = airport_ident(waypoint, plan, role);
                let handle = scene.add(Entity::Airport {
                    ident: ident.clone(),
                    position: waypoint.position,
                    role,
                });
                seeded.airports.push((handle, ident));
                seeded.entities.push(handle);
            }
        }

        if let Some(track) = &self.track {
            let aircraft = scene.add(Entity::Aircraft {
                label: plan.and_then(|p| p.callsign.clone()),
                track: Arc::clone(track),
            });
            if let Some(pose) = self.clock.as_ref().and_then(|c| track.pose_at(c.current())) {
                scene.set_pose(aircraft, pose);
            }
            seeded.aircraft = Some(aircraft);
            seeded.entities.push(aircraft);
        }

        seeded
    }

    /// Record the bucket for simulated time `now`.
    ///
    /// Returns the bucket only when it differs from the previous one, so a
    /// weather request is made once per bucket transition.
    pub fn on_tick(&mut self, now: DateTime<Utc>) -> Option<TimeBucket> {
        let bucket = TimeBucket::floor_to(now, self.config.bucket_minutes);
        if self.active_bucket == Some(bucket) {
            return None;
        }
        debug!("Entering weather bucket {}", bucket);
        self.active_bucket = Some(bucket);
        Some(bucket)
    }

    /// Advance the clock by `wall` elapsed real time.
    pub fn advance(&mut self, wall: std::time::Duration) -> Option<TickUpdate> {
        let time = self.clock.as_mut()?.advance(wall);
        Some(self.update_at(time))
    }

    /// Jump to `time` (clamped to the clock bounds).
    pub fn seek(&mut self, time: DateTime<Utc>) -> Option<TickUpdate> {
        let clock = self.clock.as_mut()?;
        clock.seek(time);
        let time = clock.current();
        Some(self.update_at(time))
    }

    fn update_at(&mut self, time: DateTime<Utc>) -> TickUpdate {
        TickUpdate {
            time,
            pose: self.track.as_ref().and_then(|t| t.pose_at(time)),
            new_bucket: self.on_tick(time),
        }
    }

    /// Stop playback and forget the current track.
    pub fn teardown(&mut self) {
        self.clock = None;
        self.track = None;
        self.active_bucket = None;
    }

    #[must_use]
    pub fn clock(&self) -> Option<&PlaybackClock> {
        self.clock.as_ref()
    }

    pub fn clock_mut(&mut self) -> Option<&mut PlaybackClock> {
        self.clock.as_mut()
    }

    #[must_use]
    pub fn track(&self) -> Option<&Arc<SampledTrack>> {
        self.track.as_ref()
    }

    /// Bucket of the most recent tick.
    #[must_use]
    pub fn active_bucket(&self) -> Option<TimeBucket> {
        self.active_bucket
    }
}

fn airport_ident(
    waypoint: &RouteWaypoint,
    plan: Option<&FlightPlanRecord>,
    role: AirportRole,
) -> Option<String> {
    let from_plan = plan.map(|p| match role {
        AirportRole::Departure => p.departure_id.clone(),
        AirportRole::Destination => p.destination_id.clone(),
    });
    from_plan.or_else(|| {
        waypoint
            .label()
            .filter(|l| l.len() == 4 && l.chars().all(|c| c.is_ascii_alphabetic()))
            .map(str::to_ascii_uppercase)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::InMemoryScene;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn route(count: i64) -> RouteGeometry {
        let features: Vec<_> = (0..count)
            .map(|i| {
                json!({
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [-73.0 - i as f64, 40.0] },
                    "properties": {
                        "time": (t0() + Duration::minutes(i)).to_rfc3339(),
                        "name": format!("WP{i}")
                    }
                })
            })
            .collect();
        RouteGeometry::from_json(&json!({ "type": "FeatureCollection", "features": features })).unwrap()
    }

    #[test]
    fn test_clock_bounds_from_waypoints() {
        let mut controller = RoutePlaybackController::new(PlaybackConfig::default());
        let clock = controller.build_track(route(3).waypoints(), t0());

        assert_eq!(clock.start(), t0());
        assert_eq!(clock.stop(), t0() + Duration::minutes(2));
        assert!((clock.multiplier() - 30.0).abs() < f64::EPSILON);
        assert_eq!(clock.range(), ClockRange::Clamped);
    }

    #[test]
    fn test_earlier_first_waypoint_moves_start() {
        let mut controller = RoutePlaybackController::new(PlaybackConfig::default());
        let clock = controller.build_track(route(3).waypoints(), t0() + Duration::hours(1));
        assert_eq!(clock.start(), t0());
    }

    #[test]
    fn test_bucket_reported_once_per_transition() {
        let mut controller = RoutePlaybackController::new(PlaybackConfig::default());
        controller.build_track(route(3).waypoints(), t0());

        let at_90s = t0() + Duration::seconds(90);
        assert_eq!(controller.on_tick(at_90s), Some(TimeBucket::floor(at_90s)));
        assert_eq!(controller.on_tick(at_90s + Duration::seconds(1)), None);
        assert_eq!(controller.on_tick(t0() + Duration::minutes(7)), Some(TimeBucket::floor(t0() + Duration::minutes(5))));
        assert_eq!(controller.active_bucket(), Some(TimeBucket::floor(t0() + Duration::minutes(5))));
    }

    #[test]
    fn test_seek_reports_pose_and_bucket() {
        let mut controller = RoutePlaybackController::new(PlaybackConfig::default());
        controller.build_track(route(3).waypoints(), t0());

        let update = controller.seek(t0() + Duration::seconds(90)).unwrap();
        assert_eq!(update.new_bucket, Some(TimeBucket::floor(t0() + Duration::seconds(90))));
        let pose = update.pose.unwrap();
        assert!((pose.position.lon - -74.5).abs() < 1e-9);
        assert!(pose.heading.is_some());
    }

    #[test]
    fn test_advance_needs_running_clock() {
        let mut controller = RoutePlaybackController::new(PlaybackConfig::default());
        assert!(controller.advance(std::time::Duration::from_secs(1)).is_none());

        controller.build_track(route(3).waypoints(), t0());
        controller.clock_mut().unwrap().play();
        let update = controller.advance(std::time::Duration::from_secs(2)).unwrap();
        assert_eq!(update.time, t0() + Duration::seconds(60));
    }

    #[test]
    fn test_seed_scene_marks_airports() {
        let mut controller = RoutePlaybackController::new(PlaybackConfig::default());
        let route = route(4);
        controller.build_track(route.waypoints(), t0());
        let mut scene = InMemoryScene::new();

        let seeded = controller.seed_scene(&mut scene, &route, None);

        assert_eq!(seeded.airports.len(), 2);
        assert_eq!(seeded.entities.len(), 5);
        assert!(seeded.aircraft.is_some());
        let waypoint_markers = scene
            .entities()
            .filter(|(_, e)| matches!(e, Entity::Waypoint { label: Some(_), .. }))
            .count();
        assert_eq!(waypoint_markers, 2);
        assert!(scene.pose(seeded.aircraft.unwrap()).is_some());
    }

    #[test]
    fn test_single_waypoint_is_both_airports() {
        let mut controller = RoutePlaybackController::new(PlaybackConfig::default());
        let route = route(1);
        controller.build_track(route.waypoints(), t0());
        let mut scene = InMemoryScene::new();

        let seeded = controller.seed_scene(&mut scene, &route, None);

        assert_eq!(seeded.airports.len(), 2);
        let roles: Vec<_> = scene
            .entities()
            .filter_map(|(_, e)| match e {
                Entity::Airport { role, .. } => Some(*role),
                _ => None,
            })
            .collect();
        assert!(roles.contains(&AirportRole::Departure));
        assert!(roles.contains(&AirportRole::Destination));
    }

    #[test]
    fn test_teardown_clears_state() {
        let mut controller = RoutePlaybackController::new(PlaybackConfig::default());
        controller.build_track(route(2).waypoints(), t0());
        controller.on_tick(t0());
        controller.teardown();
        assert!(controller.clock().is_none());
        assert!(controller.track().is_none());
        assert!(controller.active_bucket().is_none());
    }
}
