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

//! Renderer boundary.
//!
//! The engine never draws anything itself. It describes renderable
//! [`Entity`] values and hands them to a [`SceneBackend`], keeping only the
//! opaque [`EntityHandle`] the backend returns. [`InMemoryScene`] is a
//! backend that simply records entities, used headless and in tests.

mod layer;

pub use layer::{LayerConfig, SceneLayerManager, StormTops};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::debug;
use serde_json::{Map, Value};

use crate::geojson::GeoPosition;
use crate::playback::{Pose, SampledTrack};

/// Opaque reference to an entity owned by a scene backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityHandle(u64);

impl EntityHandle {
    /// Wrap a backend-specific identifier.
    #[must_use]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub fn id(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Which end of the route an airport marker represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AirportRole {
    Departure,
    Destination,
}

/// Something the renderer can draw.
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    /// Labelled marker for an interior waypoint.
    Waypoint {
        position: GeoPosition,
        label: Option<String>,
        style: Map<String, Value>,
    },
    /// Pickable departure or destination marker.
    Airport {
        ident: Option<String>,
        position: GeoPosition,
        role: AirportRole,
    },
    /// Static polyline of the filed route.
    FiledRoute { positions: Vec<GeoPosition> },
    /// The animated aircraft, sampled along its track.
    Aircraft {
        label: Option<String>,
        track: Arc<SampledTrack>,
    },
    /// Side walls of a storm cell between `base` and `top`.
    StormWall {
        ring: Vec<GeoPosition>,
        base: f64,
        top: f64,
    },
    /// Flat top or bottom cap of a storm cell.
    StormCap {
        ring: Vec<GeoPosition>,
        altitude: f64,
    },
}

impl Entity {
    /// Whether this entity belongs to the weather layer.
    #[must_use]
    pub fn is_weather(&self) -> bool {
        matches!(self, Self::StormWall { .. } | Self::StormCap { .. })
    }
}

/// Capability surface of the rendering engine.
pub trait SceneBackend {
    /// Add an entity and return its handle.
    fn add(&mut self, entity: Entity) -> EntityHandle;

    /// Remove an entity. Returns `false` if the handle was unknown.
    fn remove(&mut self, handle: EntityHandle) -> bool;

    /// Place a moving entity at a new pose.
    fn set_pose(&mut self, handle: EntityHandle, pose: Pose) -> bool;
}

/// Scene backend that keeps entities in memory.
#[derive(Debug, Default)]
pub struct InMemoryScene {
    entities: BTreeMap<EntityHandle, Entity>,
    poses: BTreeMap<EntityHandle, Pose>,
    next_id: u64,
}

impl InMemoryScene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, handle: EntityHandle) -> Option<&Entity> {
        self.entities.get(&handle)
    }

    #[must_use]
    pub fn contains(&self, handle: EntityHandle) -> bool {
        self.entities.contains_key(&handle)
    }

    /// Last pose set for `handle`.
    #[must_use]
    pub fn pose(&self, handle: EntityHandle) -> Option<Pose> {
        self.poses.get(&handle).copied()
    }

    pub fn entities(&self) -> impl Iterator<Item = (EntityHandle, &Entity)> {
        self.entities.iter().map(|(handle, entity)| (*handle, entity))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of storm walls and caps currently present.
    #[must_use]
    pub fn weather_entity_count(&self) -> usize {
        self.entities.values().filter(|e| e.is_weather()).count()
    }
}

impl SceneBackend for InMemoryScene {
    fn add(&mut self, entity: Entity) -> EntityHandle {
        self.next_id += 1;
        let handle = EntityHandle(self.next_id);
        self.entities.insert(handle, entity);
        handle
    }

    fn remove(&mut self, handle: EntityHandle) -> bool {
        self.poses.remove(&handle);
        let removed = self.entities.remove(&handle).is_some();
        if !removed {
            debug!("Remove of unknown {}", handle);
        }
        removed
    }

    fn set_pose(&mut self, handle: EntityHandle, pose: Pose) -> bool {
        if !self.entities.contains_key(&handle) {
            return false;
        }
        self.poses.insert(handle, pose);
        true
    }
}
