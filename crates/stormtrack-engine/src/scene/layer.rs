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

//! Weather layer management.
//!
//! Storm cells carry no stable identity between fetches, so the layer is
//! always replaced wholesale: every tracked entity is removed before any
//! entity for the new geometry is added.

use std::ops::Range;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{Entity, EntityHandle, SceneBackend};
use crate::geojson::WeatherGeometry;

/// Altitude band for storm tops, in scene distance units.
const DEFAULT_TOP_BAND: Range<f64> = 9_500.0..12_000.0;

/// Configuration for storm cell extrusion.
#[derive(Debug, Clone)]
pub struct LayerConfig {
    /// Altitude of every storm cell's bottom cap.
    pub base_altitude: f64,
    /// Band from which each cell's top altitude is drawn.
    pub top_band: Range<f64>,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            base_altitude: 0.0,
            top_band: DEFAULT_TOP_BAND,
        }
    }
}

/// Source of storm top altitudes.
#[derive(Debug)]
pub enum StormTops {
    /// Drawn uniformly from the configured band.
    Random(StdRng),
    /// Always the same altitude.
    Fixed(f64),
}

impl StormTops {
    /// Random tops seeded from the operating system.
    #[must_use]
    pub fn random() -> Self {
        Self::Random(StdRng::from_entropy())
    }

    /// Random tops with a reproducible sequence.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::Random(StdRng::seed_from_u64(seed))
    }

    fn next(&mut self, band: &Range<f64>) -> f64 {
        match self {
            Self::Random(rng) if band.start < band.end => rng.gen_range(band.clone()),
            Self::Random(_) => band.start,
            Self::Fixed(top) => *top,
        }
    }
}

/// Owns the entities of the weather layer.
#[derive(Debug)]
pub struct SceneLayerManager {
    config: LayerConfig,
    tops: StormTops,
    handles: Vec<EntityHandle>,
}

impl SceneLayerManager {
    #[must_use]
    pub fn new(config: LayerConfig) -> Self {
        Self::with_tops(config, StormTops::random())
    }

    #[must_use]
    pub fn with_tops(config: LayerConfig, tops: StormTops) -> Self {
        Self {
            config,
            tops,
            handles: Vec::new(),
        }
    }

    /// Replace the layer with volumes for `geometry`.
    ///
    /// `None` simply clears the layer. Returns the number of entities added.
    pub fn refresh_weather_layer<S: SceneBackend + ?Sized>(
        &mut self,
        scene: &mut S,
        geometry: Option<&WeatherGeometry>,
    ) -> usize {
        self.clear(scene);

        let Some(geometry) = geometry else {
            return 0;
        };

        let base = self.config.base_altitude;
        for cell in &geometry.cells {
            let top = self.tops.next(&self.config.top_band);
            let ring = cell.ring.clone();

            self.handles.push(scene.add(Entity::StormWall {
                ring: ring.clone(),
                base,
                top,
            }));
            self.handles.push(scene.add(Entity::StormCap {
                ring: ring.clone(),
                altitude: top,
            }));
            self.handles.push(scene.add(Entity::StormCap {
                ring,
                altitude: base,
            }));
        }

        debug!(
            "Weather layer refreshed: {} cells, {} entities",
            geometry.cells.len(),
            self.handles.len()
        );
        self.handles.len()
    }

    /// Remove every weather entity from the scene.
    pub fn clear<S: SceneBackend + ?Sized>(&mut self, scene: &mut S) {
        for handle in self.handles.drain(..) {
            scene.remove(handle);
        }
    }

    #[must_use]
    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Handles of the entities currently in the layer.
    #[must_use]
    pub fn handles(&self) -> &[EntityHandle] {
        &self.handles
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
