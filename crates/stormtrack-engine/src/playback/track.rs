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

//! Time-sampled position track with linear interpolation.

use chrono::{DateTime, Utc};

use crate::geojson::{GeoPosition, RouteWaypoint};

/// Position and heading of a moving entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: GeoPosition,
    /// Direction of travel in degrees clockwise from true north, if moving.
    pub heading: Option<f64>,
}

/// Initial great-circle bearing from `from` to `to` in degrees (0-360).
fn initial_bearing(from: &GeoPosition, to: &GeoPosition) -> f64 {
    let lat1 = from.lat.to_radians();
    let lat2 = to.lat.to_radians();
    let delta_lon = (to.lon - from.lon).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();

    y.atan2(x).to_degrees().rem_euclid(360.0)
}

/// Interpolate between two positions, taking the short way across the antimeridian.
fn lerp(a: &GeoPosition, b: &GeoPosition, t: f64) -> GeoPosition {
    let mut delta_lon = b.lon - a.lon;
    if delta_lon > 180.0 {
        delta_lon -= 360.0;
    } else if delta_lon < -180.0 {
        delta_lon += 360.0;
    }
    let mut lon = a.lon + delta_lon * t;
    if lon > 180.0 {
        lon -= 360.0;
    } else if lon < -180.0 {
        lon += 360.0;
    }
    GeoPosition {
        lon,
        lat: a.lat + (b.lat - a.lat) * t,
        alt: a.alt + (b.alt - a.alt) * t,
    }
}

/// Continuous position function built from discrete timestamped samples.
///
/// Outside the sampled interval the track holds its first or last position.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledTrack {
    samples: Vec<(DateTime<Utc>, GeoPosition)>,
}

impl SampledTrack {
    /// Build from samples in any order; duplicate times keep the last sample.
    #[must_use]
    pub fn new(mut samples: Vec<(DateTime<Utc>, GeoPosition)>) -> Self {
        samples.sort_by_key(|(time, _)| *time);
        let mut deduped: Vec<(DateTime<Utc>, GeoPosition)> = Vec::with_capacity(samples.len());
        for sample in samples {
            match deduped.last_mut() {
                Some(last) if last.0 == sample.0 => *last = sample,
                _ => deduped.push(sample),
            }
        }
        Self { samples: deduped }
    }

    #[must_use]
    pub fn from_waypoints(waypoints: &[RouteWaypoint]) -> Self {
        Self::new(waypoints.iter().map(|w| (w.timestamp, w.position)).collect())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.samples.first().map(|(time, _)| *time)
    }

    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.samples.last().map(|(time, _)| *time)
    }

    /// Index of the segment `[i, i + 1]` used for `time`.
    fn segment(&self, time: DateTime<Utc>) -> Option<usize> {
        if self.samples.len() < 2 {
            return None;
        }
        let upper = self.samples.partition_point(|(t, _)| *t <= time);
        Some(upper.clamp(1, self.samples.len() - 1) - 1)
    }

    /// Interpolated position at `time`.
    #[must_use]
    pub fn position_at(&self, time: DateTime<Utc>) -> Option<GeoPosition> {
        let (first_time, first) = self.samples.first()?;
        let (last_time, last) = self.samples.last()?;
        if time <= *first_time {
            return Some(*first);
        }
        if time >= *last_time {
            return Some(*last);
        }

        let i = self.segment(time)?;
        let (t0, p0) = &self.samples[i];
        let (t1, p1) = &self.samples[i + 1];
        let span = (*t1 - *t0).num_milliseconds();
        #[allow(clippy::cast_precision_loss, reason = "segment spans are hours at most")]
        let fraction = if span > 0 {
            (time - *t0).num_milliseconds() as f64 / span as f64
        } else {
            0.0
        };
        Some(lerp(p0, p1, fraction))
    }

    /// Direction of travel at `time`, from the velocity of the active segment.
    #[must_use]
    pub fn heading_at(&self, time: DateTime<Utc>) -> Option<f64> {
        let i = self.segment(time)?;
        let (_, from) = &self.samples[i];
        let (_, to) = &self.samples[i + 1];
        if from.lon == to.lon && from.lat == to.lat {
            return None;
        }
        Some(initial_bearing(from, to))
    }

    #[must_use]
    pub fn pose_at(&self, time: DateTime<Utc>) -> Option<Pose> {
        Some(Pose {
            position: self.position_at(time)?,
            heading: self.heading_at(time),
        })
    }
}
