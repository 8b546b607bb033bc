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

//! Route playback.
//!
//! A [`PlaybackClock`] runs simulated time between departure and the last
//! waypoint, a [`SampledTrack`] turns the discrete waypoints into a
//! continuous position and heading, and the [`RoutePlaybackController`]
//! ties the two together and reports weather bucket transitions.

mod clock;
mod controller;
mod track;

pub use clock::{ClockRange, PlaybackClock};
pub use controller::{PlaybackConfig, RoutePlaybackController, SeededRoute, TickUpdate};
pub use track::{Pose, SampledTrack};
