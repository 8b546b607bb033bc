//! Storm cell service client.
//!
//! This module fetches time-bucketed storm cell polygons over HTTP
//! for the engine's weather layer.

pub mod storm_cells;

pub use storm_cells::HttpWeatherFeed;
