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

//! Severe weather retrieval.
//!
//! [`WeatherFeed`] is the network boundary: one request per time bucket.
//! [`WeatherCache`] sits in front of it, bounding every request with a
//! timeout and remembering both hits and misses until it is reset.

mod cache;

pub use cache::{CachedWeather, WeatherCache};

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::geojson::WeatherGeometry;
use crate::time_bucket::{TimeBucket, DEFAULT_BUCKET_MINUTES};

/// Errors reported by network feeds.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of storm cell geometry for a time bucket.
pub trait WeatherFeed: Send + Sync + 'static {
    /// Fetch the storm cells valid at `bucket`.
    ///
    /// `Ok(None)` means the service answered but reported no weather.
    fn fetch(
        &self,
        bucket: TimeBucket,
    ) -> impl Future<Output = Result<Option<WeatherGeometry>, FeedError>> + Send;
}

/// Configuration for weather retrieval.
#[derive(Debug, Clone)]
pub struct WeatherConfig {
    /// Upper bound on a single weather request.
    pub fetch_timeout: Duration,
    /// Width of the time buckets used as cache keys.
    pub bucket_minutes: u32,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(180),
            bucket_minutes: DEFAULT_BUCKET_MINUTES,
        }
    }
}
