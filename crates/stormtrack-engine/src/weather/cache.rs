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

//! Time-bucketed weather cache.
//!
//! Each bucket owns a single-initialization slot. The first caller for a
//! bucket performs the request; concurrent callers for the same bucket wait
//! on that request instead of issuing their own. Failures and timeouts are
//! cached as "no weather" so an unreachable service is asked once per bucket.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::OnceCell;

use super::{WeatherConfig, WeatherFeed};
use crate::geojson::WeatherGeometry;
use crate::time_bucket::TimeBucket;

/// Result stored per bucket; `None` records an empty or failed fetch.
pub type CachedWeather = Option<Arc<WeatherGeometry>>;

type Slot = Arc<OnceCell<CachedWeather>>;

/// Weather cache keyed by [`TimeBucket`].
///
/// Cloning yields another handle to the same cache.
pub struct WeatherCache<F> {
    feed: Arc<F>,
    fetch_timeout: Duration,
    entries: Arc<Mutex<HashMap<TimeBucket, Slot>>>,
    generation: Arc<AtomicU64>,
}

impl<F> Clone for WeatherCache<F> {
    fn clone(&self) -> Self {
        Self {
            feed: Arc::clone(&self.feed),
            fetch_timeout: self.fetch_timeout,
            entries: Arc::clone(&self.entries),
            generation: Arc::clone(&self.generation),
        }
    }
}

impl<F> std::fmt::Debug for WeatherCache<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherCache")
            .field("entries", &self.lock().len())
            .field("generation", &self.generation())
            .field("fetch_timeout", &self.fetch_timeout)
            .finish_non_exhaustive()
    }
}

impl<F: WeatherFeed> WeatherCache<F> {
    /// Create a cache in front of `feed`.
    pub fn new(feed: F, config: &WeatherConfig) -> Self {
        Self::with_shared_feed(Arc::new(feed), config)
    }

    /// Create a cache around an already shared feed.
    pub fn with_shared_feed(feed: Arc<F>, config: &WeatherConfig) -> Self {
        Self {
            feed,
            fetch_timeout: config.fetch_timeout,
            entries: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Return the weather for `bucket`, fetching it on first use.
    ///
    /// Never fails: transport errors, timeouts and empty responses all
    /// resolve to `None` and are remembered for the bucket.
    pub async fn get_or_fetch(&self, bucket: TimeBucket) -> CachedWeather {
        let slot = {
            let mut entries = self.lock();
            Arc::clone(entries.entry(bucket).or_default())
        };

        slot.get_or_init(|| self.fetch(bucket)).await.clone()
    }

    async fn fetch(&self, bucket: TimeBucket) -> CachedWeather {
        debug!("Fetching weather for bucket {}", bucket);

        match tokio::time::timeout(self.fetch_timeout, self.feed.fetch(bucket)).await {
            Ok(Ok(Some(geometry))) => {
                info!("Weather for {}: {} storm cells", bucket, geometry.cells.len());
                Some(Arc::new(geometry))
            }
            Ok(Ok(None)) => {
                debug!("No weather reported for {}", bucket);
                None
            }
            Ok(Err(e)) => {
                warn!("Weather fetch for {} failed: {}", bucket, e);
                None
            }
            Err(_) => {
                warn!(
                    "Weather fetch for {} timed out after {} seconds",
                    bucket,
                    self.fetch_timeout.as_secs()
                );
                None
            }
        }
    }
}

impl<F> WeatherCache<F> {
    fn lock(&self) -> MutexGuard<'_, HashMap<TimeBucket, Slot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolved entry for `bucket`, without fetching.
    ///
    /// The outer `Option` is `None` on a miss or while a fetch is in flight.
    #[must_use]
    pub fn get(&self, bucket: &TimeBucket) -> Option<CachedWeather> {
        self.lock().get(bucket).and_then(|slot| slot.get().cloned())
    }

    /// Whether a fetch for `bucket` has started but not resolved.
    #[must_use]
    pub fn is_pending(&self, bucket: &TimeBucket) -> bool {
        self.lock()
            .get(bucket)
            .is_some_and(|slot| !slot.initialized())
    }

    /// Number of resolved buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().values().filter(|slot| slot.initialized()).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reset counter, bumped by every [`reset`](Self::reset).
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Drop every entry.
    ///
    /// Fetches still in flight complete into slots that are no longer
    /// reachable, so their results never reappear in this cache.
    pub fn reset(&self) {
        let mut entries = self.lock();
        let dropped = entries.len();
        entries.clear();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Weather cache reset (generation {}, {} buckets dropped)", generation, dropped);
    }
}
