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

//! On-demand airport risk lookup for picked airport markers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scene::EntityHandle;
use crate::weather::FeedError;

/// Point risk assessment for an airport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSnapshot {
    /// Wind risk, percent.
    #[serde(alias = "wind_risk")]
    pub wind_risk: f64,
    /// Temperature risk, percent.
    #[serde(alias = "temperature_risk")]
    pub temperature_risk: f64,
    /// Pressure risk, percent.
    #[serde(alias = "pressure_risk")]
    pub pressure_risk: f64,
    /// Visibility risk, percent.
    #[serde(alias = "visibility_risk")]
    pub visibility_risk: f64,
    /// Overall classification, e.g. "LOW" or "HIGH".
    #[serde(alias = "label")]
    pub classification: String,
}

impl RiskSnapshot {
    /// Highest of the four component risks.
    #[must_use]
    pub fn peak(&self) -> f64 {
        [
            self.wind_risk,
            self.temperature_risk,
            self.pressure_risk,
            self.visibility_risk,
        ]
        .into_iter()
        .fold(0.0, f64::max)
    }
}

/// Errors from an airport pick.
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("{0} is not a known airport marker")]
    NotAirport(EntityHandle),

    #[error("airport marker {0} has no identifier")]
    MissingIdentifier(EntityHandle),

    #[error("risk lookup failed: {0}")]
    Feed(#[from] FeedError),
}

/// Source of airport risk snapshots.
pub trait RiskFeed: Send + Sync + 'static {
    /// Fetch the current risk for a 4-letter location indicator.
    fn fetch(&self, ident: String) -> impl Future<Output = Result<RiskSnapshot, FeedError>> + Send;
}

/// Configuration for risk lookups.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub fetch_timeout: Duration,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

/// Maps picked airport markers to risk fetches.
#[derive(Debug)]
pub struct AirportRiskLookup<R> {
    feed: Arc<R>,
    fetch_timeout: Duration,
    airports: HashMap<EntityHandle, Option<String>>,
}

impl<R: RiskFeed> AirportRiskLookup<R> {
    pub fn new(feed: R, config: &RiskConfig) -> Self {
        Self {
            feed: Arc::new(feed),
            fetch_timeout: config.fetch_timeout,
            airports: HashMap::new(),
        }
    }

    /// Tag `handle` as a pickable airport.
    pub fn register(&mut self, handle: EntityHandle, ident: Option<String>) {
        self.airports.insert(handle, ident);
    }

    /// Forget every registered airport.
    pub fn clear(&mut self) {
        self.airports.clear();
    }

    #[must_use]
    pub fn is_airport(&self, handle: EntityHandle) -> bool {
        self.airports.contains_key(&handle)
    }

    /// Identifier registered for `handle`.
    pub fn identifier(&self, handle: EntityHandle) -> Result<&str, RiskError> {
        self.airports
            .get(&handle)
            .ok_or(RiskError::NotAirport(handle))?
            .as_deref()
            .ok_or(RiskError::MissingIdentifier(handle))
    }

    /// Fetch risk for a picked entity.
    ///
    /// Picks that do not resolve to a registered airport are rejected
    /// without any network request.
    pub async fn on_pick(&self, handle: EntityHandle) -> Result<RiskSnapshot, RiskError> {
        let ident = self.identifier(handle)?.to_string();
        self.lookup(ident).await
    }

    /// Fetch risk for an identifier, bounded by the configured timeout.
    pub async fn lookup(&self, ident: String) -> Result<RiskSnapshot, RiskError> {
        info!("Fetching airport risk for {}", ident);
        let result = tokio::time::timeout(self.fetch_timeout, self.feed.fetch(ident.clone()))
            .await
            .unwrap_or(Err(FeedError::Timeout(self.fetch_timeout)));

        result.map_err(|e| {
            warn!("Airport risk for {} unavailable: {}", ident, e);
            RiskError::Feed(e)
        })
    }
}

/// Dismissible detail panel populated by a successful risk lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskPanel {
    content: Option<(String, RiskSnapshot)>,
}

impl RiskPanel {
    pub fn show(&mut self, ident: String, snapshot: RiskSnapshot) {
        self.content = Some((ident, snapshot));
    }

    pub fn dismiss(&mut self) {
        self.content = None;
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.content.is_some()
    }

    #[must_use]
    pub fn ident(&self) -> Option<&str> {
        self.content.as_ref().map(|(ident, _)| ident.as_str())
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<&RiskSnapshot> {
        self.content.as_ref().map(|(_, snapshot)| snapshot)
    }
}
