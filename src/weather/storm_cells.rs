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

//! HTTP storm cell feed.

use std::future::Future;

use log::debug;
use reqwest::StatusCode;
use serde_json::Value;
use stormtrack_engine::{FeedError, TimeBucket, WeatherFeed, WeatherGeometry};

/// Fetches storm cells from `GET {base_url}?time={bucket}`.
///
/// The service answers with a GeoJSON FeatureCollection of polygons, or
/// `204 No Content` / an empty body when there is no weather.
#[derive(Debug, Clone)]
pub struct HttpWeatherFeed {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpWeatherFeed {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    fn request_url(&self, bucket: &TimeBucket) -> String {
        format!("{}?time={}", self.base_url.trim_end_matches('/'), bucket.key())
    }

    async fn fetch_from_api(&self, bucket: TimeBucket) -> Result<Option<WeatherGeometry>, FeedError> {
        let url = self.request_url(&bucket);
        debug!("GET {}", url);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(FeedError::Status(status.as_u16()));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        parse_body(&body)
    }
}

/// Decode a response body. Blank bodies and `null` mean no weather.
fn parse_body(body: &str) -> Result<Option<WeatherGeometry>, FeedError> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(body)?;
    if value.is_null() {
        return Ok(None);
    }
    Ok(WeatherGeometry::from_json(&value))
}

impl WeatherFeed for HttpWeatherFeed {
    fn fetch(
        &self,
        bucket: TimeBucket,
    ) -> impl Future<Output = Result<Option<WeatherGeometry>, FeedError>> + Send {
        self.fetch_from_api(bucket)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_request_url_uses_bucket_key() {
        let feed = HttpWeatherFeed::new("http://wx.local/api/weather/".to_string(), None);
        let bucket = TimeBucket::floor(Utc.with_ymd_and_hms(2024, 6, 15, 12, 7, 31).unwrap());
        assert_eq!(
            feed.request_url(&bucket),
            "http://wx.local/api/weather?time=2024-06-15T12:05:00.000Z"
        );
    }

    #[test]
    fn test_parse_body_variants() {
        assert!(parse_body("").unwrap().is_none());
        assert!(parse_body("null").unwrap().is_none());
        assert!(parse_body("{oops").is_err());

        let body = r#"{
            "type": "FeatureCollection",
            "features": [{
                "type": "Feature",
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-97.0, 35.0], [-96.0, 35.0], [-96.0, 36.0], [-97.0, 35.0]]]
                },
                "properties": {}
            }]
        }"#;
        let geometry = parse_body(body).unwrap().unwrap();
        assert_eq!(geometry.cells.len(), 1);
    }
}
