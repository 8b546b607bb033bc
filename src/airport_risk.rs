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

//! Airport risk service client.
//!
//! Fetches the wind/temperature/pressure/visibility risk snapshot for a
//! 4-letter location indicator from `GET {base_url}/{ident}/risk`.

use std::future::Future;

use log::debug;
use stormtrack_engine::{FeedError, RiskFeed, RiskSnapshot};

#[derive(Debug, Clone)]
pub struct HttpRiskFeed {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpRiskFeed {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    fn request_url(&self, ident: &str) -> String {
        format!(
            "{}/{}/risk",
            self.base_url.trim_end_matches('/'),
            ident.to_ascii_uppercase()
        )
    }

    async fn fetch_from_api(&self, ident: String) -> Result<RiskSnapshot, FeedError> {
        let url = self.request_url(&ident);
        debug!("GET {}", url);

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl RiskFeed for HttpRiskFeed {
    fn fetch(&self, ident: String) -> impl Future<Output = Result<RiskSnapshot, FeedError>> + Send {
        self.fetch_from_api(ident)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url() {
        let feed = HttpRiskFeed::new("http://risk.local/api/airports/".to_string(), None);
        assert_eq!(feed.request_url("kjfk"), "http://risk.local/api/airports/KJFK/risk");
    }
}
