// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 mobci contributors

//! CouchDB-backed result store

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{ResultRecord, ResultStore};
use crate::errors::{MobciError, MobciResult};

/// User agent for store requests.
const USER_AGENT_VALUE: &str = concat!("mobci/", env!("CARGO_PKG_VERSION"));

/// Default database holding result records
pub const DEFAULT_DATABASE: &str = "mobilespec_results";

/// Result store client for a CouchDB server
#[derive(Debug, Clone)]
pub struct CouchDbStore {
    client: reqwest::Client,
    base_url: Url,
    database: String,
}

impl CouchDbStore {
    /// Create a store client; `wait` bounds every request
    pub fn new(uri: &str, database: &str, wait: Duration) -> MobciResult<Self> {
        // A trailing slash makes Url::join keep the last path segment
        let normalized = format!("{}/", uri.trim_end_matches('/'));
        let base_url = Url::parse(&normalized).map_err(|e| MobciError::InvalidConfig {
            reason: format!("invalid store URI '{}': {}", uri, e),
            help: Some("Expected something like http://localhost:5984".into()),
        })?;

        let client = reqwest::Client::builder()
            .timeout(wait)
            .user_agent(USER_AGENT_VALUE)
            .build()
            .map_err(|e| MobciError::StoreUnreachable {
                uri: uri.to_string(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            database: database.to_string(),
        })
    }

    fn record_url(&self, key: &str) -> MobciResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MobciError::invalid_config(format!("store URI '{}' cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push(&self.database)
            .push(key);
        Ok(url)
    }

    fn uri(&self) -> String {
        self.base_url.as_str().trim_end_matches('/').to_string()
    }
}

#[async_trait]
impl ResultStore for CouchDbStore {
    async fn fetch(&self, key: &str) -> MobciResult<ResultRecord> {
        let url = self.record_url(key)?;
        debug!(url = %url, "fetching result record");

        let response = self.client.get(url).send().await.map_err(|e| {
            MobciError::StoreUnreachable {
                uri: self.uri(),
                message: e.to_string(),
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(MobciError::RecordNotFound {
                key: key.to_string(),
                link: self.record_link(key),
            });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MobciError::StoreError {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await.map_err(|e| MobciError::StoreUnreachable {
            uri: self.uri(),
            message: e.to_string(),
        })?;

        serde_json::from_str(&body).map_err(|e| MobciError::InvalidRecord {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    fn record_link(&self, key: &str) -> String {
        format!("{}/_utils/#database/{}/{}", self.uri(), self.database, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_url_encodes_key() {
        let store =
            CouchDbStore::new("http://couch.local:5984/", DEFAULT_DATABASE, Duration::from_secs(5))
                .unwrap();
        let url = store.record_url("windows-3-build host").unwrap();
        assert_eq!(
            url.as_str(),
            "http://couch.local:5984/mobilespec_results/windows-3-build%20host"
        );
    }

    #[test]
    fn test_record_url_keeps_base_path() {
        let store = CouchDbStore::new("https://example.com/couch", "results", Duration::from_secs(5))
            .unwrap();
        let url = store.record_url("ios-1-mac").unwrap();
        assert_eq!(url.as_str(), "https://example.com/couch/results/ios-1-mac");
    }

    #[test]
    fn test_record_link() {
        let store =
            CouchDbStore::new("http://couch.local:5984", DEFAULT_DATABASE, Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            store.record_link("android-1-w"),
            "http://couch.local:5984/_utils/#database/mobilespec_results/android-1-w"
        );
    }

    #[test]
    fn test_invalid_uri_is_config_error() {
        let err = CouchDbStore::new("not a uri", DEFAULT_DATABASE, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, MobciError::InvalidConfig { .. }));
    }
}
