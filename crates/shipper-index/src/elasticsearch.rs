//! Elasticsearch backend over its REST API.

use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::config::ElasticsearchConfig;
use crate::error::{IndexError, Result};
use crate::store::{CreateOutcome, IndexStore};

const ALREADY_EXISTS: &str = "resource_already_exists_exception";

#[derive(Deserialize)]
struct CreateIndexResponse {
    #[serde(default)]
    acknowledged: bool,
}

#[derive(Deserialize)]
struct IndexDocumentResponse {
    #[serde(rename = "_id")]
    id: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    kind: String,
}

/// [`IndexStore`] backed by an Elasticsearch cluster.
#[derive(Debug, Clone)]
pub struct ElasticsearchStore {
    client: Client,
    config: ElasticsearchConfig,
}

impl ElasticsearchStore {
    /// Creates a store for the configured cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: ElasticsearchConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| IndexError::Config(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url())
    }

    fn map_err(&self, err: &reqwest::Error) -> IndexError {
        if err.is_timeout() {
            IndexError::Timeout(self.config.timeout)
        } else {
            IndexError::Request(err.to_string())
        }
    }

    async fn unexpected(response: Response) -> IndexError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        IndexError::Status { status, body }
    }
}

/// Returns true if an error response body reports an existing index.
fn is_already_exists(body: &str) -> bool {
    serde_json::from_str::<ErrorResponse>(body)
        .is_ok_and(|r| r.error.kind == ALREADY_EXISTS)
}

impl IndexStore for ElasticsearchStore {
    async fn exists(&self, index: &str) -> Result<bool> {
        let response = self
            .client
            .head(self.url(index))
            .send()
            .await
            .map_err(|e| self.map_err(&e))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(Self::unexpected(response).await),
        }
    }

    async fn create(&self, index: &str, mapping: &serde_json::Value) -> Result<CreateOutcome> {
        let response = self
            .client
            .put(self.url(index))
            .json(mapping)
            .send()
            .await
            .map_err(|e| self.map_err(&e))?;

        let status = response.status();
        if status.is_success() {
            let body: CreateIndexResponse =
                response.json().await.map_err(|e| self.map_err(&e))?;
            return Ok(CreateOutcome::Created {
                acknowledged: body.acknowledged,
            });
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST && is_already_exists(&body) {
            debug!(index, "index created concurrently");
            return Ok(CreateOutcome::AlreadyExists);
        }
        Err(IndexError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn write(&self, index: &str, document: &serde_json::Value) -> Result<String> {
        let response = self
            .client
            .post(self.url(&format!("{index}/_doc")))
            .json(document)
            .send()
            .await
            .map_err(|e| self.map_err(&e))?;

        if !response.status().is_success() {
            return Err(Self::unexpected(response).await);
        }
        let body: IndexDocumentResponse = response.json().await.map_err(|e| self.map_err(&e))?;
        Ok(body.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_already_exists_error() {
        let body = r#"{"error":{"root_cause":[],"type":"resource_already_exists_exception",
            "reason":"index [logstash-2009.02.13/abc] already exists"},"status":400}"#;
        assert!(is_already_exists(body));
    }

    #[test]
    fn other_errors_are_not_already_exists() {
        assert!(!is_already_exists(
            r#"{"error":{"type":"invalid_index_name_exception"},"status":400}"#
        ));
        assert!(!is_already_exists("not json"));
    }

    #[test]
    fn new_rejects_invalid_config() {
        let result = ElasticsearchStore::new(ElasticsearchConfig::new("localhost:9200"));
        assert!(matches!(result, Err(IndexError::Config(_))));
    }

    #[test]
    fn urls_join_base_and_path() {
        let store = ElasticsearchStore::new(ElasticsearchConfig::new("http://es:9200/"));
        assert!(store.is_ok());
        if let Ok(store) = store {
            assert_eq!(store.url("logstash-2009.02.13"), "http://es:9200/logstash-2009.02.13");
        }
    }

    #[tokio::test]
    async fn unreachable_cluster_is_a_request_error() {
        let config = ElasticsearchConfig::new("http://127.0.0.1:1")
            .with_timeout(std::time::Duration::from_secs(2));
        let Ok(store) = ElasticsearchStore::new(config) else {
            return;
        };
        let result = store.exists("logstash-2009.02.13").await;
        assert!(matches!(
            result,
            Err(IndexError::Request(_) | IndexError::Timeout(_))
        ));
    }
}
