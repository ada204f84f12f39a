use std::collections::HashMap;

use async_trait::async_trait;
use hawk_core::{Credential, StoreAdapter, StoreError};
use reqwest::{header::CONTENT_TYPE, Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};

use crate::http::{build_client, error_body, transport_err, trim_base, Auth};

/// Elasticsearch connection settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ElasticsearchConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Encoded API key; takes precedence over basic auth.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout; unset means 30 seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            index: default_index(),
            username: None,
            password: None,
            api_key: None,
            timeout_secs: None,
        }
    }
}

fn default_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_index() -> String {
    "hawk".to_string()
}

/// Stores each credential as a document in one index, keyed by credential id.
/// The HTTP client pools connections itself, so there is no session to start.
pub struct ElasticsearchAdapter {
    cfg: ElasticsearchConfig,
    client: Client,
    auth: Auth,
}

impl ElasticsearchAdapter {
    pub fn new(cfg: ElasticsearchConfig) -> Result<Self, StoreError> {
        let client = build_client(cfg.timeout_secs)?;
        let auth = Auth::from_parts(
            cfg.username.as_deref(),
            cfg.password.as_deref(),
            cfg.api_key.as_deref(),
        );
        Ok(Self { cfg, client, auth })
    }

    fn base_url(&self) -> &str {
        trim_base(&self.cfg.url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{path}", self.base_url());
        self.auth.apply(self.client.request(method, url))
    }

    fn doc_path(&self, id: &str) -> String {
        format!("{}/_doc/{id}", self.cfg.index)
    }
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source")]
    source: Option<Credential>,
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_id")]
    id: String,
    status: u16,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

#[async_trait]
impl StoreAdapter for ElasticsearchAdapter {
    fn name(&self) -> &'static str {
        "elasticsearch"
    }

    #[instrument(skip_all, fields(index = %self.cfg.index, id = %id))]
    async fn fetch(&self, id: &str) -> Result<Option<Credential>, StoreError> {
        let response = self
            .request(Method::GET, &self.doc_path(id))
            .send()
            .await
            .map_err(transport_err)?;

        match response.status() {
            StatusCode::OK => {
                let body: GetResponse = response.json().await.map_err(StoreError::decode)?;
                if !body.found {
                    return Ok(None);
                }
                body.source
                    .map(Some)
                    .ok_or_else(|| StoreError::decode("document has no _source"))
            }
            // Missing document and missing index both mean "no such credential".
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(es_error(response).await),
        }
    }

    #[instrument(skip_all, fields(index = %self.cfg.index, id = %id))]
    async fn insert_if_absent(
        &self,
        id: &str,
        credential: &Credential,
    ) -> Result<(), StoreError> {
        let path = format!("{}/_create/{id}", self.cfg.index);
        let response = self
            .request(Method::PUT, &path)
            .json(credential)
            .send()
            .await
            .map_err(transport_err)?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            StatusCode::CONFLICT => Err(StoreError::AlreadyExists { id: id.to_string() }),
            _ => Err(es_error(response).await),
        }
    }

    #[instrument(skip_all, fields(index = %self.cfg.index, id = %id))]
    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let response = self
            .request(Method::DELETE, &self.doc_path(id))
            .send()
            .await
            .map_err(transport_err)?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(es_error(response).await),
        }
    }

    #[instrument(skip_all, fields(index = %self.cfg.index, count = ids.len()))]
    async fn remove_many(&self, ids: &[String]) -> Result<Vec<String>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut body = String::new();
        for id in ids {
            body.push_str(&json!({ "delete": { "_index": self.cfg.index, "_id": id } }).to_string());
            body.push('\n');
        }

        let response = self
            .request(Method::POST, "_bulk")
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(transport_err)?;
        if response.status() != StatusCode::OK {
            return Err(es_error(response).await);
        }

        let bulk: BulkResponse = response.json().await.map_err(StoreError::decode)?;
        let mut removed = Vec::with_capacity(bulk.items.len());
        for item in bulk.items.into_iter().filter_map(|mut item| item.remove("delete")) {
            match (item.status, item.result.as_deref()) {
                (200, Some("deleted")) => removed.push(item.id),
                (404, _) => debug!(id = %item.id, "bulk delete: not found"),
                (status, _) => {
                    let error = item.error.unwrap_or(Value::Null);
                    return Err(error_from_body(status, &json!({ "error": error })));
                }
            }
        }
        Ok(removed)
    }
}

async fn es_error(response: Response) -> StoreError {
    let status = response.status().as_u16();
    let body = error_body(response).await;
    error_from_body(status, &body)
}

/// Elasticsearch reports `{"error": {"type", "reason"}, "status"}`; older
/// releases put a plain string under `error`.
fn error_from_body(status: u16, body: &Value) -> StoreError {
    let error = &body["error"];
    let code = error["type"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string());
    let reason = error["reason"]
        .as_str()
        .or_else(|| error.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("unexpected status {status}"));
    StoreError::backend(code, reason)
}

#[cfg(test)]
mod tests {
    use hawk_core::{Algorithm, CredentialFactory};
    use mockito::{Matcher, Server};

    use super::*;

    fn adapter_for(server: &Server) -> ElasticsearchAdapter {
        ElasticsearchAdapter::new(ElasticsearchConfig {
            url: server.url(),
            ..ElasticsearchConfig::default()
        })
        .expect("adapter")
    }

    #[test]
    fn config_defaults_match_local_cluster() {
        let cfg = ElasticsearchConfig::default();
        assert_eq!(cfg.url, "http://localhost:9200");
        assert_eq!(cfg.index, "hawk");
    }

    #[tokio::test]
    async fn fetch_returns_source_when_found() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/hawk/_doc/abc")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "_index": "hawk",
                    "_id": "abc",
                    "found": true,
                    "_source": { "id": "abc", "key": "secret", "algorithm": "sha256" }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let fetched = adapter_for(&server).fetch("abc").await.expect("fetch");

        assert_eq!(
            fetched,
            Some(Credential {
                id: "abc".into(),
                key: "secret".into(),
                algorithm: Algorithm::Sha256,
            })
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fetch_normalizes_not_found() {
        let mut server = Server::new_async().await;
        let _mock1 = server
            .mock("GET", "/hawk/_doc/missing")
            .with_status(404)
            .with_body(json!({ "_index": "hawk", "_id": "missing", "found": false }).to_string())
            .create_async()
            .await;
        let _mock2 = server
            .mock("GET", "/hawk/_doc/noindex")
            .with_status(404)
            .with_body(
                json!({
                    "error": { "type": "index_not_found_exception", "reason": "no such index [hawk]" },
                    "status": 404
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = adapter_for(&server);
        assert_eq!(adapter.fetch("missing").await.expect("fetch"), None);
        assert_eq!(adapter.fetch("noindex").await.expect("fetch"), None);
    }

    #[tokio::test]
    async fn fetch_surfaces_backend_code() {
        let mut server = Server::new_async().await;
        let _mock3 = server
            .mock("GET", "/hawk/_doc/abc")
            .with_status(503)
            .with_body(
                json!({
                    "error": { "type": "cluster_block_exception", "reason": "blocked by: [SERVICE_UNAVAILABLE]" },
                    "status": 503
                })
                .to_string(),
            )
            .create_async()
            .await;

        let err = adapter_for(&server)
            .fetch("abc")
            .await
            .expect_err("should fail");

        assert_eq!(
            err,
            StoreError::backend("cluster_block_exception", "blocked by: [SERVICE_UNAVAILABLE]")
        );
    }

    #[tokio::test]
    async fn insert_uses_create_op_and_maps_conflict() {
        let credential = CredentialFactory::new().generate();
        let path = format!("/hawk/_create/{}", credential.id);
        let mut server = Server::new_async().await;
        let created = server
            .mock("PUT", path.as_str())
            .match_body(Matcher::Json(serde_json::to_value(&credential).unwrap()))
            .with_status(201)
            .with_body(json!({ "result": "created" }).to_string())
            .expect(1)
            .create_async()
            .await;

        let adapter = adapter_for(&server);
        adapter
            .insert_if_absent(&credential.id, &credential)
            .await
            .expect("insert");
        created.assert_async().await;
        created.remove_async().await;

        let _mock4 = server
            .mock("PUT", path.as_str())
            .with_status(409)
            .with_body(
                json!({
                    "error": { "type": "version_conflict_engine_exception", "reason": "document already exists" },
                    "status": 409
                })
                .to_string(),
            )
            .create_async()
            .await;

        let err = adapter
            .insert_if_absent(&credential.id, &credential)
            .await
            .expect_err("duplicate insert");
        assert_eq!(
            err,
            StoreError::AlreadyExists {
                id: credential.id.clone()
            }
        );
    }

    #[tokio::test]
    async fn remove_treats_missing_as_not_removed() {
        let mut server = Server::new_async().await;
        let _mock5 = server
            .mock("DELETE", "/hawk/_doc/abc")
            .with_status(200)
            .with_body(json!({ "result": "deleted" }).to_string())
            .create_async()
            .await;
        let _mock6 = server
            .mock("DELETE", "/hawk/_doc/gone")
            .with_status(404)
            .with_body(json!({ "result": "not_found" }).to_string())
            .create_async()
            .await;

        let adapter = adapter_for(&server);
        assert!(adapter.remove("abc").await.expect("remove"));
        assert!(!adapter.remove("gone").await.expect("remove missing"));
    }

    #[tokio::test]
    async fn insert_and_remove_surface_backend_faults() {
        let credential = CredentialFactory::new().generate();
        let mut server = Server::new_async().await;
        let _create = server
            .mock("PUT", format!("/hawk/_create/{}", credential.id).as_str())
            .with_status(503)
            .with_body(
                json!({
                    "error": { "type": "unavailable_shards_exception", "reason": "primary shard is not active" },
                    "status": 503
                })
                .to_string(),
            )
            .create_async()
            .await;
        let _delete = server
            .mock("DELETE", "/hawk/_doc/abc")
            .with_status(500)
            .with_body(
                json!({
                    "error": { "type": "circuit_breaking_exception", "reason": "data too large" },
                    "status": 500
                })
                .to_string(),
            )
            .create_async()
            .await;

        let adapter = adapter_for(&server);
        assert_eq!(
            adapter.insert_if_absent(&credential.id, &credential).await,
            Err(StoreError::backend(
                "unavailable_shards_exception",
                "primary shard is not active"
            ))
        );
        assert_eq!(
            adapter.remove("abc").await,
            Err(StoreError::backend("circuit_breaking_exception", "data too large"))
        );
    }

    #[tokio::test]
    async fn remove_many_sends_bulk_deletes() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/_bulk")
            .match_header("content-type", "application/x-ndjson")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex(r#"^\{"delete":\{[^\n]*"_id":"a"[^\n]*\}\}\n"#.into()),
                Matcher::Regex(r#"\n\{"delete":\{[^\n]*"_id":"b"[^\n]*\}\}\n$"#.into()),
                Matcher::Regex(r#""_index":"hawk""#.into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "took": 3,
                    "errors": false,
                    "items": [
                        { "delete": { "_index": "hawk", "_id": "a", "status": 200, "result": "deleted" } },
                        { "delete": { "_index": "hawk", "_id": "b", "status": 404, "result": "not_found" } }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let removed = adapter_for(&server)
            .remove_many(&["a".to_string(), "b".to_string()])
            .await
            .expect("bulk delete");

        assert_eq!(removed, vec!["a".to_string()]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn remove_many_fails_on_item_error() {
        let mut server = Server::new_async().await;
        let _mock7 = server
            .mock("POST", "/_bulk")
            .with_status(200)
            .with_body(
                json!({
                    "errors": true,
                    "items": [
                        { "delete": {
                            "_id": "a",
                            "status": 429,
                            "error": { "type": "es_rejected_execution_exception", "reason": "queue full" }
                        } }
                    ]
                })
                .to_string(),
            )
            .create_async()
            .await;

        let err = adapter_for(&server)
            .remove_many(&["a".to_string()])
            .await
            .expect_err("item error");

        assert_eq!(
            err,
            StoreError::backend("es_rejected_execution_exception", "queue full")
        );
    }

    #[tokio::test]
    async fn api_key_takes_precedence_over_basic_auth() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/hawk/_doc/abc")
            .match_header("authorization", "ApiKey c2VjcmV0")
            .with_status(404)
            .with_body(json!({ "found": false }).to_string())
            .create_async()
            .await;

        let adapter = ElasticsearchAdapter::new(ElasticsearchConfig {
            url: format!("{}/", server.url()),
            username: Some("elastic".into()),
            password: Some("changeme".into()),
            api_key: Some("c2VjcmV0".into()),
            ..ElasticsearchConfig::default()
        })
        .expect("adapter");

        assert_eq!(adapter.fetch("abc").await.expect("fetch"), None);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_cluster_is_a_connection_error() {
        let adapter = ElasticsearchAdapter::new(ElasticsearchConfig {
            url: "http://127.0.0.1:1".into(),
            ..ElasticsearchConfig::default()
        })
        .expect("adapter");

        let err = adapter.fetch("abc").await.expect_err("nothing listens");
        assert!(err.is_connection(), "unexpected error: {err:?}");
    }
}
