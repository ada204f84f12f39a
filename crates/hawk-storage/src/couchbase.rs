use std::{pin::pin, sync::Arc};

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use hawk_core::{
    ConnectionLifecycle, ConnectionState, Connector, Credential, LifecycleListener, StoreAdapter,
    StoreError,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::http::{build_client, error_body, transport_err, trim_base, Auth};

/// Upper bound on document deletes in flight during a batch remove.
pub const MAX_CONCURRENT_DELETES: usize = 8;

/// Couchbase connection settings (Data API).
///
/// `hosts` are Data API endpoints. The Data API is served over HTTPS on the
/// standard port; the cluster manager port (8091) does not expose it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct CouchbaseConfig {
    /// Bootstrap hosts, tried in order.
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_keyspace")]
    pub scope: String,
    #[serde(default = "default_keyspace")]
    pub collection: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Per-request timeout; unset means 30 seconds.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for CouchbaseConfig {
    fn default() -> Self {
        Self {
            hosts: default_hosts(),
            bucket: default_bucket(),
            scope: default_keyspace(),
            collection: default_keyspace(),
            username: None,
            password: None,
            timeout_secs: None,
        }
    }
}

fn default_hosts() -> Vec<String> {
    vec!["https://localhost".to_string()]
}

fn default_bucket() -> String {
    "default".to_string()
}

fn default_keyspace() -> String {
    "_default".to_string()
}

/// Session against one Couchbase node, established by [`CouchbaseConnector`].
#[derive(Debug)]
pub struct CouchbaseConnection {
    host: String,
    documents_url: String,
    client: Client,
    auth: Auth,
}

impl CouchbaseConnection {
    /// Host this session bootstrapped against.
    pub fn host(&self) -> &str {
        &self.host
    }

    fn request(&self, method: Method, id: &str) -> RequestBuilder {
        let url = format!("{}/{id}", self.documents_url);
        self.auth.apply(self.client.request(method, url))
    }
}

/// Dials the configured hosts in order and keeps the first one that accepts
/// our identity.
pub struct CouchbaseConnector {
    cfg: CouchbaseConfig,
}

impl CouchbaseConnector {
    pub fn new(cfg: CouchbaseConfig) -> Self {
        Self { cfg }
    }

    fn auth(&self) -> Auth {
        Auth::from_parts(
            self.cfg.username.as_deref(),
            self.cfg.password.as_deref(),
            None,
        )
    }

    fn documents_url(&self, host: &str) -> String {
        format!(
            "{}/v1/buckets/{}/scopes/{}/collections/{}/documents",
            trim_base(host),
            self.cfg.bucket,
            self.cfg.scope,
            self.cfg.collection
        )
    }
}

#[async_trait]
impl Connector for CouchbaseConnector {
    type Connection = CouchbaseConnection;

    fn name(&self) -> &'static str {
        "couchbase"
    }

    #[instrument(skip_all, fields(bucket = %self.cfg.bucket))]
    async fn connect(&self) -> Result<CouchbaseConnection, StoreError> {
        let client = build_client(self.cfg.timeout_secs)?;
        let auth = self.auth();
        let mut last_error = StoreError::Connection {
            reason: "no couchbase hosts configured".to_string(),
        };

        for host in &self.cfg.hosts {
            let url = format!("{}/v1/callerIdentity", trim_base(host));
            match auth.apply(client.get(&url)).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(%host, "bootstrap succeeded");
                    return Ok(CouchbaseConnection {
                        host: host.clone(),
                        documents_url: self.documents_url(host),
                        client,
                        auth,
                    });
                }
                Ok(response)
                    if matches!(
                        response.status(),
                        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
                    ) =>
                {
                    return Err(StoreError::Connection {
                        reason: format!("{host} rejected credentials ({})", response.status()),
                    });
                }
                Ok(response) => {
                    warn!(%host, status = %response.status(), "bootstrap host unavailable");
                    last_error = StoreError::Connection {
                        reason: format!("{host} answered {}", response.status()),
                    };
                }
                Err(err) => {
                    warn!(%host, error = %err, "bootstrap host unreachable");
                    last_error = StoreError::connection(err);
                }
            }
        }
        Err(last_error)
    }

    async fn disconnect(&self, connection: &CouchbaseConnection) -> Result<(), StoreError> {
        // HTTP sessions hold no server-side state; dropping the client closes its pool.
        debug!(host = %connection.host, "closing couchbase session");
        Ok(())
    }
}

/// Couchbase-backed adapter. Operations require `start` to have connected.
pub struct CouchbaseAdapter {
    lifecycle: ConnectionLifecycle<CouchbaseConnector>,
}

impl CouchbaseAdapter {
    pub fn new(cfg: CouchbaseConfig) -> Self {
        Self {
            lifecycle: ConnectionLifecycle::new(CouchbaseConnector::new(cfg)),
        }
    }

    pub fn with_listeners(
        mut self,
        listeners: impl IntoIterator<Item = Arc<dyn LifecycleListener>>,
    ) -> Self {
        self.lifecycle = self.lifecycle.with_listeners(listeners);
        self
    }

    pub fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }
}

#[async_trait]
impl StoreAdapter for CouchbaseAdapter {
    fn name(&self) -> &'static str {
        "couchbase"
    }

    async fn start(&self) -> Result<(), StoreError> {
        self.lifecycle.start().await
    }

    async fn stop(&self) -> Result<(), StoreError> {
        self.lifecycle.stop().await
    }

    fn subscribe(&self) -> Option<watch::Receiver<ConnectionState>> {
        Some(self.lifecycle.subscribe())
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn fetch(&self, id: &str) -> Result<Option<Credential>, StoreError> {
        let connection = self.lifecycle.connection().await?;
        let response = connection
            .request(Method::GET, id)
            .send()
            .await
            .map_err(transport_err)?;

        match response.status() {
            StatusCode::OK => response.json().await.map(Some).map_err(StoreError::decode),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(couchbase_error(response).await),
        }
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn insert_if_absent(
        &self,
        id: &str,
        credential: &Credential,
    ) -> Result<(), StoreError> {
        let connection = self.lifecycle.connection().await?;
        let response = connection
            .request(Method::POST, id)
            .json(credential)
            .send()
            .await
            .map_err(transport_err)?;

        match response.status() {
            StatusCode::OK | StatusCode::CREATED => Ok(()),
            StatusCode::CONFLICT => Err(StoreError::AlreadyExists { id: id.to_string() }),
            _ => Err(couchbase_error(response).await),
        }
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn remove(&self, id: &str) -> Result<bool, StoreError> {
        let connection = self.lifecycle.connection().await?;
        remove_document(&connection, id).await
    }

    #[instrument(skip_all, fields(count = ids.len()))]
    async fn remove_many(&self, ids: &[String]) -> Result<Vec<String>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let connection = self.lifecycle.connection().await?;
        let connection = connection.as_ref();
        let mut outcomes = pin!(stream::iter(ids)
            .map(move |id| async move { (id, remove_document(connection, id).await) })
            .buffered(MAX_CONCURRENT_DELETES)
            .boxed());

        // Results arrive in request order; the first failure ends the batch.
        let mut removed = Vec::with_capacity(ids.len());
        while let Some((id, outcome)) = outcomes.next().await {
            if outcome? {
                removed.push(id.clone());
            }
        }
        Ok(removed)
    }
}

async fn remove_document(connection: &CouchbaseConnection, id: &str) -> Result<bool, StoreError> {
    let response = connection
        .request(Method::DELETE, id)
        .send()
        .await
        .map_err(transport_err)?;

    match response.status() {
        StatusCode::OK | StatusCode::NO_CONTENT => Ok(true),
        StatusCode::NOT_FOUND => Ok(false),
        _ => Err(couchbase_error(response).await),
    }
}

async fn couchbase_error(response: Response) -> StoreError {
    let status = response.status().as_u16();
    let body = error_body(response).await;
    error_from_body(status, &body)
}

/// Data API errors carry `{"code": "...", "message": "..."}`.
fn error_from_body(status: u16, body: &Value) -> StoreError {
    let code = body["code"]
        .as_str()
        .or_else(|| body["name"].as_str())
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string());
    let reason = body["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| format!("unexpected status {status}"));
    StoreError::backend(code, reason)
}
