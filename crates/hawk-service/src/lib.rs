//! Public entry point for issuing and revoking Hawk credentials.
//!
//! [`HawkAuthService`] forwards to a [`CredentialStore`] whose backend is picked
//! from [`ServiceConfig`] at construction time.

pub mod config;

use std::sync::Arc;

use hawk_core::{StoreAdapter, StoreError};
use hawk_credentials::CredentialStore;
use hawk_storage::{CouchbaseAdapter, ElasticsearchAdapter};
use tokio::sync::watch;
use tracing::{info, instrument};

pub use config::{LogLevel, ServiceConfig, StoreConfig};
pub use hawk_core::{Algorithm, ConnectionState, Credential, LifecycleListener};
pub use hawk_credentials::CredentialError;

/// Builds a [`HawkAuthService`] with optional lifecycle listeners.
pub struct HawkAuthServiceBuilder {
    config: ServiceConfig,
    listeners: Vec<Arc<dyn LifecycleListener>>,
}

impl HawkAuthServiceBuilder {
    /// Register a listener for connect/disconnect notifications (Couchbase only).
    pub fn listener(mut self, listener: Arc<dyn LifecycleListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> Result<HawkAuthService, CredentialError> {
        let adapter: Arc<dyn StoreAdapter> = match self.config.store {
            StoreConfig::Couchbase(cfg) => {
                Arc::new(CouchbaseAdapter::new(cfg).with_listeners(self.listeners))
            }
            StoreConfig::Elasticsearch(cfg) => {
                let adapter =
                    ElasticsearchAdapter::new(cfg).map_err(|e| CredentialError::Connection {
                        store: "elasticsearch",
                        reason: e.to_string(),
                    })?;
                Arc::new(adapter)
            }
        };
        Ok(HawkAuthService::with_adapter(adapter))
    }
}

/// Issues, looks up and revokes Hawk credentials.
pub struct HawkAuthService {
    store: CredentialStore<dyn StoreAdapter>,
}

impl HawkAuthService {
    pub fn builder(config: ServiceConfig) -> HawkAuthServiceBuilder {
        HawkAuthServiceBuilder {
            config,
            listeners: Vec::new(),
        }
    }

    pub fn from_config(config: ServiceConfig) -> Result<Self, CredentialError> {
        Self::builder(config).build()
    }

    /// Wrap an already constructed adapter.
    pub fn with_adapter(adapter: Arc<dyn StoreAdapter>) -> Self {
        Self {
            store: CredentialStore::new(adapter),
        }
    }

    pub fn store_name(&self) -> &'static str {
        self.store.adapter().name()
    }

    /// Connect to the backend. A no-op when already connected or when the
    /// backend has no session.
    #[instrument(skip_all, fields(store = self.store_name()))]
    pub async fn start(&self) -> Result<(), CredentialError> {
        self.store
            .adapter()
            .start()
            .await
            .map_err(|e| self.lifecycle_err(e))?;
        info!("credential service started");
        Ok(())
    }

    /// Disconnect from the backend (idempotent).
    #[instrument(skip_all, fields(store = self.store_name()))]
    pub async fn stop(&self) -> Result<(), CredentialError> {
        self.store
            .adapter()
            .stop()
            .await
            .map_err(|e| self.lifecycle_err(e))?;
        info!("credential service stopped");
        Ok(())
    }

    /// Current connection state; `None` for backends without a session.
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.subscribe().map(|rx| {
            let state = *rx.borrow();
            state
        })
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.store.adapter().subscribe()
    }

    /// Look up credentials by id; `Ok(None)` if unknown.
    pub async fn get_credentials(&self, id: &str) -> Result<Option<Credential>, CredentialError> {
        self.store.get(id).await
    }

    /// Issue and persist a new credential.
    pub async fn create_credentials(&self) -> Result<Credential, CredentialError> {
        self.store.create().await
    }

    pub async fn delete_credentials(&self, id: &str) -> Result<(), CredentialError> {
        self.store.delete(id).await
    }

    /// Returns the ids that were deleted.
    pub async fn delete_multi_credentials(
        &self,
        ids: &[String],
    ) -> Result<Vec<String>, CredentialError> {
        self.store.delete_many(ids).await
    }

    fn lifecycle_err(&self, err: StoreError) -> CredentialError {
        CredentialError::Connection {
            store: self.store_name(),
            reason: match err {
                StoreError::Connection { reason } => reason,
                other => other.to_string(),
            },
        }
    }
}
