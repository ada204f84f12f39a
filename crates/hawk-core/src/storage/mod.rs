use async_trait::async_trait;
use tokio::sync::watch;

use crate::{credential::Credential, error::StoreError, lifecycle::ConnectionState};

pub mod memory;

/// Contract every credential backend implements.
///
/// Adapters normalize their vendor's "key not found" outcome: `fetch` returns
/// `Ok(None)` and `remove` returns `Ok(false)`. Anything else the backend
/// rejects surfaces as a [`StoreError`].
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Short backend name used for logging.
    fn name(&self) -> &'static str;

    /// Open the backend connection. Backends without a session are always ready.
    async fn start(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Close the backend connection (idempotent).
    async fn stop(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Connection state updates, for backends that manage a session.
    fn subscribe(&self) -> Option<watch::Receiver<ConnectionState>> {
        None
    }

    /// Look up a credential by id.
    async fn fetch(&self, id: &str) -> Result<Option<Credential>, StoreError>;

    /// Store a credential, failing with [`StoreError::AlreadyExists`] if the id is taken.
    async fn insert_if_absent(&self, id: &str, credential: &Credential)
        -> Result<(), StoreError>;

    /// Remove a credential; `Ok(false)` when nothing was stored under `id`.
    async fn remove(&self, id: &str) -> Result<bool, StoreError>;

    /// Remove several credentials, returning the ids that were actually removed.
    async fn remove_many(&self, ids: &[String]) -> Result<Vec<String>, StoreError>;
}
